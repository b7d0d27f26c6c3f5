//! Resolver - turns a dependency graph into a deterministic apply order
//!
//! Ordering uses Kahn's algorithm. Among nodes whose dependencies are all
//! satisfied, the one inserted into the graph first is emitted first, so the
//! same graph always yields the same plan.

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::node::ResourceNode;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// Ordered apply plan over a resolved graph
///
/// A plan is a one-shot iterator: it cannot be cloned or rewound. It borrows
/// the graph, so mutating the graph requires dropping the plan and resolving
/// again.
#[derive(Debug)]
pub struct Plan<'g> {
    graph: &'g DependencyGraph,
    order: std::vec::IntoIter<usize>,
}

impl<'g> Plan<'g> {
    /// Stage the plan was resolved for
    pub fn stage(&self) -> &'g str {
        self.graph.stage()
    }
}

impl<'g> Iterator for Plan<'g> {
    type Item = &'g ResourceNode;

    fn next(&mut self) -> Option<Self::Item> {
        self.order.next().map(|i| &self.graph.nodes()[i])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl ExactSizeIterator for Plan<'_> {}

/// Topological resolver for dependency graphs
pub struct Resolver;

impl Resolver {
    /// Resolve a graph into an ordered plan
    pub fn resolve(graph: &DependencyGraph) -> Result<Plan<'_>> {
        let order = Self::order(graph)?;
        log::debug!(
            "resolved {} nodes for stage {}",
            order.len(),
            graph.stage()
        );
        Ok(Plan {
            graph,
            order: order.into_iter(),
        })
    }

    /// Group nodes into dependency levels
    ///
    /// Every node in wave `n` depends only on nodes in waves before `n`.
    /// Nodes inside a wave keep insertion order.
    pub fn waves(graph: &DependencyGraph) -> Result<Vec<Vec<&ResourceNode>>> {
        let order = Self::order(graph)?;
        let mut level = vec![0usize; graph.len()];

        for &i in &order {
            let node = &graph.nodes()[i];
            let depth = graph
                .dependencies_of(node.id())
                .iter()
                .filter_map(|dep| graph.position(dep))
                .map(|d| level[d] + 1)
                .max()
                .unwrap_or(0);
            level[i] = depth;
        }

        let depth = level.iter().max().map_or(0, |m| m + 1);
        let mut waves: Vec<Vec<&ResourceNode>> = vec![Vec::new(); depth];
        for (i, node) in graph.nodes().iter().enumerate() {
            waves[level[i]].push(node);
        }
        Ok(waves)
    }

    /// Node indices in apply order
    fn order(graph: &DependencyGraph) -> Result<Vec<usize>> {
        graph.validate()?;

        let n = graph.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for edge in graph.edges() {
            // validate() guarantees both endpoints exist
            let (Some(from), Some(to)) = (graph.position(&edge.from), graph.position(&edge.to))
            else {
                continue;
            };
            dependents[from].push(to);
            in_degree[to] += 1;
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &next in &dependents[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < n {
            let ids = cycle_participants(graph, &in_degree, &dependents);
            log::debug!("cycle in stage {}: {}", graph.stage(), ids.join(", "));
            return Err(Error::CycleDetected { ids });
        }

        Ok(order)
    }
}

/// Convenience wrapper around [`Resolver::resolve`]
pub fn resolve(graph: &DependencyGraph) -> Result<Plan<'_>> {
    Resolver::resolve(graph)
}

/// Narrow the unordered remainder down to the nodes on or between cycles
///
/// Nodes left after Kahn's algorithm are either on a cycle or downstream of
/// one. Downstream-only nodes are peeled off by repeatedly dropping nodes with
/// no dependents left in the remainder.
fn cycle_participants(
    graph: &DependencyGraph,
    in_degree: &[usize],
    dependents: &[Vec<usize>],
) -> Vec<String> {
    let mut remaining: HashSet<usize> = (0..in_degree.len())
        .filter(|&i| in_degree[i] > 0)
        .collect();

    loop {
        let sinks: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| !dependents[i].iter().any(|d| remaining.contains(d)))
            .collect();
        if sinks.is_empty() {
            break;
        }
        for sink in sinks {
            remaining.remove(&sink);
        }
    }

    let mut indices: Vec<usize> = remaining.into_iter().collect();
    indices.sort_unstable();
    indices
        .into_iter()
        .map(|i| graph.nodes()[i].id().to_string())
        .collect()
}
