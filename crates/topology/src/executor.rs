//! Execution engine - applies a resolved graph wave by wave
//!
//! Nodes inside a wave are independent of each other and are applied in
//! parallel on a rayon pool. Outputs of every applied node are collected so
//! that references in later waves can be substituted before the backend sees
//! them. A node that fails blocks every node that depends on it, directly or
//! transitively; those are reported as skipped.

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback, ProvisioningBackend};
use crate::graph::DependencyGraph;
use crate::node::ResourceNode;
use crate::resolver::Resolver;
use crate::types::{
    ApplyOutcome, ApplyResult, ExecuteOptions, ExecuteReport, ExecuteSummary, NodeReport,
};
use crate::value::Reference;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

type Outputs = BTreeMap<String, BTreeMap<String, String>>;

/// Execute a graph against a backend with the given options and callbacks
///
/// # Type Parameters
/// * `B` - Provisioning backend type
/// * `P` - Progress callback type
/// * `C` - Confirm callback type
///
/// # Returns
/// Report with per-node results in apply order
pub fn execute<B, P, C>(
    graph: &DependencyGraph,
    backend: &B,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    B: ProvisioningBackend + ?Sized,
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let waves = Resolver::waves(graph)?;
    let mut report = ExecuteReport {
        stage: graph.stage().to_string(),
        ..Default::default()
    };

    if graph.is_empty() || opts.dry_run {
        return Ok(report);
    }

    let prompt = format!(
        "Apply {} resources to stage {} via {}?",
        graph.len(),
        graph.stage(),
        backend.name()
    );
    if !confirm.confirm(&prompt)? {
        for node in graph.nodes() {
            record(
                &mut report,
                node,
                ApplyResult::Skipped {
                    reason: "declined".to_string(),
                },
            );
        }
        return Ok(report);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    let ctx = ApplyContext::new(graph.stage(), opts.verbose);
    let mut outputs: Outputs = BTreeMap::new();
    // Blocked node id -> the node whose failure blocked it
    let mut blocked: HashMap<String, String> = HashMap::new();

    progress.on_stage_start(graph.stage(), graph.len());

    for (index, wave) in waves.iter().enumerate() {
        progress.on_wave_start(index, wave.len());
        log::debug!(
            "stage {}: wave {} with {} nodes",
            graph.stage(),
            index,
            wave.len()
        );

        let mut results: Vec<Option<ApplyResult>> = vec![None; wave.len()];
        let mut runnable: Vec<(usize, ResourceNode)> = Vec::new();

        for (slot, node) in wave.iter().enumerate() {
            if let Some(cause) = blocked.get(node.id()) {
                log::warn!("skipping {}: dependency {} did not apply", node.id(), cause);
                results[slot] = Some(ApplyResult::Skipped {
                    reason: format!("dependency {} did not apply", cause),
                });
                continue;
            }

            match substitute_references(node, &outputs) {
                Ok(resolved) => runnable.push((slot, resolved)),
                Err(missing) => {
                    results[slot] = Some(ApplyResult::Failed {
                        error: format!("unresolved reference {}", missing),
                    });
                }
            }
        }

        let applied: Vec<(usize, ApplyOutcome)> = pool.install(|| {
            runnable
                .par_iter()
                .map(|(slot, node)| (*slot, apply_node(backend, node, &ctx)))
                .collect()
        });

        for (slot, outcome) in applied {
            if outcome.result.unblocks_dependents() {
                outputs.insert(wave[slot].id().to_string(), outcome.outputs);
            }
            results[slot] = Some(outcome.result);
        }

        for (node, result) in wave.iter().zip(results) {
            let result = result.unwrap_or(ApplyResult::Skipped {
                reason: "not applied".to_string(),
            });
            if !result.unblocks_dependents() {
                for dependent in graph.transitive_dependents(node.id()) {
                    blocked
                        .entry(dependent)
                        .or_insert_with(|| node.id().to_string());
                }
            }
            progress.on_node_complete(node.id(), &result);
            record(&mut report, node, result);
        }
    }

    if opts.prune && report.summary.is_success() {
        let live: Vec<&str> = graph
            .nodes()
            .iter()
            .map(ResourceNode::id)
            .chain(opts.keep.iter().map(String::as_str))
            .collect();
        for (id, result) in backend.prune(graph.stage(), &live)? {
            report.summary.add_result(&result);
            report.pruned.push((id, result));
        }
    }

    progress.on_stage_complete();
    report.outputs = outputs;
    Ok(report)
}

/// Execute without progress reporting or confirmation
pub fn execute_simple<B: ProvisioningBackend + ?Sized>(
    graph: &DependencyGraph,
    backend: &B,
    opts: &ExecuteOptions,
) -> Result<ExecuteReport> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(graph, backend, opts, &mut NoProgress, &mut AutoConfirm)
}

fn record(report: &mut ExecuteReport, node: &ResourceNode, result: ApplyResult) {
    report.summary.add_result(&result);
    report.nodes.push(NodeReport {
        id: node.id().to_string(),
        kind: node.kind(),
        result,
    });
}

/// Copy of `node` with every reference replaced by the referenced output
fn substitute_references(
    node: &ResourceNode,
    outputs: &Outputs,
) -> std::result::Result<ResourceNode, Reference> {
    let lookup = |r: &Reference| {
        outputs
            .get(&r.node)
            .and_then(|attrs| attrs.get(&r.attribute))
            .cloned()
    };
    let mut resolved = node.clone();
    for (key, value) in node.properties() {
        resolved.set(key, value.substitute(&lookup)?);
    }
    Ok(resolved)
}

/// Apply a single node
fn apply_node<B: ProvisioningBackend + ?Sized>(
    backend: &B,
    node: &ResourceNode,
    ctx: &ApplyContext,
) -> ApplyOutcome {
    match backend.apply(node, ctx) {
        Ok(outcome) => outcome,
        Err(e) => ApplyOutcome::new(ApplyResult::Failed {
            error: e.to_string(),
        }),
    }
}

/// Summarize several stage reports
pub fn total_summary<'a, I>(reports: I) -> ExecuteSummary
where
    I: IntoIterator<Item = &'a ExecuteReport>,
{
    let mut summary = ExecuteSummary::default();
    for report in reports {
        summary.merge(&report.summary);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::node::ResourceKind;
    use crate::value::Value;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Backend that records what it was asked to apply
    #[derive(Default)]
    struct MockBackend {
        applied: Mutex<Vec<ResourceNode>>,
        fail: HashSet<String>,
    }

    impl MockBackend {
        fn failing(ids: &[&str]) -> Self {
            Self {
                fail: ids.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn applied_ids(&self) -> Vec<String> {
            self.applied
                .lock()
                .unwrap()
                .iter()
                .map(|n| n.id().to_string())
                .collect()
        }
    }

    impl ProvisioningBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        fn apply(&self, node: &ResourceNode, _ctx: &ApplyContext) -> Result<ApplyOutcome> {
            if self.fail.contains(node.id()) {
                anyhow::bail!("provider rejected {}", node.id());
            }
            self.applied.lock().unwrap().push(node.clone());
            let mut outputs = BTreeMap::new();
            outputs.insert("domainName".to_string(), format!("{}.cdn.test", node.name()));
            Ok(ApplyOutcome::with_outputs(ApplyResult::Created, outputs))
        }
    }

    /// Backend that remembers the live set it was asked to prune against
    #[derive(Default)]
    struct PruneRecorder {
        live: Mutex<Vec<String>>,
    }

    impl ProvisioningBackend for PruneRecorder {
        fn name(&self) -> &str {
            "prune-recorder"
        }

        fn apply(&self, _node: &ResourceNode, _ctx: &ApplyContext) -> Result<ApplyOutcome> {
            Ok(ApplyOutcome::new(ApplyResult::NoChange))
        }

        fn prune(&self, _stage: &str, live: &[&str]) -> Result<Vec<(String, ApplyResult)>> {
            *self.live.lock().unwrap() = live.iter().map(|s| s.to_string()).collect();
            Ok(Vec::new())
        }
    }

    fn sample_graph() -> DependencyGraph {
        let mut graph = DependencyGraph::new("Beta");
        graph
            .add_node(ResourceNode::new("Beta", "Distribution", ResourceKind::Distribution))
            .unwrap();
        graph
            .add_node(
                ResourceNode::new("Beta", "HttpApi", ResourceKind::HttpApi).with(
                    "allowOrigins",
                    Value::List(vec![Value::reference("Beta-Distribution", "domainName")]),
                ),
            )
            .unwrap();
        graph
            .add_node(ResourceNode::new("Beta", "Route", ResourceKind::Route))
            .unwrap();
        graph
            .add_node(ResourceNode::new("Beta", "Table", ResourceKind::Table))
            .unwrap();
        graph.add_edge("Beta-Distribution", "Beta-HttpApi");
        graph.add_edge("Beta-HttpApi", "Beta-Route");
        graph
    }

    #[test]
    fn test_execute_empty_graph() {
        let graph = DependencyGraph::new("Beta");
        let report = execute_simple(&graph, &MockBackend::default(), &ExecuteOptions::default())
            .unwrap();
        assert_eq!(report.summary.total(), 0);
    }

    #[test]
    fn test_references_are_substituted() {
        let backend = MockBackend::default();
        let report = execute_simple(&sample_graph(), &backend, &ExecuteOptions::default()).unwrap();

        assert_eq!(report.summary.created, 4);
        let applied = backend.applied.lock().unwrap();
        let api = applied.iter().find(|n| n.id() == "Beta-HttpApi").unwrap();
        assert_eq!(
            api.property("allowOrigins"),
            Some(&Value::List(vec!["Distribution.cdn.test".into()]))
        );
        assert_eq!(
            report.outputs["Beta-Distribution"]["domainName"],
            "Distribution.cdn.test"
        );
    }

    #[test]
    fn test_failure_skips_transitive_dependents() {
        let backend = MockBackend::failing(&["Beta-Distribution"]);
        let report = execute_simple(&sample_graph(), &backend, &ExecuteOptions::default()).unwrap();

        assert!(matches!(
            report.result_of("Beta-Distribution"),
            Some(ApplyResult::Failed { .. })
        ));
        assert!(matches!(
            report.result_of("Beta-HttpApi"),
            Some(ApplyResult::Skipped { .. })
        ));
        // The reason names the failed root, not the skipped intermediate.
        assert_eq!(
            report.result_of("Beta-Route"),
            Some(&ApplyResult::Skipped {
                reason: "dependency Beta-Distribution did not apply".to_string()
            })
        );
        assert_eq!(report.result_of("Beta-Table"), Some(&ApplyResult::Created));
        assert_eq!(backend.applied_ids(), vec!["Beta-Table"]);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.skipped, 2);
    }

    #[test]
    fn test_report_follows_dependency_order() {
        let report =
            execute_simple(&sample_graph(), &MockBackend::default(), &ExecuteOptions::default())
                .unwrap();
        let order: Vec<&str> = report.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            order,
            vec!["Beta-Distribution", "Beta-Table", "Beta-HttpApi", "Beta-Route"]
        );
    }

    #[test]
    fn test_dry_run_does_not_apply() {
        let backend = MockBackend::default();
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = execute_simple(&sample_graph(), &backend, &opts).unwrap();
        assert!(report.nodes.is_empty());
        assert!(backend.applied_ids().is_empty());
    }

    #[test]
    fn test_declined_confirmation_skips_everything() {
        let backend = MockBackend::default();
        let report = execute(
            &sample_graph(),
            &backend,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(report.summary.skipped, 4);
        assert!(backend.applied_ids().is_empty());
    }

    #[test]
    fn test_cycle_aborts_before_apply() {
        let mut graph = sample_graph();
        graph.add_edge("Beta-Route", "Beta-Distribution");
        let backend = MockBackend::default();
        let err = execute(
            &graph,
            &backend,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cycle"));
        assert!(backend.applied_ids().is_empty());
    }

    #[test]
    fn test_prune_keeps_listed_ids() {
        let backend = PruneRecorder::default();
        let opts = ExecuteOptions {
            keep: vec!["Beta-GraphqlFunction".to_string()],
            ..Default::default()
        };
        execute_simple(&sample_graph(), &backend, &opts).unwrap();
        let live = backend.live.lock().unwrap();
        assert_eq!(live.len(), 5);
        assert!(live.contains(&"Beta-GraphqlFunction".to_string()));
        assert!(live.contains(&"Beta-Route".to_string()));
    }

    #[test]
    fn test_single_job() {
        let opts = ExecuteOptions {
            jobs: 1,
            ..Default::default()
        };
        let report = execute_simple(&sample_graph(), &MockBackend::default(), &opts).unwrap();
        assert_eq!(report.summary.created, 4);
        assert!(report.summary.is_success());
    }
}
