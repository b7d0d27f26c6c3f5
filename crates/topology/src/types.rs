//! Core types for applying resolved graphs

use crate::node::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of applying a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }

    /// Whether dependents of this node may still be applied
    pub fn unblocks_dependents(&self) -> bool {
        matches!(self, Self::NoChange | Self::Created | Self::Modified)
    }

    /// Short status symbol for terminal output
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::NoChange => "○",
            Self::Created | Self::Modified | Self::Removed => "✓",
            Self::Failed { .. } => "✗",
            Self::Skipped { .. } => "⊘",
        }
    }
}

/// What a provisioning backend reports for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub result: ApplyResult,
    /// Output attributes other nodes may reference (e.g. "domainName")
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

impl ApplyOutcome {
    pub fn new(result: ApplyResult) -> Self {
        Self {
            result,
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_outputs(result: ApplyResult, outputs: BTreeMap<String, String>) -> Self {
        Self { result, outputs }
    }
}

/// Per-node entry in an execution report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeReport {
    pub id: String,
    pub kind: ResourceKind,
    pub result: ApplyResult,
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.created + self.modified + self.removed + self.skipped + self.failed + self.no_change
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.modified += other.modified;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.no_change += other.no_change;
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Outcome of executing one stage's graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteReport {
    pub stage: String,
    /// Per-node results in apply order
    pub nodes: Vec<NodeReport>,
    /// Nodes removed or orphaned because they left the graph
    pub pruned: Vec<(String, ApplyResult)>,
    pub summary: ExecuteSummary,
    /// Output attributes by node id
    pub outputs: BTreeMap<String, BTreeMap<String, String>>,
}

impl ExecuteReport {
    pub fn result_of(&self, id: &str) -> Option<&ApplyResult> {
        self.nodes.iter().find(|n| n.id == id).map(|n| &n.result)
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs within a wave
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
    /// Ask the backend to drop resources that are no longer in the graph
    pub prune: bool,
    /// Ids outside the graph that pruning must leave in place
    pub keep: Vec<String>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
            prune: true,
            keep: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::NoChange);
        summary.add_result(&ApplyResult::Failed {
            error: "boom".into(),
        });
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.total_changes(), 1);
        assert!(!summary.is_success());

        let mut other = ExecuteSummary::default();
        other.add_result(&ApplyResult::Removed);
        summary.merge(&other);
        assert_eq!(summary.total_changes(), 2);
    }

    #[test]
    fn test_unblocks_dependents() {
        assert!(ApplyResult::NoChange.unblocks_dependents());
        assert!(ApplyResult::Created.unblocks_dependents());
        assert!(
            !ApplyResult::Skipped {
                reason: "upstream failed".into()
            }
            .unblocks_dependents()
        );
        assert!(!ApplyResult::Failed { error: "x".into() }.unblocks_dependents());
    }
}
