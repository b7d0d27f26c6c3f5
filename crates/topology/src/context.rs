//! Apply context and provider traits
//!
//! These traits allow the topology crate to drive any provisioning backend
//! without depending on a specific cloud SDK, UI, or prompt implementation.

use crate::node::ResourceNode;
use crate::types::{ApplyOutcome, ApplyResult};
use anyhow::Result;

/// External system that turns nodes into real infrastructure
///
/// The executor hands over one node at a time with every property reference
/// already replaced by the referenced node's output. Implementations must be
/// idempotent per node id: applying an unchanged node again reports
/// [`ApplyResult::NoChange`].
pub trait ProvisioningBackend: Send + Sync {
    /// Backend name for display
    fn name(&self) -> &str;

    /// Create or update the resource described by `node`
    fn apply(&self, node: &ResourceNode, ctx: &ApplyContext) -> Result<ApplyOutcome>;

    /// Remove resources recorded for `stage` that are not in `live`
    ///
    /// Returns the affected ids with their results. The default keeps
    /// everything.
    fn prune(&self, _stage: &str, _live: &[&str]) -> Result<Vec<(String, ApplyResult)>> {
        Ok(Vec::new())
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called once before the first wave
    fn on_stage_start(&mut self, stage: &str, count: usize);

    /// Called when starting to apply a wave of independent nodes
    fn on_wave_start(&mut self, index: usize, count: usize);

    /// Called when a node application completes
    fn on_node_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called after the last wave
    fn on_stage_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_stage_start(&mut self, _stage: &str, _count: usize) {}
    fn on_wave_start(&mut self, _index: usize, _count: usize) {}
    fn on_node_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_stage_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Context passed to backend apply operations
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    /// Stage being applied
    pub stage: &'a str,
    /// Whether to output verbose information
    pub verbose: bool,
}

impl<'a> ApplyContext<'a> {
    pub fn new(stage: &'a str, verbose: bool) -> Self {
        Self { stage, verbose }
    }
}
