//! Local provisioning backend backed by per-stage state files
//!
//! Nothing is provisioned remotely. Each applied node is recorded with a
//! content hash so re-applying an unchanged graph is a no-op, and each kind
//! gets deterministic outputs (names, ARNs, domains) derived from its id so
//! that references between nodes resolve the same way on every run.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use topology::{
    ApplyContext, ApplyOutcome, ApplyResult, ProvisioningBackend, ResourceKind, ResourceNode,
    qualified_id,
};

use crate::stacks::{StackOutputs, service};
use crate::state::{ResourceRecord, StageState};

const REGION: &str = "local-1";
const ACCOUNT: &str = "000000000000";

/// Records applied nodes in `<dir>/<stage>.json`
pub struct StateFileBackend {
    dir: PathBuf,
    stages: Mutex<HashMap<String, StageState>>,
}

impl StateFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stages: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Function outputs recorded by an earlier apply of `stage`
    pub fn imported_outputs(&self, stage: &str) -> Result<Option<StackOutputs>> {
        let state = StageState::load(&self.dir, stage)?;
        let function = qualified_id(stage, service::FUNCTION);
        Ok(state
            .output(&function, service::FUNCTION_ARN)
            .map(StackOutputs::imported))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StageState>> {
        match self.stages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Run `f` on the cached state of `stage`, then persist it
    fn with_stage<T>(&self, stage: &str, f: impl FnOnce(&mut StageState) -> T) -> Result<T> {
        let mut stages = self.lock();
        if !stages.contains_key(stage) {
            let loaded = StageState::load(&self.dir, stage)?;
            stages.insert(stage.to_string(), loaded);
        }
        let state = stages
            .get_mut(stage)
            .context("stage state missing after load")?;
        let value = f(state);
        state.touch(&self.dir)?;
        Ok(value)
    }
}

impl ProvisioningBackend for StateFileBackend {
    fn name(&self) -> &str {
        "state-file"
    }

    fn apply(&self, node: &ResourceNode, ctx: &ApplyContext) -> Result<ApplyOutcome> {
        let hash = content_hash(node)?;
        let outputs = outputs_for(node);

        self.with_stage(ctx.stage, |state| {
            let result = match state.resources.get(node.id()) {
                Some(existing) if existing.hash == hash && existing.kind == node.kind() => {
                    ApplyResult::NoChange
                }
                Some(_) => ApplyResult::Modified,
                None => ApplyResult::Created,
            };

            if result != ApplyResult::NoChange {
                if ctx.verbose {
                    log::info!("{} {}", result.symbol(), node.description());
                }
                state.resources.insert(
                    node.id().to_string(),
                    ResourceRecord {
                        kind: node.kind(),
                        hash,
                        outputs: outputs.clone(),
                        removal_policy: node
                            .property("removalPolicy")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                        applied_at: Utc::now(),
                    },
                );
            }

            ApplyOutcome::with_outputs(result, outputs)
        })
    }

    fn prune(&self, stage: &str, live: &[&str]) -> Result<Vec<(String, ApplyResult)>> {
        self.with_stage(stage, |state| {
            let stale: Vec<String> = state
                .resources
                .keys()
                .filter(|id| !live.contains(&id.as_str()))
                .cloned()
                .collect();

            let mut pruned = Vec::new();
            for id in stale {
                let Some(record) = state.resources.remove(&id) else {
                    continue;
                };
                let result = if record.retained() {
                    log::warn!("{} left the graph; retained and no longer tracked", id);
                    ApplyResult::Skipped {
                        reason: "retained".to_string(),
                    }
                } else {
                    log::info!("removed {}", id);
                    ApplyResult::Removed
                };
                pruned.push((id, result));
            }
            pruned
        })
    }
}

/// Hash of a node's kind and resolved properties
fn content_hash(node: &ResourceNode) -> Result<String> {
    let properties = serde_json::to_vec(node.properties())
        .with_context(|| format!("Failed to serialize properties of {}", node.id()))?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(node.kind().as_str().as_bytes());
    hasher.update(&properties);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Short stable suffix derived from a node id
fn short_id(id: &str, len: usize) -> String {
    let hex = blake3::hash(id.as_bytes()).to_hex();
    hex.as_str()[..len].to_string()
}

fn string_property<'a>(node: &'a ResourceNode, key: &str) -> Option<&'a str> {
    node.property(key).and_then(|v| v.as_str())
}

/// Deterministic outputs other nodes may reference
fn outputs_for(node: &ResourceNode) -> BTreeMap<String, String> {
    let id = node.id();
    let mut out = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        out.insert(key.to_string(), value);
    };

    match node.kind() {
        ResourceKind::Bucket => {
            let name = format!("{}-{}", id.to_ascii_lowercase(), short_id(id, 8));
            put("bucketArn", format!("arn:aws:s3:::{}", name));
            put(
                service::BUCKET_DOMAIN,
                format!("{}.s3.{}.amazonaws.com", name, REGION),
            );
            put(service::BUCKET_NAME, name);
        }
        ResourceKind::Deployment => {
            put("deploymentId", short_id(id, 12));
        }
        ResourceKind::Distribution => {
            let domain = format!("d{}.cloudfront.net", short_id(id, 13));
            put("distributionId", short_id(id, 14).to_ascii_uppercase());
            put(service::DISTRIBUTION_URL, format!("https://{}", domain));
            put("domainName", domain);
        }
        ResourceKind::Function => {
            put("functionName", id.to_string());
            put(
                service::FUNCTION_ARN,
                format!("arn:aws:lambda:{}:{}:function:{}", REGION, ACCOUNT, id),
            );
        }
        ResourceKind::Secret => {
            let name = string_property(node, "secretName").unwrap_or(id);
            put(
                service::SECRET_ARN,
                format!(
                    "arn:aws:secretsmanager:{}:{}:secret:{}-{}",
                    REGION,
                    ACCOUNT,
                    name,
                    short_id(id, 6)
                ),
            );
        }
        ResourceKind::HttpApi => {
            let api_id = short_id(id, 10);
            put(
                "apiEndpoint",
                format!("https://{}.execute-api.{}.amazonaws.com", api_id, REGION),
            );
            put(service::API_ID, api_id);
        }
        ResourceKind::Route => {
            put("routeId", short_id(id, 7));
        }
        ResourceKind::Table => {
            let name = string_property(node, "tableName").unwrap_or(id).to_string();
            put(
                "tableArn",
                format!("arn:aws:dynamodb:{}:{}:table/{}", REGION, ACCOUNT, name),
            );
            put("tableName", name);
        }
    }
    out
}

/// Default state directory, or an explicit override
pub fn resolve_state_dir(explicit: Option<&str>) -> Result<PathBuf> {
    match explicit {
        Some(raw) => Ok(crate::config::expand_path(raw)),
        None => crate::config::state_dir(),
    }
}

// ============================================================================
// Tests
// ============================================================================
