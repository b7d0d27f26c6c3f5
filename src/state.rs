//! Per-stage state files
//!
//! Each stage keeps one JSON file recording what was applied to it: the
//! content hash of every resource's resolved properties and the outputs the
//! backend produced for it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use topology::ResourceKind;

// ============================================================================
// State Structures
// ============================================================================

/// Everything recorded for one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageState {
    pub stage: String,

    /// Applied resources by node id
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

/// One applied resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,

    /// blake3 hash of kind + resolved properties
    pub hash: String,

    #[serde(default)]
    pub outputs: BTreeMap<String, String>,

    /// "retain" keeps the record (and the resource) when it leaves the graph
    #[serde(default)]
    pub removal_policy: Option<String>,

    pub applied_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn retained(&self) -> bool {
        self.removal_policy.as_deref() == Some("retain")
    }
}

// ============================================================================
// StageState Implementation
// ============================================================================

impl StageState {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// State file path for a stage inside `dir`
    pub fn path(dir: &Path, stage: &str) -> PathBuf {
        dir.join(format!("{}.json", stage))
    }

    /// Load state from disk, or return empty state if the file doesn't exist
    pub fn load(dir: &Path, stage: &str) -> Result<Self> {
        let path = Self::path(dir, stage);

        if !path.exists() {
            log::debug!("No state file for stage {}, starting empty", stage);
            return Ok(Self::new(stage));
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.stage != stage {
            anyhow::bail!(
                "State file {} belongs to stage {}, not {}",
                path.display(),
                state.stage,
                stage
            );
        }

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let path = Self::path(dir, &self.stage);
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize state to JSON")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, dir: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(dir)
    }

    /// Recorded output of a node, if it was applied
    pub fn output(&self, id: &str, attribute: &str) -> Option<&str> {
        self.resources
            .get(id)
            .and_then(|r| r.outputs.get(attribute))
            .map(String::as_str)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> ResourceRecord {
        ResourceRecord {
            kind: ResourceKind::Table,
            hash: "abc".to_string(),
            outputs: BTreeMap::from([("tableName".to_string(), "Beta-Catalogue".to_string())]),
            removal_policy: Some("destroy".to_string()),
            applied_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = StageState::load(dir.path(), "Beta").unwrap();
        assert_eq!(state.stage, "Beta");
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut state = StageState::new("Beta");
        state
            .resources
            .insert("Beta-CatalogueTable".to_string(), record());
        state.touch(dir.path()).unwrap();

        assert!(dir.path().join("Beta.json").exists());
        let loaded = StageState::load(dir.path(), "Beta").unwrap();
        assert_eq!(
            loaded.output("Beta-CatalogueTable", "tableName"),
            Some("Beta-Catalogue")
        );
        assert_eq!(loaded.resources["Beta-CatalogueTable"].hash, "abc");
    }

    #[test]
    fn test_stage_mismatch_is_error() {
        let dir = TempDir::new().unwrap();
        StageState::new("Prod").save(dir.path()).unwrap();
        fs::rename(dir.path().join("Prod.json"), dir.path().join("Beta.json")).unwrap();
        assert!(StageState::load(dir.path(), "Beta").is_err());
    }

    #[test]
    fn test_retained() {
        let mut r = record();
        assert!(!r.retained());
        r.removal_policy = Some("retain".to_string());
        assert!(r.retained());
    }
}
