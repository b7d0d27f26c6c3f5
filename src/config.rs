//! Stage configuration loading
//!
//! Stages are read from `~/.config/stackplan/stages.toml` unless a path is
//! given with `--config` / `STACKPLAN_CONFIG`. A missing file yields the
//! built-in Beta/Prod pair.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use topology::StageContext;

use crate::stacks::{Components, StackOutputs};

/// Name of the stage configuration file
pub const STAGES_FILE: &str = "stages.toml";

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("stackplan"))
}

/// Get the state directory path (~/.local/state/stackplan)
pub fn state_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join("stackplan"))
}

/// Expand `~` in a user-supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Stages File
// ============================================================================

/// Contents of stages.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            stages: vec![StageConfig::new("Beta"), StageConfig::new("Prod")],
        }
    }
}

impl StagesConfig {
    /// Load from an explicit path, or the default location
    ///
    /// Returns the config and the path it came from (None for built-in defaults).
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => config_dir()?.join(STAGES_FILE),
        };

        if !path.exists() {
            if explicit.is_some() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("{} not found, using built-in stages", path.display());
            return Ok((Self::default(), None));
        }

        let config = Self::load_from(&path)?;
        Ok((config, Some(path)))
    }

    /// Load and validate a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        config.validate()?;
        log::debug!("Loaded {} stages from {}", config.stages.len(), path.display());
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            anyhow::bail!("No stages configured");
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.to_ascii_lowercase()) {
                anyhow::bail!("Duplicate stage '{}'", stage.name);
            }
        }

        Ok(())
    }

    /// Find a stage by name (case-insensitive)
    pub fn find_stage(&self, name: &str) -> Option<&StageConfig> {
        self.stages
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Configured stage names, in file order
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Raw parameters for one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,

    /// "destroy" or "retain"; defaults by stage name
    #[serde(default)]
    pub removal_policy: Option<String>,

    /// Custom domain aliased onto the distribution
    #[serde(default)]
    pub domain: Option<String>,

    /// Extra origins allowed by the HTTP API, besides the distribution itself
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub components: ComponentsConfig,

    /// Outputs of stacks deployed outside this graph
    #[serde(default)]
    pub imports: ImportsConfig,
}

impl StageConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            removal_policy: None,
            domain: None,
            cors_origins: Vec::new(),
            components: ComponentsConfig::default(),
            imports: ImportsConfig::default(),
        }
    }

    /// Validate into an immutable stage context
    pub fn context(&self) -> topology::Result<StageContext> {
        StageContext::new(
            &self.name,
            self.removal_policy.as_deref(),
            self.cors_origins.iter().cloned(),
            self.domain.clone(),
        )
    }

    pub fn components(&self) -> Components {
        Components {
            service: self.components.service,
            api: self.components.api,
            secret: self
                .components
                .secret
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            tables: self.components.tables,
        }
    }

    /// Imported stack outputs, if any are configured
    pub fn imports(&self) -> Option<StackOutputs> {
        self.imports
            .function_arn
            .as_ref()
            .map(|arn| StackOutputs::imported(arn.clone()))
    }
}

/// Which stacks and optional resources a stage includes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsConfig {
    #[serde(default = "default_true")]
    pub service: bool,

    #[serde(default = "default_true")]
    pub api: bool,

    #[serde(default = "default_secret")]
    pub secret: Option<String>,

    #[serde(default = "default_true")]
    pub tables: bool,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            service: true,
            api: true,
            secret: default_secret(),
            tables: true,
        }
    }
}

/// References to resources realized by another graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportsConfig {
    /// ARN of the service function, when the service stack is applied elsewhere
    #[serde(default)]
    pub function_arn: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_secret() -> Option<String> {
    Some("ServiceSecret".to_string())
}

// ============================================================================
// Tests
// ============================================================================
