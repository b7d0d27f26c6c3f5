//! Stage context - per-environment parameters

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Name of the production stage
pub const PRODUCTION_STAGE: &str = "Prod";

/// What happens to a stateful resource when it leaves the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Delete the resource and its data
    Destroy,
    /// Orphan the resource, keeping its data
    Retain,
}

impl RemovalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Destroy => "destroy",
            Self::Retain => "retain",
        }
    }

    /// Default policy for a stage: retain production data, destroy everything else
    pub fn for_stage(name: &str) -> Self {
        if name.eq_ignore_ascii_case(PRODUCTION_STAGE) {
            Self::Retain
        } else {
            Self::Destroy
        }
    }
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "destroy" => Ok(Self::Destroy),
            "retain" => Ok(Self::Retain),
            other => Err(format!(
                "unrecognized removal policy '{}' (expected destroy or retain)",
                other
            )),
        }
    }
}

fn stage_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9]*$")
            .unwrap_or_else(|e| panic!("invalid stage pattern: {e}"))
    })
}

/// Immutable parameter set for one deployment environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageContext {
    name: String,
    removal_policy: RemovalPolicy,
    cors_origins: BTreeSet<String>,
    domain: Option<String>,
}

impl StageContext {
    /// Validate raw stage parameters
    ///
    /// `removal_policy` is parsed case-insensitively; when absent it defaults
    /// to [`RemovalPolicy::for_stage`].
    pub fn new<I, S>(
        name: &str,
        removal_policy: Option<&str>,
        cors_origins: I,
        domain: Option<String>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_stage(name, "stage name cannot be empty"));
        }
        if !stage_name_pattern().is_match(name) {
            return Err(Error::invalid_stage(
                name,
                "stage name must start with a letter and contain only letters and digits",
            ));
        }

        let removal_policy = match removal_policy {
            Some(raw) => raw
                .parse::<RemovalPolicy>()
                .map_err(|reason| Error::invalid_stage(name, reason))?,
            None => RemovalPolicy::for_stage(name),
        };

        let cors_origins: BTreeSet<String> = cors_origins
            .into_iter()
            .map(|origin| {
                let origin: String = origin.into();
                origin.trim().to_string()
            })
            .collect();
        if cors_origins.iter().any(String::is_empty) {
            return Err(Error::invalid_stage(name, "CORS origins cannot be empty"));
        }

        let domain = domain
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Self {
            name: name.to_string(),
            removal_policy,
            cors_origins,
            domain,
        })
    }

    /// Stage with no extra origins or domain and the default policy
    pub fn named(name: &str) -> Result<Self> {
        Self::new(name, None, Vec::<String>::new(), None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        self.removal_policy
    }

    pub fn cors_origins(&self) -> &BTreeSet<String> {
        &self.cors_origins
    }

    /// Custom domain aliased onto the distribution, if any
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn is_production(&self) -> bool {
        self.name.eq_ignore_ascii_case(PRODUCTION_STAGE)
    }
}
