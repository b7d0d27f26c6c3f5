//! Error types for resource graph operations.
//!
//! Every failure here is a construction or validation failure. None of them
//! are retried internally; they propagate to the caller and abort the run for
//! the affected stage only.

use std::fmt;

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of topology errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or inconsistent builder input.
    Config,
    /// The graph itself is malformed (cycles, dangling ids, duplicates).
    Graph,
    /// The stage parameters are invalid.
    Stage,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Invalid stack configuration",
            Self::Graph => "Invalid resource graph",
            Self::Stage => "Invalid stage parameters",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => {
                "Enable the stack that exports the missing reference or import its outputs"
            }
            Self::Graph => "Check the edges declared between the listed resources",
            Self::Stage => "Check the stage entry in the stage configuration file",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while building or resolving a resource graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Required builder input is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The graph contains at least one cycle.
    #[error("dependency cycle detected between: {}", ids.join(", "))]
    CycleDetected {
        /// Nodes that could not be ordered.
        ids: Vec<String>,
    },

    /// An edge or property reference names a node that does not exist.
    #[error("dangling reference from '{from}' to unknown node '{to}'")]
    DanglingReference {
        /// Node (or edge source) holding the reference.
        from: String,
        /// Missing node id.
        to: String,
    },

    /// Stage parameters failed validation.
    #[error("invalid stage '{name}': {reason}")]
    InvalidStage {
        /// Stage name as supplied.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A node id was inserted twice into the same graph.
    #[error("duplicate resource id: {0}")]
    DuplicateNode(String),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an invalid stage error.
    pub fn invalid_stage(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStage {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Configuration(_) => ErrorCategory::Config,
            Error::CycleDetected { .. } => ErrorCategory::Graph,
            Error::DanglingReference { .. } => ErrorCategory::Graph,
            Error::DuplicateNode(_) => ErrorCategory::Graph,
            Error::InvalidStage { .. } => ErrorCategory::Stage,
        }
    }

    /// Node ids this error is about, for reporting.
    pub fn node_ids(&self) -> Vec<&str> {
        match self {
            Error::CycleDetected { ids } => ids.iter().map(String::as_str).collect(),
            Error::DanglingReference { from, to } => vec![from.as_str(), to.as_str()],
            Error::DuplicateNode(id) => vec![id.as_str()],
            Error::Configuration(_) | Error::InvalidStage { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_description() {
        assert!(!ErrorCategory::Config.description().is_empty());
        assert!(!ErrorCategory::Graph.description().is_empty());
        assert!(!ErrorCategory::Stage.description().is_empty());
    }

    #[test]
    fn test_error_category_display() {
        let display = format!("{}", ErrorCategory::Graph);
        assert!(display.contains("graph"));
    }

    #[test]
    fn test_cycle_display_names_ids() {
        let err = Error::CycleDetected {
            ids: vec!["Beta-A".to_string(), "Beta-B".to_string()],
        };
        let display = err.to_string();
        assert!(display.contains("Beta-A"));
        assert!(display.contains("Beta-B"));
        assert_eq!(err.category(), ErrorCategory::Graph);
        assert_eq!(err.node_ids(), vec!["Beta-A", "Beta-B"]);
    }

    #[test]
    fn test_dangling_reference_display() {
        let err = Error::DanglingReference {
            from: "Beta-Route".to_string(),
            to: "Beta-Missing".to_string(),
        };
        assert!(err.to_string().contains("Beta-Missing"));
        assert_eq!(err.node_ids(), vec!["Beta-Route", "Beta-Missing"]);
    }

    #[test]
    fn test_constructors() {
        let err = Error::invalid_stage("", "name cannot be empty");
        assert_eq!(err.category(), ErrorCategory::Stage);
        assert!(err.node_ids().is_empty());

        let err = Error::configuration("no function reference");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!(err.to_string(), "configuration error: no function reference");
    }
}
