//! Result and error types for Rulemon.

use thiserror::Error;

/// Result type for Rulemon operations
pub type RulemonResult<T> = Result<T, RulemonError>;

/// Errors that can occur in Rulemon
#[derive(Debug, Error)]
pub enum RulemonError {
    /// The vehicle under test was not present in the world snapshot
    #[error("Ego vehicle with role '{role}' not found among {searched} actors")]
    EgoNotFound {
        /// Role name that was searched for
        role: String,
        /// Number of actors searched
        searched: usize,
    },

    /// A rule oracle could not be evaluated
    #[error("Oracle for rule {rule} failed: {message}")]
    Oracle {
        /// Rule identifier ("{rule}.{subcase}")
        rule: String,
        /// Error message
        message: String,
    },

    /// Persisted coverage schema does not match the configured one
    #[error("Coverage schema error: {message}")]
    Schema {
        /// Error message
        message: String,
    },

    /// A persisted coverage row could not be parsed
    #[error("Malformed coverage row at line {line}: {message}")]
    MalformedRow {
        /// 1-based line number
        line: usize,
        /// Error message
        message: String,
    },

    /// A persisted cell holds a label its variable does not define
    #[error("Unknown label '{label}' for {variable} at line {line}")]
    UnknownLabel {
        /// 1-based line number
        line: usize,
        /// Coverage variable or column name
        variable: String,
        /// Offending label
        label: String,
    },

    /// A value does not belong to the domain of its coverage variable
    #[error("Value {value} is outside the domain of {variable}")]
    DomainMismatch {
        /// Coverage variable name
        variable: String,
        /// Offending value
        value: String,
    },

    /// A validity requirement was built with inconsistent values
    #[error("Invalid validity requirement: {message}")]
    InvalidRequirement {
        /// Error message
        message: String,
    },

    /// Score file could not be interpreted
    #[error("Score file error: {message}")]
    Score {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Lane graph topology is inconsistent
    #[error("Invalid lane graph: {message}")]
    Topology {
        /// Error message
        message: String,
    },

    /// The world source failed to produce a snapshot
    #[error("World source error: {message}")]
    World {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl RulemonError {
    /// Create an oracle failure
    #[must_use]
    pub fn oracle(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Oracle {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Create a schema error
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a malformed row error
    #[must_use]
    pub fn malformed_row(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedRow {
            line,
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a lane graph topology error
    #[must_use]
    pub fn topology(message: impl Into<String>) -> Self {
        Self::Topology {
            message: message.into(),
        }
    }

    /// Create a world source error
    #[must_use]
    pub fn world(message: impl Into<String>) -> Self {
        Self::World {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ego_not_found_message() {
        let err = RulemonError::EgoNotFound {
            role: "hero".to_string(),
            searched: 3,
        };
        assert!(err.to_string().contains("hero"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_malformed_row_message() {
        let err = RulemonError::malformed_row(4, "expected 7 columns, got 6");
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RulemonError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
