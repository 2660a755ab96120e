//! Error types for topicbridge-core

use thiserror::Error;

/// Result type alias for topicbridge-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in topicbridge-core
///
/// Everything except [`Error::Payload`] and [`Error::Connector`] is raised
/// while building configuration and is fatal at start-up.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// A rule string could not be parsed
    #[error("invalid rule '{key}': {message}")]
    InvalidRule {
        /// Match key of the offending rule
        key: String,
        /// Description of the error
        message: String,
    },

    /// An inbound payload could not be transformed
    #[error("payload error on '{topic}': {message}")]
    Payload {
        /// Inbound topic of the message
        topic: String,
        /// Description of the error
        message: String,
    },

    /// Transport error
    #[error("connector '{connector}' error: {message}")]
    Connector {
        /// Name of the connector
        connector: String,
        /// Description of the error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn payload(topic: &str, message: impl Into<String>) -> Self {
        Self::Payload {
            topic: topic.to_string(),
            message: message.into(),
        }
    }

    /// True for per-message failures that drop one message but never stop the bridge
    pub fn is_payload(&self) -> bool {
        matches!(self, Self::Payload { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_error_is_not_fatal() {
        let err = Error::payload("home/temp", "field 'x' not found");
        assert!(err.is_payload());
        assert_eq!(
            err.to_string(),
            "payload error on 'home/temp': field 'x' not found"
        );
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let err = Error::ConfigInvalid {
            message: "no rules".to_string(),
        };
        assert!(!err.is_payload());

        let err = Error::InvalidRule {
            key: "temp".to_string(),
            message: "empty property".to_string(),
        };
        assert!(!err.is_payload());
        assert!(err.to_string().contains("'temp'"));
    }
}
