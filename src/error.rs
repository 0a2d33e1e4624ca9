//! Error types for HKTK

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, HealthError>;

/// Errors that can occur while building collections or computing features
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Collection for type {expected} received a record of type {found}")]
    MixedTypes { expected: String, found: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Failed to parse records: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Date parse error: {0}")]
    DateParseError(String),
}
