//! Domain-level error taxonomy for Pricegate.

use pricegate_store::StorageError;

/// Coarse classification used by binaries to pick an exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Input,
    Storage,
    Internal,
}

impl ErrorKind {
    /// Process exit code for this class of failure.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::Input => 3,
            ErrorKind::Storage => 4,
            ErrorKind::Internal => 1,
        }
    }
}

/// Pricegate domain errors.
#[derive(Debug, thiserror::Error)]
pub enum PricegateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("invalid model parameters for {kind}: {reason}")]
    InvalidParameters { kind: String, reason: String },

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("missing column '{column}' in {context}")]
    MissingColumn { column: String, context: String },

    #[error("metric {metric} is undefined: {reason}")]
    MetricUndefined { metric: String, reason: String },

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("invalid version string '{0}'")]
    InvalidVersion(String),

    #[error("model failure: {0}")]
    Model(String),

    #[error("git error: {0}")]
    GitError(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PricegateError {
    /// Classify the error for exit-code mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PricegateError::Config(_)
            | PricegateError::UnsupportedModel(_)
            | PricegateError::InvalidParameters { .. }
            | PricegateError::InvalidVersion(_) => ErrorKind::Configuration,
            PricegateError::InvalidDataset(_)
            | PricegateError::MissingColumn { .. }
            | PricegateError::MetricUndefined { .. }
            | PricegateError::InvalidArtifact(_)
            | PricegateError::Io(_) => ErrorKind::Input,
            PricegateError::Storage(_) => ErrorKind::Storage,
            PricegateError::Model(_)
            | PricegateError::GitError(_)
            | PricegateError::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for Pricegate domain operations.
pub type Result<T> = std::result::Result<T, PricegateError>;
