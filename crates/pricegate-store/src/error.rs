//! Error types for pricegate-store

use thiserror::Error;

/// Errors that can occur in the object storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// No object stored under the key
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Key failed validation before reaching the backend
    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Backend refused or failed the operation
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether this error means the object simply is not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
