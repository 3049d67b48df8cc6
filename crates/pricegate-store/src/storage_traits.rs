//! Storage trait definitions for Pricegate
//!
//! A single abstraction, [`ObjectStore`], models a bucket of immutable-ish
//! blobs addressed by `/`-delimited keys, with S3-style "common prefix"
//! listing. The [`layout`] module owns the key scheme for artifacts and
//! pointers so no caller formats keys by hand.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Validated object key.
///
/// The inner string is private to guarantee it is non-empty, relative, and
/// free of empty or `.`/`..` segments, so every backend can map it onto a
/// path without escaping the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Validate and wrap a key.
    pub fn new(key: impl Into<String>) -> StorageResult<Self> {
        let key = key.into();
        let invalid = |reason: &str| StorageError::InvalidKey {
            key: key.clone(),
            reason: reason.to_string(),
        };

        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        if key.starts_with('/') {
            return Err(invalid("key must be relative"));
        }
        for segment in key.split('/') {
            match segment {
                "" => return Err(invalid("key contains an empty segment")),
                "." | ".." => return Err(invalid("key contains a relative segment")),
                _ => {}
            }
        }
        Ok(ObjectKey(key))
    }

    /// Return the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        ObjectKey::new(s)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bucket-scoped object store.
///
/// Guarantees:
/// - `get(key)` after a successful `put(key, data)` returns exactly `data`.
/// - `put` on an existing key replaces it (last writer wins).
/// - `list_prefixes(prefix)` returns the distinct next-level segment names of
///   keys below `prefix` that continue past that segment, sorted ascending.
///   An unknown prefix yields an empty list, not an error.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket name this store writes into.
    fn bucket(&self) -> &str;

    /// Externally meaningful URI for a key (e.g. `file:///…`, `mem://…`).
    fn uri(&self, key: &ObjectKey) -> String;

    /// Store bytes under `key`, replacing any previous object.
    async fn put(&self, key: &ObjectKey, data: &[u8]) -> StorageResult<()>;

    /// Retrieve bytes. Returns `StorageError::NotFound` if absent.
    async fn get(&self, key: &ObjectKey) -> StorageResult<Vec<u8>>;

    /// Check whether a key exists.
    async fn exists(&self, key: &ObjectKey) -> StorageResult<bool>;

    /// List the "directories" directly below `prefix` (delimiter `/`).
    ///
    /// `prefix` must be empty or end with `/`.
    async fn list_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Check the prefix argument of [`ObjectStore::list_prefixes`].
pub(crate) fn validate_prefix(prefix: &str) -> StorageResult<()> {
    if prefix.is_empty() {
        return Ok(());
    }
    if !prefix.ends_with('/') {
        return Err(StorageError::InvalidKey {
            key: prefix.to_string(),
            reason: "list prefix must end with '/'".to_string(),
        });
    }
    ObjectKey::new(prefix.trim_end_matches('/')).map(|_| ())
}

/// Key scheme for model artifacts and deployment pointers.
pub mod layout {
    use super::{ObjectKey, StorageResult};

    /// Top-level directory for every model.
    pub const MODELS_ROOT: &str = "models";

    /// Reserved directory holding the pointer; never a version.
    pub const LATEST_DIR: &str = "latest";

    /// File name of the uploaded artifact inside a version directory.
    pub const ARTIFACT_FILE: &str = "model.tar.gz";

    /// File name of the pointer inside the `latest` directory.
    pub const POINTER_FILE: &str = "version.txt";

    /// `models/<model_name>/`
    pub fn model_prefix(model_name: &str) -> String {
        format!("{}/{}/", MODELS_ROOT, model_name)
    }

    /// `models/<model_name>/<version>/model.tar.gz`
    pub fn artifact_key(model_name: &str, version: &str) -> StorageResult<ObjectKey> {
        ObjectKey::new(format!(
            "{}{}/{}",
            model_prefix(model_name),
            version,
            ARTIFACT_FILE
        ))
    }

    /// `models/<model_name>/latest/version.txt`
    pub fn pointer_key(model_name: &str) -> StorageResult<ObjectKey> {
        ObjectKey::new(format!(
            "{}{}/{}",
            model_prefix(model_name),
            LATEST_DIR,
            POINTER_FILE
        ))
    }
}
