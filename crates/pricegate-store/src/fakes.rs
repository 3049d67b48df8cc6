//! In-memory fakes for the storage trait (testing only)
//!
//! Provides `MemoryObjectStore`, which satisfies the [`ObjectStore`] contract
//! without touching disk, and `FaultyObjectStore`, which wraps it and fails
//! selected operations so callers' degradation paths can be exercised.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// In-memory object store backed by a `BTreeMap<key, bytes>`.
#[derive(Debug)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("test-bucket")
    }
}

impl MemoryObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Snapshot of every stored key (sorted).
    pub fn keys(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap();
        objects.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn uri(&self, key: &ObjectKey) -> String {
        format!("mem://{}/{}", self.bucket, key)
    }

    async fn put(&self, key: &ObjectKey, data: &[u8]) -> StorageResult<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(key.as_str().to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &ObjectKey) -> StorageResult<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn exists(&self, key: &ObjectKey) -> StorageResult<bool> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.contains_key(key.as_str()))
    }

    async fn list_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>> {
        validate_prefix(prefix)?;
        let objects = self.objects.lock().unwrap();
        let mut names: Vec<String> = objects
            .keys()
            .filter_map(|k| k.strip_prefix(prefix))
            .filter_map(|rest| rest.split_once('/').map(|(dir, _)| dir.to_string()))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
// FaultyObjectStore
// ---------------------------------------------------------------------------

/// Memory store that fails writes to matching keys and, optionally, listings.
#[derive(Debug, Default)]
pub struct FaultyObjectStore {
    inner: MemoryObjectStore,
    fail_puts_containing: Vec<String>,
    fail_gets_containing: Vec<String>,
    fail_listing: bool,
}

impl FaultyObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `put` whose key contains `fragment`.
    pub fn fail_puts_containing(mut self, fragment: &str) -> Self {
        self.fail_puts_containing.push(fragment.to_string());
        self
    }

    /// Fail every `get` whose key contains `fragment`.
    pub fn fail_gets_containing(mut self, fragment: &str) -> Self {
        self.fail_gets_containing.push(fragment.to_string());
        self
    }

    /// Fail every `list_prefixes` call.
    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Underlying store, for inspecting what did get written.
    pub fn inner(&self) -> &MemoryObjectStore {
        &self.inner
    }

    fn matches(fragments: &[String], key: &ObjectKey) -> bool {
        fragments.iter().any(|f| key.as_str().contains(f.as_str()))
    }
}

#[async_trait]
impl ObjectStore for FaultyObjectStore {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    fn uri(&self, key: &ObjectKey) -> String {
        self.inner.uri(key)
    }

    async fn put(&self, key: &ObjectKey, data: &[u8]) -> StorageResult<()> {
        if Self::matches(&self.fail_puts_containing, key) {
            return Err(StorageError::Backend(format!("injected put failure for {key}")));
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &ObjectKey) -> StorageResult<Vec<u8>> {
        if Self::matches(&self.fail_gets_containing, key) {
            return Err(StorageError::Backend(format!("injected get failure for {key}")));
        }
        self.inner.get(key).await
    }

    async fn exists(&self, key: &ObjectKey) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn list_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>> {
        if self.fail_listing {
            return Err(StorageError::Backend(format!(
                "injected list failure for {prefix}"
            )));
        }
        self.inner.list_prefixes(prefix).await
    }
}
