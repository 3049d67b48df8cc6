//! Deployment publisher: versioned artifact upload plus the `latest` pointer.
//!
//! Upload is the commit point. The pointer write that follows is best
//! effort: a failure is logged and reported in [`PublishOutcome`], never
//! propagated, so a crash or outage between the two steps leaves an
//! artifact that is still addressable by version.

use std::path::Path;
use std::sync::Arc;

use pricegate_store::storage_traits::{layout, ObjectStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::domain::error::{PricegateError, Result};
use crate::domain::Version;
use crate::obs::{emit_artifact_published, emit_pointer_update_failed};
use crate::versioning::Versioning;

/// Default model name used when none is configured.
pub const DEFAULT_MODEL_NAME: &str = "house-price-model";

/// Result of a publish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishOutcome {
    /// Storage URI of the uploaded artifact.
    pub uri: String,
    pub version: Version,
    /// SHA-256 of the uploaded bytes, hex encoded.
    pub sha256: String,
    /// Whether `latest/version.txt` now names this version.
    pub pointer_updated: bool,
}

/// Uploads artifacts for one bucket, stamping each with the current version.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    versioning: Versioning,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, versioning: Versioning) -> Self {
        Self { store, versioning }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Upload the file at `local_artifact_path` as the current version.
    pub async fn publish(&self, local_artifact_path: &Path, model_name: &str) -> Result<PublishOutcome> {
        let bytes = tokio::fs::read(local_artifact_path).await.map_err(|e| {
            PricegateError::InvalidArtifact(format!(
                "cannot read {}: {e}",
                local_artifact_path.display()
            ))
        })?;
        self.publish_bytes(&bytes, model_name).await
    }

    /// Upload `bytes` as the current version of `model_name`.
    pub async fn publish_bytes(&self, bytes: &[u8], model_name: &str) -> Result<PublishOutcome> {
        let version = self.versioning.get_version();
        let version_str = version.to_string();
        let key = layout::artifact_key(model_name, &version_str)?;

        self.store.put(&key, bytes).await.map_err(|e| {
            tracing::error!(key = %key, error = %e, "artifact upload failed");
            PricegateError::from(e)
        })?;
        let uri = self.store.uri(&key);
        let sha256 = hex::encode(Sha256::digest(bytes));
        emit_artifact_published(model_name, &version_str, &uri, &sha256);

        let pointer_updated = match self.update_latest(model_name, &version_str).await {
            Ok(()) => true,
            Err(e) => {
                emit_pointer_update_failed(model_name, &version_str, &e);
                false
            }
        };

        Ok(PublishOutcome {
            uri,
            version,
            sha256,
            pointer_updated,
        })
    }

    async fn update_latest(&self, model_name: &str, version: &str) -> Result<()> {
        let key = layout::pointer_key(model_name)?;
        self.store.put(&key, version.as_bytes()).await?;
        Ok(())
    }

    pub async fn list_versions(&self, model_name: &str) -> Result<Vec<Version>> {
        list_versions(self.store.as_ref(), model_name).await
    }

    pub async fn latest_version(&self, model_name: &str) -> Result<Option<String>> {
        latest_version(self.store.as_ref(), model_name).await
    }

    pub async fn fetch_artifact(&self, model_name: &str, version: &str) -> Result<Vec<u8>> {
        fetch_artifact(self.store.as_ref(), model_name, version).await
    }
}

/// Versions stored for `model_name`, newest first by string order.
///
/// Only directory names that parse as a [`Version`] count, so the `latest`
/// pointer and stray directories are skipped. No versions yields an empty
/// list; listing failures propagate.
pub async fn list_versions(store: &dyn ObjectStore, model_name: &str) -> Result<Vec<Version>> {
    let mut versions: Vec<Version> = store
        .list_prefixes(&layout::model_prefix(model_name))
        .await?
        .into_iter()
        .filter(|name| name != layout::LATEST_DIR)
        .filter_map(|name| match name.parse::<Version>() {
            Ok(version) => Some(version),
            Err(_) => {
                tracing::debug!(model = model_name, entry = %name, "skipping non-version prefix");
                None
            }
        })
        .collect();
    versions.sort_by_cached_key(|v| std::cmp::Reverse(v.to_string()));
    Ok(versions)
}

/// Version named by the `latest` pointer, if one was ever written.
pub async fn latest_version(store: &dyn ObjectStore, model_name: &str) -> Result<Option<String>> {
    let key = layout::pointer_key(model_name)?;
    match store.get(&key).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            Ok((!text.is_empty()).then_some(text))
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Download the artifact stored for `version`.
pub async fn fetch_artifact(store: &dyn ObjectStore, model_name: &str, version: &str) -> Result<Vec<u8>> {
    let key = layout::artifact_key(model_name, version)?;
    Ok(store.get(&key).await?)
}
