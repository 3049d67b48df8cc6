//! Loaded model and shared service state.

use std::path::PathBuf;
use std::sync::Arc;

use pricegate_core::{fetch_artifact, latest_version, ModelArtifact, PricegateError, Result};
use pricegate_store::ObjectStore;
use tracing::{info, warn};

use crate::metrics::ServiceMetrics;

/// Version label reported for an artifact loaded from a local path.
pub const LOCAL_VERSION: &str = "local";

/// Where the service finds its one artifact.
#[derive(Clone)]
pub enum ModelSource {
    /// A local artifact file.
    Path { path: PathBuf, version: String },
    /// Whatever `models/<model_name>/latest/version.txt` names.
    Latest {
        store: Arc<dyn ObjectStore>,
        model_name: String,
    },
}

impl ModelSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ModelSource::Path {
            path: path.into(),
            version: LOCAL_VERSION.to_string(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ModelSource::Path { path, .. } => path.display().to_string(),
            ModelSource::Latest { store, model_name } => {
                format!("{}/models/{model_name}/latest", store.bucket())
            }
        }
    }
}

/// An artifact plus the version label returned with every prediction.
#[derive(Debug)]
pub struct LoadedModel {
    pub artifact: ModelArtifact,
    pub version: String,
}

/// Read and decode the artifact `source` points at.
pub async fn load_model(source: &ModelSource) -> Result<LoadedModel> {
    match source {
        ModelSource::Path { path, version } => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                PricegateError::InvalidArtifact(format!("cannot read {}: {e}", path.display()))
            })?;
            Ok(LoadedModel {
                artifact: ModelArtifact::from_json_bytes(&bytes)?,
                version: version.clone(),
            })
        }
        ModelSource::Latest { store, model_name } => {
            let version = latest_version(store.as_ref(), model_name)
                .await?
                .ok_or_else(|| {
                    PricegateError::InvalidArtifact(format!(
                        "no published version of {model_name}"
                    ))
                })?;
            let bytes = fetch_artifact(store.as_ref(), model_name, &version).await?;
            Ok(LoadedModel {
                artifact: ModelArtifact::from_json_bytes(&bytes)?,
                version,
            })
        }
    }
}

/// State shared by every handler. The model never changes after startup.
#[derive(Clone, Default)]
pub struct AppState {
    model: Option<Arc<LoadedModel>>,
    metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(model: Option<LoadedModel>) -> Self {
        Self {
            model: model.map(Arc::new),
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }

    /// Load from `source`; on failure the service still starts, unloaded.
    pub async fn load(source: &ModelSource) -> Self {
        match load_model(source).await {
            Ok(model) => {
                info!(
                    source = %source.describe(),
                    version = %model.version,
                    kind = %model.artifact.kind,
                    "Model loaded"
                );
                Self::new(Some(model))
            }
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "Model failed to load");
                Self::new(None)
            }
        }
    }

    pub fn model(&self) -> Option<&Arc<LoadedModel>> {
        self.model.as_ref()
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_version(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.version.as_str())
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }
}
