use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::params::ModelKind;
use super::Regressor;
use crate::dataset::Dataset;
use crate::domain::error::{PricegateError, Result};

/// Current artifact schema revision.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Serialized predictor written by training and read by the gate and service.
///
/// The regressor is carried in the fitting library's own serialized form.
///
/// Immutable once written: a retrained model is a new artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model_name: String,
    pub kind: ModelKind,
    /// Column order the regressor expects.
    pub feature_names: Vec<String>,
    pub target: String,
    pub trained_at: DateTime<Utc>,
    pub regressor: Regressor,
}

impl ModelArtifact {
    pub fn new(
        model_name: impl Into<String>,
        kind: ModelKind,
        feature_names: Vec<String>,
        target: impl Into<String>,
        regressor: Regressor,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_name: model_name.into(),
            kind,
            feature_names,
            target: target.into(),
            trained_at: Utc::now(),
            regressor,
        }
    }

    /// Decode and check an artifact. Anything unusable is `InvalidArtifact`.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)
            .map_err(|e| PricegateError::InvalidArtifact(e.to_string()))?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(PricegateError::InvalidArtifact(format!(
                "unsupported format_version {} (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if artifact.feature_names.is_empty() {
            return Err(PricegateError::InvalidArtifact(
                "artifact declares no features".to_string(),
            ));
        }
        artifact.regressor.check_width(artifact.feature_names.len())?;
        Ok(artifact)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Read an artifact file. A missing or unreadable file is an input error.
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            PricegateError::InvalidArtifact(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_bytes(&bytes)
    }

    /// Predict one row given in `feature_names` order.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.feature_names.len() {
            return Err(PricegateError::Model(format!(
                "expected {} feature values, got {}",
                self.feature_names.len(),
                row.len()
            )));
        }
        finite(self.regressor.predict(row)?)
    }

    /// Predict from a lookup of feature values by name.
    ///
    /// A feature the lookup cannot supply is a model failure: the artifact
    /// needs an input the caller's schema does not have.
    pub fn predict_named<F>(&self, lookup: F) -> Result<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let row = self
            .feature_names
            .iter()
            .map(|name| {
                lookup(name).ok_or_else(|| {
                    PricegateError::Model(format!("artifact requires unknown feature '{name}'"))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        self.predict_row(&row)
    }

    /// Predict every row of a dataset, matching columns by name.
    pub fn predict_dataset(&self, dataset: &Dataset) -> Result<Vec<f64>> {
        let rows = dataset.project(&self.feature_names)?;
        self.regressor
            .predict_many(&rows)?
            .into_iter()
            .map(finite)
            .collect()
    }
}

fn finite(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PricegateError::Model(format!(
            "prediction is not finite: {value}"
        )))
    }
}
