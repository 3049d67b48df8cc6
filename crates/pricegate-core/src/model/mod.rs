//! Regressors and the serialized model artifact.
//!
//! Fitting is delegated to smartcore (linear, random forest) and xgboost
//! (both boosted kinds). A fitted [`Regressor`] keeps the library's own
//! serialized model, so an artifact is self-contained.

pub mod artifact;
mod booster;
pub mod params;
mod smart;

use serde::{Deserialize, Serialize};

use crate::domain::error::{PricegateError, Result};

use booster::TreeSettings;

pub use artifact::{ModelArtifact, ARTIFACT_FORMAT_VERSION};
pub use params::{
    FeatureRule, GradientBoostingParams, LinearParams, LinearSolver, MaxFeatures, ModelKind,
    ModelParams, RandomForestParams, XGBoostParams,
};

/// A fitted predictor in the serialized form of the library that trained it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Regressor {
    /// smartcore `LinearRegression`.
    Linear {
        n_features: usize,
        model: serde_json::Value,
    },
    /// smartcore `RandomForestRegressor`.
    Forest {
        n_features: usize,
        model: serde_json::Value,
    },
    /// xgboost binary model, hex encoded.
    Booster { n_features: usize, model: String },
}

impl Regressor {
    /// Fit the regressor selected by `params`. Deterministic for fixed seeds.
    pub fn fit(params: &ModelParams, x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(PricegateError::InvalidDataset(format!(
                "cannot fit on {} rows with {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(PricegateError::InvalidDataset(
                "feature rows must share a non-zero width".to_string(),
            ));
        }

        let fitted = match params {
            ModelParams::LinearRegression(p) => Regressor::Linear {
                n_features,
                model: smart::fit_linear(p, x, y)?,
            },
            ModelParams::RandomForest(p) => Regressor::Forest {
                n_features,
                model: smart::fit_forest(p, x, y)?,
            },
            ModelParams::GradientBoosting(p) => Regressor::Booster {
                n_features,
                model: booster::fit(&TreeSettings::from(p), x, y)?,
            },
            ModelParams::XGBoost(p) => Regressor::Booster {
                n_features,
                model: booster::fit(&TreeSettings::from(p), x, y)?,
            },
        };
        Ok(fitted)
    }

    /// Width of the rows the regressor was fit on.
    pub fn n_features(&self) -> usize {
        match self {
            Regressor::Linear { n_features, .. }
            | Regressor::Forest { n_features, .. }
            | Regressor::Booster { n_features, .. } => *n_features,
        }
    }

    /// Predict every row. The stored model is decoded once per call.
    pub fn predict_many(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let width = self.n_features();
        if let Some(row) = rows.iter().find(|r| r.len() != width) {
            return Err(PricegateError::Model(format!(
                "expected {width} feature values, got {}",
                row.len()
            )));
        }
        let predictions = match self {
            Regressor::Linear { model, .. } => smart::predict_linear(model, rows)?,
            Regressor::Forest { model, .. } => smart::predict_forest(model, rows)?,
            Regressor::Booster { model, .. } => booster::predict(model, rows)?,
        };
        if predictions.len() != rows.len() {
            return Err(PricegateError::Model(format!(
                "{} predictions for {} rows",
                predictions.len(),
                rows.len()
            )));
        }
        Ok(predictions)
    }

    pub fn predict(&self, row: &[f64]) -> Result<f64> {
        let predictions = self.predict_many(&[row.to_vec()])?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| PricegateError::Model("no prediction returned".to_string()))
    }

    /// Check the stored model decodes and takes rows of width `n_features`.
    pub fn check_width(&self, n_features: usize) -> Result<()> {
        if self.n_features() != n_features {
            return Err(PricegateError::InvalidArtifact(format!(
                "regressor was fit on {} features, artifact declares {n_features}",
                self.n_features()
            )));
        }
        match self {
            Regressor::Linear { model, .. } => smart::check_linear(model),
            Regressor::Forest { model, .. } => smart::check_forest(model),
            Regressor::Booster { model, .. } => booster::check(model),
        }
    }
}
