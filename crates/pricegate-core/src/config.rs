//! TOML configuration file.
//!
//! ```toml
//! [model]
//! name = "house-price-model"
//! best_model = "XGBoost"
//! target_variable = "price"
//!
//! [model.parameters]
//! n_estimators = 200
//! max_depth = 6
//! learning_rate = 0.05
//!
//! [training]
//! test_size = 0.2
//! cv_folds = 5
//! random_state = 42
//!
//! [versioning]
//! major = 1
//!
//! [tracking]
//! uri = "http://localhost:5555"
//!
//! [gate]
//! min_r2 = 0.6
//!
//! [deploy]
//! bucket = "house-price-mlops"
//! storage_root = "./storage"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::DEFAULT_TARGET;
use crate::deploy::DEFAULT_MODEL_NAME;
use crate::domain::error::{PricegateError, Result};
use crate::domain::GateThresholds;
use crate::model::{ModelKind, ModelParams};
use crate::tracker::TrackingConfig;
use crate::training::{SplitConfig, TrainingConfig};
use crate::versioning::VersionConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PRICEGATE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Regressor kind, e.g. `"RandomForest"`.
    pub best_model: String,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    #[serde(default = "default_target")]
    pub target_variable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Model name used for storage keys; defaults to `[model].name`.
    #[serde(default)]
    pub model_name: Option<String>,
    /// Root directory of the filesystem object store.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            model_name: None,
            storage_root: default_storage_root(),
        }
    }
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_target() -> String {
    DEFAULT_TARGET.to_string()
}

fn default_bucket() -> String {
    "house-price-mlops".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage")
}

/// Whole configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricegateConfig {
    pub model: ModelSection,
    #[serde(default)]
    pub training: SplitConfig,
    #[serde(default)]
    pub versioning: VersionConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub gate: GateThresholds,
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl FromStr for PricegateConfig {
    type Err = PricegateError;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| PricegateError::Config(e.to_string()))
    }
}

impl PricegateConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PricegateError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        text.parse()
    }

    /// Kind and parameters resolved and validated.
    pub fn training_config(&self) -> Result<TrainingConfig> {
        let kind = ModelKind::from_str(&self.model.best_model)?;
        let params = ModelParams::from_value(
            kind,
            self.model.parameters.clone().unwrap_or(serde_json::Value::Null),
        )?;
        Ok(TrainingConfig {
            model_name: self.model.name.clone(),
            target: self.model.target_variable.clone(),
            params,
            split: self.training,
        })
    }

    /// Name used for storage keys.
    pub fn deploy_model_name(&self) -> &str {
        self.deploy.model_name.as_deref().unwrap_or(&self.model.name)
    }

    /// Experiment name for the tracker.
    pub fn experiment_name(&self) -> &str {
        self.tracking
            .experiment
            .as_deref()
            .unwrap_or(&self.model.name)
    }
}
