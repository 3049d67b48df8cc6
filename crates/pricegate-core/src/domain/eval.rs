//! Metric and threshold types shared by training and the evaluation gate.

use serde::{Deserialize, Serialize};

/// Promotion thresholds applied by the evaluation gate.
///
/// `Default` is the standard gate: `min_r2 = 0.6`, `max_mae = 80000`,
/// `max_mape = 20`. Deployments may override any subset through the `[gate]`
/// config table; unset fields keep the defaults.
/// The values actually applied are written into every
/// [`EvaluationReport`](crate::gate::EvaluationReport), so a report always
/// shows which gate it passed or failed.
///
/// All comparisons are strict: `r2 > min_r2`, `mae < max_mae`,
/// `mape < max_mape` (MAPE in percent).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GateThresholds {
    #[serde(default = "default_min_r2")]
    pub min_r2: f64,
    #[serde(default = "default_max_mae")]
    pub max_mae: f64,
    #[serde(default = "default_max_mape")]
    pub max_mape: f64,
}

fn default_min_r2() -> f64 {
    0.6
}

fn default_max_mae() -> f64 {
    80_000.0
}

fn default_max_mape() -> f64 {
    20.0
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_r2: default_min_r2(),
            max_mae: default_max_mae(),
            max_mape: default_max_mape(),
        }
    }
}

/// Holdout metrics recomputed by the gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HoldoutMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    /// Mean absolute percentage error, in percent.
    pub mape: f64,
}

/// Metrics produced by the training step, persisted next to the artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
    pub cv_r2_mean: f64,
    pub cv_r2_std: f64,
    pub n_train: usize,
    pub n_test: usize,
}

impl TrainingMetrics {
    /// Named metric values in a stable order, for trackers and logs.
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("mae", self.mae),
            ("mse", self.mse),
            ("rmse", self.rmse),
            ("r2", self.r2),
            ("cv_r2_mean", self.cv_r2_mean),
            ("cv_r2_std", self.cv_r2_std),
        ]
    }
}
