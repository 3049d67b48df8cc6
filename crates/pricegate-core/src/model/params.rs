//! Closed set of regressor kinds and their parameter tables.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::{PricegateError, Result};

/// Supported regressor kinds. Names match the `best_model` config values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LinearRegression,
    RandomForest,
    GradientBoosting,
    XGBoost,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::LinearRegression,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::XGBoost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "LinearRegression",
            ModelKind::RandomForest => "RandomForest",
            ModelKind::GradientBoosting => "GradientBoosting",
            ModelKind::XGBoost => "XGBoost",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = PricegateError;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| PricegateError::UnsupportedModel(s.to_string()))
    }
}

/// How many features a tree may consider at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxFeatures {
    Count(usize),
    Fraction(f64),
    Rule(FeatureRule),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureRule {
    Sqrt,
    Log2,
}

impl MaxFeatures {
    /// Number of candidate features out of `n_features`, at least one.
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features.max(1);
        let k = match self {
            MaxFeatures::Count(c) => c,
            MaxFeatures::Fraction(f) => (f * n as f64).floor() as usize,
            MaxFeatures::Rule(FeatureRule::Sqrt) => (n as f64).sqrt().floor() as usize,
            MaxFeatures::Rule(FeatureRule::Log2) => (n as f64).log2().floor() as usize,
        };
        k.clamp(1, n)
    }
}

/// Least-squares solver used by smartcore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearSolver {
    Qr,
    /// Tolerates collinear and constant columns.
    Svd,
}

/// smartcore `LinearRegression`. The intercept is always fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearParams {
    #[serde(default = "default_solver")]
    pub solver: LinearSolver,
}

/// smartcore `RandomForestRegressor`. Trees are grown on bootstrap samples
/// drawn from `random_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomForestParams {
    #[serde(default = "default_estimators")]
    pub n_estimators: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default)]
    pub max_features: Option<MaxFeatures>,
    #[serde(default = "default_seed")]
    pub random_state: u64,
}

/// Classic squared-loss gradient boosting, trained with xgboost's tree
/// booster and no leaf regularization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GradientBoostingParams {
    #[serde(default = "default_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_gb_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_gb_depth")]
    pub max_depth: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default = "default_subsample")]
    pub subsample: f64,
}

/// xgboost tree booster with the `reg:linear` objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XGBoostParams {
    #[serde(default = "default_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_xgb_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_xgb_depth")]
    pub max_depth: usize,
    #[serde(default = "default_reg_lambda")]
    pub reg_lambda: f64,
    #[serde(default = "default_min_child_weight")]
    pub min_child_weight: f64,
    #[serde(default)]
    pub gamma: f64,
    #[serde(default = "default_subsample")]
    pub subsample: f64,
}

fn default_solver() -> LinearSolver {
    LinearSolver::Svd
}
fn default_estimators() -> usize {
    100
}
fn default_min_samples_split() -> usize {
    2
}
fn default_min_samples_leaf() -> usize {
    1
}
fn default_seed() -> u64 {
    42
}
fn default_gb_learning_rate() -> f64 {
    0.1
}
fn default_gb_depth() -> usize {
    3
}
fn default_xgb_learning_rate() -> f64 {
    0.3
}
fn default_xgb_depth() -> usize {
    6
}
fn default_reg_lambda() -> f64 {
    1.0
}
fn default_min_child_weight() -> f64 {
    1.0
}
fn default_subsample() -> f64 {
    1.0
}

const MAX_FOREST_DEPTH: usize = u16::MAX as usize;
const MAX_BOOSTED_DEPTH: usize = 64;
const MAX_BOOST_ROUNDS: usize = 100_000;

/// Kind-specific parameters, validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelParams {
    LinearRegression(LinearParams),
    RandomForest(RandomForestParams),
    GradientBoosting(GradientBoostingParams),
    XGBoost(XGBoostParams),
}

impl ModelParams {
    /// Parse the parameter table for `kind`. `null` means "all defaults".
    ///
    /// Unknown parameter names and out-of-range values are configuration
    /// errors; nothing falls back silently.
    pub fn from_value(kind: ModelKind, value: serde_json::Value) -> Result<Self> {
        let value = match value {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };
        let invalid = |e: serde_json::Error| PricegateError::InvalidParameters {
            kind: kind.to_string(),
            reason: e.to_string(),
        };
        let params = match kind {
            ModelKind::LinearRegression => {
                ModelParams::LinearRegression(serde_json::from_value(value).map_err(invalid)?)
            }
            ModelKind::RandomForest => {
                ModelParams::RandomForest(serde_json::from_value(value).map_err(invalid)?)
            }
            ModelKind::GradientBoosting => {
                ModelParams::GradientBoosting(serde_json::from_value(value).map_err(invalid)?)
            }
            ModelKind::XGBoost => {
                ModelParams::XGBoost(serde_json::from_value(value).map_err(invalid)?)
            }
        };
        params.validate()?;
        Ok(params)
    }

    /// Defaults for `kind`.
    pub fn defaults(kind: ModelKind) -> Self {
        match kind {
            ModelKind::LinearRegression => ModelParams::LinearRegression(LinearParams {
                solver: default_solver(),
            }),
            ModelKind::RandomForest => ModelParams::RandomForest(RandomForestParams {
                n_estimators: default_estimators(),
                max_depth: None,
                min_samples_split: default_min_samples_split(),
                min_samples_leaf: default_min_samples_leaf(),
                max_features: None,
                random_state: default_seed(),
            }),
            ModelKind::GradientBoosting => ModelParams::GradientBoosting(GradientBoostingParams {
                n_estimators: default_estimators(),
                learning_rate: default_gb_learning_rate(),
                max_depth: default_gb_depth(),
                min_samples_leaf: default_min_samples_leaf(),
                subsample: default_subsample(),
            }),
            ModelKind::XGBoost => ModelParams::XGBoost(XGBoostParams {
                n_estimators: default_estimators(),
                learning_rate: default_xgb_learning_rate(),
                max_depth: default_xgb_depth(),
                reg_lambda: default_reg_lambda(),
                min_child_weight: default_min_child_weight(),
                gamma: 0.0,
                subsample: default_subsample(),
            }),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelParams::LinearRegression(_) => ModelKind::LinearRegression,
            ModelParams::RandomForest(_) => ModelKind::RandomForest,
            ModelParams::GradientBoosting(_) => ModelKind::GradientBoosting,
            ModelParams::XGBoost(_) => ModelKind::XGBoost,
        }
    }

    /// Parameters as `name -> rendered value`, for experiment trackers.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let value = match self {
            ModelParams::LinearRegression(p) => serde_json::to_value(p),
            ModelParams::RandomForest(p) => serde_json::to_value(p),
            ModelParams::GradientBoosting(p) => serde_json::to_value(p),
            ModelParams::XGBoost(p) => serde_json::to_value(p),
        };
        let mut flat = BTreeMap::new();
        if let Ok(serde_json::Value::Object(map)) = value {
            for (key, v) in map {
                let rendered = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                flat.insert(key, rendered);
            }
        }
        flat
    }

    fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(PricegateError::InvalidParameters {
                kind: self.kind().to_string(),
                reason: reason.to_string(),
            })
        };
        let fraction_ok = |v: f64| v > 0.0 && v <= 1.0;

        match self {
            ModelParams::LinearRegression(_) => Ok(()),
            ModelParams::RandomForest(p) => {
                if p.n_estimators == 0 {
                    return fail("n_estimators must be at least 1");
                }
                match p.max_depth {
                    Some(0) => return fail("max_depth must be at least 1"),
                    Some(d) if d > MAX_FOREST_DEPTH => {
                        return fail("max_depth must be at most 65535")
                    }
                    _ => {}
                }
                if p.min_samples_split < 2 {
                    return fail("min_samples_split must be at least 2");
                }
                if p.min_samples_leaf == 0 {
                    return fail("min_samples_leaf must be at least 1");
                }
                match p.max_features {
                    Some(MaxFeatures::Count(0)) => fail("max_features must be at least 1"),
                    Some(MaxFeatures::Fraction(f)) if !fraction_ok(f) => {
                        fail("max_features fraction must be in (0, 1]")
                    }
                    _ => Ok(()),
                }
            }
            ModelParams::GradientBoosting(p) => {
                if p.n_estimators == 0 || p.n_estimators > MAX_BOOST_ROUNDS {
                    return fail("n_estimators must be in 1..=100000");
                }
                if !fraction_ok(p.learning_rate) {
                    return fail("learning_rate must be in (0, 1]");
                }
                if p.max_depth == 0 || p.max_depth > MAX_BOOSTED_DEPTH {
                    return fail("max_depth must be in 1..=64");
                }
                if p.min_samples_leaf == 0 {
                    return fail("min_samples_leaf must be at least 1");
                }
                if !fraction_ok(p.subsample) {
                    return fail("subsample must be in (0, 1]");
                }
                Ok(())
            }
            ModelParams::XGBoost(p) => {
                if p.n_estimators == 0 || p.n_estimators > MAX_BOOST_ROUNDS {
                    return fail("n_estimators must be in 1..=100000");
                }
                if !fraction_ok(p.learning_rate) {
                    return fail("learning_rate must be in (0, 1]");
                }
                if p.max_depth == 0 || p.max_depth > MAX_BOOSTED_DEPTH {
                    return fail("max_depth must be in 1..=64");
                }
                if [p.reg_lambda, p.gamma, p.min_child_weight]
                    .iter()
                    .any(|v| v.is_nan() || *v < 0.0)
                {
                    return fail("reg_lambda, gamma and min_child_weight must be non-negative");
                }
                if !fraction_ok(p.subsample) {
                    return fail("subsample must be in (0, 1]");
                }
                Ok(())
            }
        }
    }
}
