//! xgboost tree boosters. The trained booster is stored as its binary model
//! file, hex encoded.

use std::fmt;

use xgboost::parameters::learning::{LearningTaskParametersBuilder, Objective};
use xgboost::parameters::tree::TreeBoosterParametersBuilder;
use xgboost::parameters::{BoosterParametersBuilder, BoosterType, TrainingParametersBuilder};
use xgboost::{Booster, DMatrix};

use super::params::{GradientBoostingParams, XGBoostParams};
use crate::domain::error::{PricegateError, Result};

/// Tree booster settings shared by both boosted kinds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TreeSettings {
    pub rounds: usize,
    pub eta: f64,
    pub max_depth: usize,
    pub lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub subsample: f64,
}

impl From<&GradientBoostingParams> for TreeSettings {
    /// Plain gradient boosting: no leaf penalty, leaf size as a hessian floor.
    fn from(p: &GradientBoostingParams) -> Self {
        Self {
            rounds: p.n_estimators,
            eta: p.learning_rate,
            max_depth: p.max_depth,
            lambda: 0.0,
            gamma: 0.0,
            min_child_weight: p.min_samples_leaf as f64,
            subsample: p.subsample,
        }
    }
}

impl From<&XGBoostParams> for TreeSettings {
    fn from(p: &XGBoostParams) -> Self {
        Self {
            rounds: p.n_estimators,
            eta: p.learning_rate,
            max_depth: p.max_depth,
            lambda: p.reg_lambda,
            gamma: p.gamma,
            min_child_weight: p.min_child_weight,
            subsample: p.subsample,
        }
    }
}

fn xgb_error(e: impl fmt::Display) -> PricegateError {
    PricegateError::Model(format!("xgboost: {e}"))
}

fn dense(rows: &[Vec<f64>]) -> Result<DMatrix> {
    let flat: Vec<f32> = rows.iter().flatten().map(|v| *v as f32).collect();
    DMatrix::from_dense(&flat, rows.len()).map_err(xgb_error)
}

fn to_u32(value: usize, name: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| xgb_error(format!("{name} {value} is out of range")))
}

pub(crate) fn fit(settings: &TreeSettings, x: &[Vec<f64>], y: &[f64]) -> Result<String> {
    let mut dtrain = dense(x)?;
    let labels: Vec<f32> = y.iter().map(|v| *v as f32).collect();
    dtrain.set_labels(&labels).map_err(xgb_error)?;

    let tree_params = TreeBoosterParametersBuilder::default()
        .eta(settings.eta as f32)
        .max_depth(to_u32(settings.max_depth, "max_depth")?)
        .lambda(settings.lambda as f32)
        .gamma(settings.gamma as f32)
        .min_child_weight(settings.min_child_weight as f32)
        .subsample(settings.subsample as f32)
        .build()
        .map_err(xgb_error)?;
    let learning_params = LearningTaskParametersBuilder::default()
        .objective(Objective::RegLinear)
        .build()
        .map_err(xgb_error)?;
    let booster_params = BoosterParametersBuilder::default()
        .booster_type(BoosterType::Tree(tree_params))
        .learning_params(learning_params)
        .verbose(false)
        .build()
        .map_err(xgb_error)?;
    let training = TrainingParametersBuilder::default()
        .dtrain(&dtrain)
        .boost_rounds(to_u32(settings.rounds, "n_estimators")?)
        .booster_params(booster_params)
        .build()
        .map_err(xgb_error)?;

    let booster = Booster::train(&training).map_err(xgb_error)?;
    Ok(hex::encode(model_bytes(&booster)?))
}

fn model_bytes(booster: &Booster) -> Result<Vec<u8>> {
    let file = tempfile::NamedTempFile::new()?;
    booster.save(file.path()).map_err(xgb_error)?;
    Ok(std::fs::read(file.path())?)
}

fn load(model: &str) -> Result<Booster> {
    let bytes = hex::decode(model).map_err(|e| {
        PricegateError::InvalidArtifact(format!("booster payload is not hex: {e}"))
    })?;
    Booster::load_buffer(&bytes)
        .map_err(|e| PricegateError::InvalidArtifact(format!("cannot load booster: {e}")))
}

pub(crate) fn predict(model: &str, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
    let booster = load(model)?;
    let matrix = dense(rows)?;
    let predictions = booster.predict(&matrix).map_err(xgb_error)?;
    Ok(predictions.into_iter().map(f64::from).collect())
}

pub(crate) fn check(model: &str) -> Result<()> {
    load(model).map(drop)
}
