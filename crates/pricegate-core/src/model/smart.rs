//! smartcore linear and random-forest regressors, kept in their serde form.

use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::error::Failed;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};

use super::params::{LinearParams, LinearSolver, RandomForestParams};
use crate::domain::error::{PricegateError, Result};

type Linear = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;
type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

fn matrix(rows: &[Vec<f64>]) -> DenseMatrix<f64> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
}

fn fit_failed(e: Failed) -> PricegateError {
    PricegateError::Model(format!("smartcore fit failed: {e}"))
}

fn predict_failed(e: Failed) -> PricegateError {
    PricegateError::Model(format!("smartcore predict failed: {e}"))
}

fn undecodable(e: serde_json::Error) -> PricegateError {
    PricegateError::InvalidArtifact(format!("cannot decode smartcore model: {e}"))
}

pub(crate) fn fit_linear(
    params: &LinearParams,
    x: &[Vec<f64>],
    y: &[f64],
) -> Result<serde_json::Value> {
    let solver = match params.solver {
        LinearSolver::Qr => LinearRegressionSolverName::QR,
        LinearSolver::Svd => LinearRegressionSolverName::SVD,
    };
    let model = Linear::fit(
        &matrix(x),
        &y.to_vec(),
        LinearRegressionParameters::default().with_solver(solver),
    )
    .map_err(fit_failed)?;
    Ok(serde_json::to_value(&model)?)
}

pub(crate) fn fit_forest(
    params: &RandomForestParams,
    x: &[Vec<f64>],
    y: &[f64],
) -> Result<serde_json::Value> {
    let n_features = x.first().map(Vec::len).unwrap_or(0);
    let mut parameters = RandomForestRegressorParameters::default()
        .with_n_trees(params.n_estimators)
        .with_min_samples_split(params.min_samples_split)
        .with_min_samples_leaf(params.min_samples_leaf)
        .with_seed(params.random_state);
    if let Some(depth) = params.max_depth {
        let depth = u16::try_from(depth).map_err(|_| PricegateError::InvalidParameters {
            kind: "RandomForest".to_string(),
            reason: format!("max_depth {depth} is too large"),
        })?;
        parameters = parameters.with_max_depth(depth);
    }
    if let Some(max_features) = params.max_features {
        parameters = parameters.with_m(max_features.resolve(n_features));
    }
    let model = Forest::fit(&matrix(x), &y.to_vec(), parameters).map_err(fit_failed)?;
    Ok(serde_json::to_value(&model)?)
}

pub(crate) fn predict_linear(model: &serde_json::Value, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
    let model: Linear = serde_json::from_value(model.clone()).map_err(undecodable)?;
    model.predict(&matrix(rows)).map_err(predict_failed)
}

pub(crate) fn predict_forest(model: &serde_json::Value, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
    let model: Forest = serde_json::from_value(model.clone()).map_err(undecodable)?;
    model.predict(&matrix(rows)).map_err(predict_failed)
}

pub(crate) fn check_linear(model: &serde_json::Value) -> Result<()> {
    serde_json::from_value::<Linear>(model.clone())
        .map(drop)
        .map_err(undecodable)
}

pub(crate) fn check_forest(model: &serde_json::Value) -> Result<()> {
    serde_json::from_value::<Forest>(model.clone())
        .map(drop)
        .map_err(undecodable)
}
