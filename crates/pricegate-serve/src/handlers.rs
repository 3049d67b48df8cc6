//! Routes and handlers.

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use pricegate_core::{HouseFeatures, PredictionResponse};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::error::ApiError;
use crate::metrics::CONTENT_TYPE;
use crate::state::{AppState, LoadedModel};

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/batch-predict", post(batch_predict))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn predict_one(model: &LoadedModel, house: &HouseFeatures) -> Result<PredictionResponse, ApiError> {
    let price = model
        .artifact
        .predict_named(|name| house.get(name))
        .map_err(|e| ApiError::Prediction(e.to_string()))?;
    Ok(PredictionResponse {
        predicted_price: price,
        model_version: model.version.clone(),
    })
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<HouseFeatures>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let start = Instant::now();
    let metrics = state.metrics();
    metrics.record_request("POST", "/predict");

    let Json(house) = payload?;
    let violations = house.validate();
    if !violations.is_empty() {
        return Err(ApiError::from_violations(&violations, None));
    }
    let model = state.model().ok_or(ApiError::ModelNotLoaded)?;

    let result = predict_one(model, &house);
    match &result {
        Ok(_) => metrics.record_predictions(1),
        Err(e) => {
            warn!(error = %e, "Prediction failed");
            metrics.record_prediction_error();
        }
    }
    metrics.observe_duration(start.elapsed());
    result.map(Json)
}

/// Validates every element before predicting any; one bad element fails the
/// whole batch.
async fn batch_predict(
    State(state): State<AppState>,
    payload: Result<Json<Vec<HouseFeatures>>, JsonRejection>,
) -> Result<Json<Vec<PredictionResponse>>, ApiError> {
    let start = Instant::now();
    let metrics = state.metrics();
    metrics.record_request("POST", "/batch-predict");

    let Json(houses) = payload?;
    for (i, house) in houses.iter().enumerate() {
        let violations = house.validate();
        if !violations.is_empty() {
            return Err(ApiError::from_violations(&violations, Some(i)));
        }
    }
    let model = state.model().ok_or(ApiError::ModelNotLoaded)?;

    let result = houses
        .iter()
        .map(|house| predict_one(model, house))
        .collect::<Result<Vec<_>, _>>();
    match &result {
        Ok(predictions) => metrics.record_predictions(predictions.len() as u64),
        Err(e) => {
            warn!(error = %e, batch = houses.len(), "Batch prediction failed");
            metrics.record_prediction_error();
        }
    }
    metrics.observe_duration(start.elapsed());
    result.map(Json)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    state.metrics().record_request("GET", "/health");
    Json(json!({
        "status": "healthy",
        "model_loaded": state.model_loaded(),
        "model_version": state.model_version(),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], state.metrics().render())
}
