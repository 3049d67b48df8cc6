//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pricegate_core::{
    ModelArtifact, ModelKind, ModelParams, Publisher, Regressor, RevisionLookup, VersionConfig,
    Versioning,
};
use pricegate_serve::{router, AppState, LoadedModel, ModelSource};
use pricegate_store::fakes::MemoryObjectStore;
use pricegate_store::ObjectStore;
use serde_json::{json, Value};
use tower::ServiceExt;

/// price = 200·sqft_living + 10000·bedrooms + 50000
fn artifact_with_features(features: &[&str]) -> ModelArtifact {
    let x: Vec<Vec<f64>> = (0..40)
        .map(|i| {
            let sqft = 800.0 + 50.0 * i as f64;
            let bedrooms = (1 + i % 5) as f64;
            vec![sqft, bedrooms]
        })
        .collect();
    let y: Vec<f64> = x
        .iter()
        .map(|r| 200.0 * r[0] + 10_000.0 * r[1] + 50_000.0)
        .collect();
    let regressor =
        Regressor::fit(&ModelParams::defaults(ModelKind::LinearRegression), &x, &y).unwrap();
    ModelArtifact::new(
        "house-price-model",
        ModelKind::LinearRegression,
        features.iter().map(|f| f.to_string()).collect(),
        "price",
        regressor,
    )
}

fn app_with_model() -> (Router, AppState) {
    let state = AppState::new(Some(LoadedModel {
        artifact: artifact_with_features(&["sqft_living", "bedrooms"]),
        version: "v1.0.0-a3b4c5d6".to_string(),
    }));
    (router(state.clone()), state)
}

fn house() -> Value {
    json!({
        "bedrooms": 3,
        "bathrooms": 2.0,
        "sqft_living": 1500,
        "sqft_lot": 5000,
        "floors": 1,
        "waterfront": 0,
        "view": 0,
        "condition": 3,
        "grade": 7,
        "sqft_above": 1500,
        "sqft_basement": 0,
        "yr_built": 1990,
        "yr_renovated": 0,
        "zipcode": 98103,
        "lat": 47.6,
        "long": -122.3,
        "sqft_living15": 1400,
        "sqft_lot15": 5000
    })
}

async fn post_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn predict_returns_price_and_version() {
    let (app, state) = app_with_model();
    let (status, body) = post_json(app, "/predict", &house()).await;

    assert_eq!(status, StatusCode::OK);
    let price = body["predicted_price"].as_f64().unwrap();
    assert!((price - 380_000.0).abs() < 1.0, "price {price}");
    assert_eq!(body["model_version"], "v1.0.0-a3b4c5d6");
    assert_eq!(state.metrics().predictions(), 1);
}

#[tokio::test]
async fn missing_field_is_422() {
    let (app, _) = app_with_model();
    let mut body = house();
    body.as_object_mut().unwrap().remove("sqft_living");

    let (status, body) = post_json(app, "/predict", &body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn wrong_type_is_422() {
    let (app, _) = app_with_model();
    let mut body = house();
    body["bedrooms"] = json!("three");

    let (status, _) = post_json(app, "/predict", &body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn out_of_range_is_422() {
    let (app, state) = app_with_model();
    let mut body = house();
    body["lat"] = json!(123.0);

    let (status, body) = post_json(app, "/predict", &body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("lat"));
    assert_eq!(state.metrics().predictions(), 0);
}

#[tokio::test]
async fn unknown_model_feature_is_500() {
    let state = AppState::new(Some(LoadedModel {
        artifact: artifact_with_features(&["sqft_living", "garage_spaces"]),
        version: "v1.0.0-a3b4c5d6".to_string(),
    }));
    let (status, body) = post_json(router(state.clone()), "/predict", &house()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "prediction_failed");
    assert!(body.get("predicted_price").is_none());
    assert_eq!(state.metrics().prediction_errors(), 1);
}

#[tokio::test]
async fn no_model_is_503() {
    let app = router(AppState::new(None));
    let (status, body) = post_json(app, "/predict", &house()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "model_not_loaded");
}

#[tokio::test]
async fn batch_preserves_order_and_count() {
    let (app, state) = app_with_model();
    let mut small = house();
    small["sqft_living"] = json!(1000);
    let batch = json!([house(), small, house()]);

    let (status, body) = post_json(app, "/batch-predict", &batch).await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 3);
    let prices: Vec<f64> = items
        .iter()
        .map(|i| i["predicted_price"].as_f64().unwrap())
        .collect();
    assert!(prices[1] < prices[0]);
    assert!((prices[0] - prices[2]).abs() < 1e-6);
    assert_eq!(state.metrics().predictions(), 3);
}

#[tokio::test]
async fn batch_with_one_bad_element_is_422() {
    let (app, state) = app_with_model();
    let mut bad = house();
    bad["view"] = json!(9);
    let batch = json!([house(), bad]);

    let (status, body) = post_json(app, "/batch-predict", &batch).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().starts_with("item 1"));
    assert_eq!(state.metrics().predictions(), 0);
}

#[tokio::test]
async fn empty_batch_is_empty_array() {
    let (app, _) = app_with_model();
    let (status, body) = post_json(app, "/batch-predict", &json!([])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn health_reports_model_without_inference() {
    let (app, state) = app_with_model();
    let (status, text) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["model_version"], "v1.0.0-a3b4c5d6");
    assert_eq!(state.metrics().predictions(), 0);
    assert_eq!(state.metrics().requests("GET", "/health"), 1);
}

#[tokio::test]
async fn health_without_model() {
    let (status, text) = get(router(AppState::new(None)), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["model_loaded"], false);
    assert!(body["model_version"].is_null());
}

#[tokio::test]
async fn metrics_exposition() {
    let (app, _) = app_with_model();
    let _ = post_json(app.clone(), "/predict", &house()).await;
    let (status, text) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("http_requests_total{method=\"POST\",endpoint=\"/predict\"} 1"));
    assert!(text.contains("predictions_total 1"));
    assert!(text.contains("http_request_duration_seconds_count 1"));
}

#[tokio::test]
async fn loads_latest_published_version() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new("mlops"));
    let artifact = artifact_with_features(&["sqft_living", "bedrooms"]);
    Publisher::new(
        store.clone(),
        Versioning::fixed(
            VersionConfig::default(),
            RevisionLookup::Found("feedc0de".to_string()),
        ),
    )
    .publish_bytes(&artifact.to_json_bytes().unwrap(), "house-price-model")
    .await
    .unwrap();

    let state = AppState::load(&ModelSource::Latest {
        store,
        model_name: "house-price-model".to_string(),
    })
    .await;
    assert!(state.model_loaded());
    assert_eq!(state.model_version(), Some("v1.0.0-feedc0de"));
}

#[tokio::test]
async fn load_failure_leaves_service_unloaded() {
    let state = AppState::load(&ModelSource::Latest {
        store: Arc::new(MemoryObjectStore::default()),
        model_name: "house-price-model".to_string(),
    })
    .await;
    assert!(!state.model_loaded());

    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("model.json");
    std::fs::write(&bogus, b"{not json").unwrap();
    let state = AppState::load(&ModelSource::path(&bogus)).await;
    assert!(!state.model_loaded());
}

#[tokio::test]
async fn loads_artifact_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let artifact = artifact_with_features(&["sqft_living", "bedrooms"]);
    std::fs::write(&path, artifact.to_json_bytes().unwrap()).unwrap();

    let state = AppState::load(&ModelSource::path(&path)).await;
    assert_eq!(state.model_version(), Some("local"));
}
