//! Optional experiment tracking.
//!
//! Training logs parameters and metrics through [`ExperimentTracker`]. With
//! a tracking URI configured, [`MlflowTracker`] talks to an MLflow-compatible
//! REST server; otherwise [`NoopTracker`] discards everything. Tracker
//! failures never fail training: callers log them and move on.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Errors from the tracking backend.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("tracking server rejected {endpoint}: {status} {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("unexpected tracking response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        TrackerError::Http(err.to_string())
    }
}

/// `[tracking]` config section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    /// Tracking server base URI; tracking is disabled when unset.
    #[serde(default)]
    pub uri: Option<String>,
    /// Experiment name; defaults to the model name.
    #[serde(default)]
    pub experiment: Option<String>,
}

/// One training run as seen by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRun {
    pub experiment: String,
    pub run_name: String,
    pub params: BTreeMap<String, String>,
    pub metrics: Vec<(String, f64)>,
    pub tags: BTreeMap<String, String>,
}

#[async_trait]
pub trait ExperimentTracker: Send + Sync {
    /// Record a finished run. Returns the backend's run id when it has one.
    async fn log_run(&self, run: &TrackedRun) -> Result<Option<String>, TrackerError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Tracker used when no URI is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

#[async_trait]
impl ExperimentTracker for NoopTracker {
    async fn log_run(&self, run: &TrackedRun) -> Result<Option<String>, TrackerError> {
        debug!(run_name = %run.run_name, "experiment tracking disabled");
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// MLflow REST API (`/api/2.0/mlflow/...`) client.
pub struct MlflowTracker {
    base_url: String,
    http_client: reqwest::Client,
}

impl MlflowTracker {
    pub fn new(base_url: &str) -> Result<Self, TrackerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("pricegate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, TrackerError> {
        let response = self
            .http_client
            .post(self.endpoint(path))
            .json(&body)
            .send()
            .await?;
        read_json(path, response).await
    }

    async fn experiment_id(&self, name: &str) -> Result<String, TrackerError> {
        let response = self
            .http_client
            .get(self.endpoint("experiments/get-by-name"))
            .query(&[("experiment_name", name)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            let created = self
                .post("experiments/create", json!({ "name": name }))
                .await?;
            return string_field(&created, &["experiment_id"]);
        }
        let found = read_json("experiments/get-by-name", response).await?;
        string_field(&found, &["experiment", "experiment_id"])
    }
}

async fn read_json(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value, TrackerError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TrackerError::Rejected {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

fn string_field(value: &serde_json::Value, path: &[&str]) -> Result<String, TrackerError> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| TrackerError::Protocol(format!("missing field {}", path.join("."))))
}

#[async_trait]
impl ExperimentTracker for MlflowTracker {
    async fn log_run(&self, run: &TrackedRun) -> Result<Option<String>, TrackerError> {
        let experiment_id = self.experiment_id(&run.experiment).await?;
        let now_ms = chrono::Utc::now().timestamp_millis();

        let tags: Vec<_> = run
            .tags
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v }))
            .collect();
        let created = self
            .post(
                "runs/create",
                json!({
                    "experiment_id": experiment_id,
                    "run_name": run.run_name,
                    "start_time": now_ms,
                    "tags": tags,
                }),
            )
            .await?;
        let run_id = string_field(&created, &["run", "info", "run_id"])?;

        let params: Vec<_> = run
            .params
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v }))
            .collect();
        let metrics: Vec<_> = run
            .metrics
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v, "timestamp": now_ms, "step": 0 }))
            .collect();
        self.post(
            "runs/log-batch",
            json!({ "run_id": run_id, "params": params, "metrics": metrics }),
        )
        .await?;

        self.post(
            "runs/update",
            json!({
                "run_id": run_id,
                "status": "FINISHED",
                "end_time": chrono::Utc::now().timestamp_millis(),
            }),
        )
        .await?;

        debug!(run_id = %run_id, experiment_id = %experiment_id, "run logged to tracking server");
        Ok(Some(run_id))
    }
}

/// Pick the tracker for a config: MLflow when a URI is set, otherwise no-op.
pub fn tracker_for(config: &TrackingConfig) -> Result<Box<dyn ExperimentTracker>, TrackerError> {
    match config.uri.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(uri) => Ok(Box::new(MlflowTracker::new(uri)?)),
        None => Ok(Box::new(NoopTracker)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> TrackedRun {
        TrackedRun {
            experiment: "house-price-model".into(),
            run_name: "training".into(),
            params: BTreeMap::from([("n_estimators".to_string(), "100".to_string())]),
            metrics: vec![("r2".to_string(), 0.8)],
            tags: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn noop_tracker_accepts_everything() {
        let tracker = NoopTracker;
        assert!(!tracker.is_enabled());
        assert_eq!(tracker.log_run(&run()).await.unwrap(), None);
    }

    #[test]
    fn tracker_selection_follows_uri() {
        let none = tracker_for(&TrackingConfig::default()).unwrap();
        assert!(!none.is_enabled());

        let blank = tracker_for(&TrackingConfig {
            uri: Some("  ".into()),
            experiment: None,
        })
        .unwrap();
        assert!(!blank.is_enabled());

        let mlflow = tracker_for(&TrackingConfig {
            uri: Some("http://localhost:5555/".into()),
            experiment: None,
        })
        .unwrap();
        assert!(mlflow.is_enabled());
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let t = MlflowTracker::new("http://mlflow:5000/").unwrap();
        assert_eq!(
            t.endpoint("runs/create"),
            "http://mlflow:5000/api/2.0/mlflow/runs/create"
        );
    }

    #[test]
    fn string_field_walks_nested_objects() {
        let v = json!({"run": {"info": {"run_id": "abc"}}});
        assert_eq!(string_field(&v, &["run", "info", "run_id"]).unwrap(), "abc");
        assert!(string_field(&v, &["run", "id"]).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error_not_a_panic() {
        let t = MlflowTracker::new("http://127.0.0.1:9").unwrap();
        assert!(t.log_run(&run()).await.is_err());
    }
}
