//! Request counters rendered in the Prometheus text format.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Content type of the `/metrics` response.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Process-wide service counters.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    requests: Mutex<BTreeMap<(&'static str, &'static str), u64>>,
    predictions: AtomicU64,
    prediction_errors: AtomicU64,
    duration_micros: AtomicU64,
    duration_count: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, method: &'static str, endpoint: &'static str) {
        if let Ok(mut requests) = self.requests.lock() {
            *requests.entry((method, endpoint)).or_insert(0) += 1;
        }
    }

    pub fn record_predictions(&self, n: u64) {
        self.predictions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_prediction_error(&self) {
        self.prediction_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.duration_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.duration_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self, method: &str, endpoint: &str) -> u64 {
        self.requests
            .lock()
            .map(|r| {
                r.iter()
                    .find(|((m, e), _)| *m == method && *e == endpoint)
                    .map(|(_, n)| *n)
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub fn predictions(&self) -> u64 {
        self.predictions.load(Ordering::Relaxed)
    }

    pub fn prediction_errors(&self) -> u64 {
        self.prediction_errors.load(Ordering::Relaxed)
    }

    /// Prometheus text exposition.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# HELP http_requests_total Total HTTP requests\n");
        out.push_str("# TYPE http_requests_total counter\n");
        if let Ok(requests) = self.requests.lock() {
            for ((method, endpoint), n) in requests.iter() {
                let _ = writeln!(
                    out,
                    "http_requests_total{{method=\"{method}\",endpoint=\"{endpoint}\"}} {n}"
                );
            }
        }

        out.push_str("# HELP predictions_total Total predictions made\n");
        out.push_str("# TYPE predictions_total counter\n");
        let _ = writeln!(out, "predictions_total {}", self.predictions());

        out.push_str("# HELP prediction_errors_total Predictions the model failed to produce\n");
        out.push_str("# TYPE prediction_errors_total counter\n");
        let _ = writeln!(out, "prediction_errors_total {}", self.prediction_errors());

        let seconds = self.duration_micros.load(Ordering::Relaxed) as f64 / 1e6;
        out.push_str("# HELP http_request_duration_seconds HTTP request duration\n");
        out.push_str("# TYPE http_request_duration_seconds summary\n");
        let _ = writeln!(out, "http_request_duration_seconds_sum {seconds}");
        let _ = writeln!(
            out,
            "http_request_duration_seconds_count {}",
            self.duration_count.load(Ordering::Relaxed)
        );
        out
    }
}
