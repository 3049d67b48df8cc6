//! Structured observability hooks for the training, gating and publishing steps.
//!
//! This module provides:
//! - Step-scoped tracing spans via the `StepSpan` RAII guard
//! - Emission functions for lifecycle events: training, gate verdicts,
//!   publishing, and pipeline stages
//!
//! Events are emitted at `info!` level (warnings for swallowed failures).
//! For JSON output, set `PRICEGATE_LOG_FORMAT=json`.

use tracing::{info, warn};

/// RAII guard that enters a step-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = StepSpan::enter("evaluate", "house-price-model");
/// // every event below is tagged step=evaluate model=house-price-model
/// ```
pub struct StepSpan {
    _span: tracing::span::EnteredSpan,
}

impl StepSpan {
    /// Create and enter a span tagged with the step and model names.
    pub fn enter(step: &str, model_name: &str) -> Self {
        let span = tracing::info_span!("pricegate.step", step = %step, model = %model_name);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: training started.
pub fn emit_training_started(model_name: &str, kind: &str, rows: usize) {
    info!(event = "training.started", model = %model_name, kind = %kind, rows = rows);
}

/// Emit event: training finished with holdout and cross-validation scores.
pub fn emit_training_finished(model_name: &str, mae: f64, rmse: f64, r2: f64, cv_r2_mean: f64) {
    info!(
        event = "training.finished",
        model = %model_name,
        mae = mae,
        rmse = rmse,
        r2 = r2,
        cv_r2_mean = cv_r2_mean,
    );
}

/// Emit event: tracker could not record the run (warning level).
pub fn emit_tracking_failed(model_name: &str, error: &dyn std::fmt::Display) {
    warn!(event = "training.tracking_failed", model = %model_name, error = %error);
}

/// Emit event: gate evaluation completed with its verdict.
pub fn emit_gate_evaluated(r2: f64, mae: f64, mape: f64, approved: bool, violations: usize) {
    info!(
        event = "gate.evaluated",
        r2 = r2,
        mae = mae,
        mape = mape,
        approved = approved,
        violations = violations,
    );
}

/// Emit event: artifact uploaded under its versioned key.
pub fn emit_artifact_published(model_name: &str, version: &str, uri: &str, sha256: &str) {
    info!(
        event = "artifact.published",
        model = %model_name,
        version = %version,
        uri = %uri,
        sha256 = %sha256,
    );
}

/// Emit event: latest pointer could not be updated (warning level).
pub fn emit_pointer_update_failed(model_name: &str, version: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "artifact.pointer_update_failed",
        model = %model_name,
        version = %version,
        error = %error,
    );
}

/// Emit event: pipeline stage attempt started.
pub fn emit_stage_started(pipeline: &str, stage: &str, attempt: u32) {
    info!(event = "stage.started", pipeline = %pipeline, stage = %stage, attempt = attempt);
}

/// Emit event: pipeline stage finished.
pub fn emit_stage_finished(pipeline: &str, stage: &str, duration_ms: u64, success: bool) {
    info!(
        event = "stage.finished",
        pipeline = %pipeline,
        stage = %stage,
        duration_ms = duration_ms,
        success = success,
    );
}
