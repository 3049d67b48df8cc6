//! Evaluation gate: the promotion decision for a candidate artifact.
//!
//! Recomputes holdout metrics for a [`ModelArtifact`] and applies the
//! [`GateThresholds`] rules to produce an [`EvaluationReport`]. Every rule is
//! evaluated and every failure recorded; the model is approved only when
//! there are no violations.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::{resolve_csv, Dataset};
use crate::domain::error::{PricegateError, Result};
use crate::domain::{GateThresholds, HoldoutMetrics};
use crate::model::ModelArtifact;
use crate::obs::emit_gate_evaluated;
use crate::scoring::holdout_metrics;

/// File name of the persisted report inside the output directory.
pub const REPORT_FILE: &str = "evaluation.json";

// ---------------------------------------------------------------------------
// Gate rules
// ---------------------------------------------------------------------------

/// A single gate rule that can block promotion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateRule {
    /// `r2` must be strictly greater than `min_r2`.
    MinR2,
    /// `mae` must be strictly less than `max_mae`.
    MaxMae,
    /// `mape` must be strictly less than `max_mape`.
    MaxMape,
}

impl GateRule {
    /// Every rule, in evaluation order.
    pub const ALL: [GateRule; 3] = [GateRule::MinR2, GateRule::MaxMae, GateRule::MaxMape];
}

/// A single rule violation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    /// Which rule was violated.
    pub rule: GateRule,
    /// Human-readable explanation.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of an evaluation, persisted as `evaluation.json`.
///
/// # Invariants
///
/// `performance_passed == model_approved == violations.is_empty()`. The
/// report carries no timestamps, so identical inputs serialize to identical
/// bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub metrics: HoldoutMetrics,
    pub performance_passed: bool,
    pub model_approved: bool,
    pub thresholds: GateThresholds,
    pub violations: Vec<Violation>,
    /// Holdout rows scored.
    pub rows: usize,
}

impl EvaluationReport {
    pub fn from_metrics(metrics: HoldoutMetrics, thresholds: GateThresholds, rows: usize) -> Self {
        let violations = apply_thresholds(&metrics, &thresholds);
        let approved = violations.is_empty();
        Self {
            metrics,
            performance_passed: approved,
            model_approved: approved,
            thresholds,
            violations,
            rows,
        }
    }

    /// Whether the candidate may be published.
    pub fn approved(&self) -> bool {
        self.model_approved
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Check every rule against `metrics`. NaN metrics fail their rule.
pub fn apply_thresholds(metrics: &HoldoutMetrics, thresholds: &GateThresholds) -> Vec<Violation> {
    GateRule::ALL
        .iter()
        .filter_map(|rule| check_rule(*rule, metrics, thresholds))
        .collect()
}

fn check_rule(
    rule: GateRule,
    metrics: &HoldoutMetrics,
    thresholds: &GateThresholds,
) -> Option<Violation> {
    let (ok, reason) = match rule {
        GateRule::MinR2 => (
            metrics.r2 > thresholds.min_r2,
            format!(
                "r2 {:.4} is not above required {:.4}",
                metrics.r2, thresholds.min_r2
            ),
        ),
        GateRule::MaxMae => (
            metrics.mae < thresholds.max_mae,
            format!(
                "mae {:.2} is not below allowed {:.2}",
                metrics.mae, thresholds.max_mae
            ),
        ),
        GateRule::MaxMape => (
            metrics.mape < thresholds.max_mape,
            format!(
                "mape {:.2}% is not below allowed {:.2}%",
                metrics.mape, thresholds.max_mape
            ),
        ),
    };
    if ok {
        None
    } else {
        Some(Violation { rule, reason })
    }
}

/// Score `artifact` on `holdout` and decide.
///
/// Fails when the holdout lacks a feature the artifact needs, or when a
/// metric is undefined (zero true price for MAPE).
pub fn evaluate(
    artifact: &ModelArtifact,
    holdout: &Dataset,
    thresholds: &GateThresholds,
) -> Result<EvaluationReport> {
    if holdout.target_name() != artifact.target {
        return Err(PricegateError::MissingColumn {
            column: artifact.target.clone(),
            context: "holdout".to_string(),
        });
    }
    let predictions = artifact.predict_dataset(holdout)?;
    let metrics = holdout_metrics(holdout.target(), &predictions)?;
    let report = EvaluationReport::from_metrics(metrics, *thresholds, holdout.len());
    emit_gate_evaluated(
        metrics.r2,
        metrics.mae,
        metrics.mape,
        report.model_approved,
        report.violations.len(),
    );
    Ok(report)
}

/// Load an artifact file and a holdout (CSV file or directory holding one)
/// and evaluate.
pub fn evaluate_files(
    artifact_path: &Path,
    holdout_path: &Path,
    thresholds: &GateThresholds,
) -> Result<EvaluationReport> {
    let artifact = ModelArtifact::read_from(artifact_path)?;
    let csv_path = resolve_csv(holdout_path)?;
    let holdout = Dataset::from_csv_path(&csv_path, &artifact.target)?;
    evaluate(&artifact, &holdout, thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(r2: f64, mae: f64, mape: f64) -> HoldoutMetrics {
        HoldoutMetrics {
            mae,
            rmse: mae * 1.3,
            r2,
            mape,
        }
    }

    #[test]
    fn all_rules_passing_approves() {
        let report =
            EvaluationReport::from_metrics(metrics(0.82, 45_000.0, 12.0), GateThresholds::default(), 10);
        assert!(report.approved());
        assert!(report.performance_passed);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn two_of_three_is_still_rejected() {
        let report =
            EvaluationReport::from_metrics(metrics(0.82, 95_000.0, 12.0), GateThresholds::default(), 10);
        assert!(!report.approved());
        assert!(!report.performance_passed);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].rule, GateRule::MaxMae);
    }

    #[test]
    fn thresholds_are_strict() {
        let t = GateThresholds::default();
        let report = EvaluationReport::from_metrics(metrics(0.6, 80_000.0, 20.0), t, 1);
        let rules: Vec<GateRule> = report.violations.iter().map(|v| v.rule).collect();
        assert_eq!(rules, GateRule::ALL.to_vec());
    }

    #[test]
    fn nan_metric_is_a_violation() {
        let v = apply_thresholds(&metrics(f64::NAN, 1.0, 1.0), &GateThresholds::default());
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].rule, GateRule::MinR2);
    }

    #[test]
    fn rule_serializes_with_type_tag() {
        let json = serde_json::to_value(GateRule::MaxMape).unwrap();
        assert_eq!(json, serde_json::json!({"type": "max_mape"}));
    }

    #[test]
    fn report_json_keys() {
        let report =
            EvaluationReport::from_metrics(metrics(0.7, 10.0, 5.0), GateThresholds::default(), 3);
        let json = serde_json::to_value(&report).unwrap();
        for key in ["metrics", "performance_passed", "model_approved", "thresholds", "violations", "rows"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["thresholds"]["max_mae"], 80_000.0);
        assert_eq!(json["metrics"]["mape"], 5.0);
    }
}
