//! Regression metrics.
//!
//! All functions expect equal-length, non-empty slices; callers validate
//! datasets before scoring.

use crate::domain::error::{PricegateError, Result};
use crate::domain::HoldoutMetrics;

/// At most this many offending rows are named in a `MetricUndefined` error.
const MAX_REPORTED_ROWS: usize = 5;

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean(
        &y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t - p).abs())
            .collect::<Vec<_>>(),
    )
}

pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean(
        &y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t - p).powi(2))
            .collect::<Vec<_>>(),
    )
}

/// Coefficient of determination.
///
/// When every true value is identical the usual ratio is undefined; a
/// perfect fit scores 1.0 and anything else 0.0.
pub fn r2(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    if y_true.iter().all(|v| *v == y_true[0]) {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    let m = mean(y_true);
    let ss_tot: f64 = y_true.iter().map(|t| (t - m).powi(2)).sum();
    1.0 - ss_res / ss_tot
}

/// Mean absolute percentage error, in percent.
///
/// Undefined when any true value is zero.
pub fn mape(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    let zero_rows: Vec<usize> = y_true
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == 0.0)
        .map(|(i, _)| i)
        .collect();
    if !zero_rows.is_empty() {
        let shown: Vec<String> = zero_rows
            .iter()
            .take(MAX_REPORTED_ROWS)
            .map(|i| i.to_string())
            .collect();
        let more = if zero_rows.len() > MAX_REPORTED_ROWS {
            format!(" and {} more", zero_rows.len() - MAX_REPORTED_ROWS)
        } else {
            String::new()
        };
        return Err(PricegateError::MetricUndefined {
            metric: "mape".to_string(),
            reason: format!("true value is zero at rows {}{more}", shown.join(", ")),
        });
    }
    let ratios: Vec<f64> = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| ((t - p) / t).abs())
        .collect();
    Ok(mean(&ratios) * 100.0)
}

/// The four holdout metrics the gate thresholds.
pub fn holdout_metrics(y_true: &[f64], y_pred: &[f64]) -> Result<HoldoutMetrics> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return Err(PricegateError::InvalidDataset(format!(
            "cannot score {} predictions against {} true values",
            y_pred.len(),
            y_true.len()
        )));
    }
    Ok(HoldoutMetrics {
        mae: mae(y_true, y_pred),
        rmse: mse(y_true, y_pred).sqrt(),
        r2: r2(y_true, y_pred),
        mape: mape(y_true, y_pred)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_metrics() {
        let y = [100.0, 200.0, 300.0, 400.0];
        let p = [110.0, 190.0, 300.0, 420.0];
        assert_eq!(mae(&y, &p), 10.0);
        assert_eq!(mse(&y, &p), (100.0 + 100.0 + 0.0 + 400.0) / 4.0);
        let expected_r2 = 1.0 - 600.0 / 50_000.0;
        assert!((r2(&y, &p) - expected_r2).abs() < 1e-12);
        let expected_mape = (0.1 + 0.05 + 0.0 + 0.05) / 4.0 * 100.0;
        assert!((mape(&y, &p).unwrap() - expected_mape).abs() < 1e-12);
    }

    #[test]
    fn r2_of_constant_target() {
        assert_eq!(r2(&[5.0, 5.0, 5.0], &[5.0, 5.0, 5.0]), 1.0);
        assert_eq!(r2(&[5.0, 5.0, 5.0], &[5.0, 6.0, 5.0]), 0.0);
    }

    #[test]
    fn r2_can_be_negative() {
        assert!(r2(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) < 0.0);
    }

    #[test]
    fn mape_with_zero_true_value_is_undefined() {
        let err = mape(&[100.0, 0.0, 50.0], &[90.0, 1.0, 50.0]).unwrap_err();
        match err {
            PricegateError::MetricUndefined { metric, reason } => {
                assert_eq!(metric, "mape");
                assert!(reason.contains("rows 1"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn holdout_metrics_rejects_empty() {
        assert!(holdout_metrics(&[], &[]).is_err());
    }

    #[test]
    fn population_std_matches_definition() {
        assert_eq!(population_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
    }
}
