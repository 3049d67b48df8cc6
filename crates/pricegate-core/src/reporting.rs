use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::deploy::PublishOutcome;
use crate::gate::{EvaluationReport, REPORT_FILE};

/// Write `bytes` to `path` via a temp file in the same directory, creating
/// parent directories as needed.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write `<output_dir>/evaluation.json` in pretty JSON format.
pub fn write_evaluation_report(output_dir: &Path, report: &EvaluationReport) -> Result<PathBuf> {
    let path = output_dir.join(REPORT_FILE);
    let content = serde_json::to_string_pretty(report).context("serialize evaluation report")?;
    write_atomic(&path, content.as_bytes()).with_context(|| format!("write {:?}", path))?;
    Ok(path)
}

/// Read a previously written evaluation report.
pub fn read_evaluation_report(path: &Path) -> Result<EvaluationReport> {
    let content = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_slice(&content).with_context(|| format!("parse {:?}", path))
}

/// Write a publish manifest (URI, version, digest, pointer status).
pub fn write_publish_manifest(path: &Path, outcome: &PublishOutcome) -> Result<()> {
    let content = serde_json::to_string_pretty(outcome).context("serialize publish manifest")?;
    write_atomic(path, content.as_bytes()).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Render a markdown summary of a gate verdict for CI logs or PR comments.
pub fn render_evaluation_md(report: &EvaluationReport) -> String {
    let mut out = String::new();
    let verdict = if report.model_approved {
        "APPROVED"
    } else {
        "REJECTED"
    };
    out.push_str(&format!("# Evaluation Gate: {verdict}\n\n"));
    out.push_str(&format!("Holdout rows: {}\n\n", report.rows));
    out.push_str("| metric | value | threshold |\n|---|---|---|\n");
    out.push_str(&format!(
        "| r2 | {:.4} | > {:.4} |\n",
        report.metrics.r2, report.thresholds.min_r2
    ));
    out.push_str(&format!(
        "| mae | {:.2} | < {:.2} |\n",
        report.metrics.mae, report.thresholds.max_mae
    ));
    out.push_str(&format!(
        "| mape | {:.2}% | < {:.2}% |\n",
        report.metrics.mape, report.thresholds.max_mape
    ));
    out.push_str(&format!("| rmse | {:.2} | |\n", report.metrics.rmse));

    if !report.violations.is_empty() {
        out.push_str("\n## Violations\n");
        for v in &report.violations {
            out.push_str(&format!("- {}\n", v.reason));
        }
    }
    out
}
