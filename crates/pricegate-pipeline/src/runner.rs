//! Single-stage execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use pricegate_core::{
    evaluate_files, resolve_csv, run_training, write_evaluation_report, write_publish_manifest,
    Dataset, Publisher, StepSpan,
};
use serde::Serialize;
use tokio::process::Command;
use tracing::{info_span, Instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::PipelineContext;
use crate::stage::{Stage, StageAction};

/// Result of a stage execution.
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    /// Stage name.
    pub stage_name: String,

    /// Exit code (0 = success, -1 = the stage could not run).
    pub exit_code: i32,

    /// Captured stdout, or a one-line summary for in-process stages.
    pub stdout: String,

    /// Captured stderr, or the error for in-process stages.
    pub stderr: String,

    /// Duration of the last attempt in milliseconds.
    pub duration_ms: u64,

    /// Attempts made, including the first.
    pub attempts: u32,

    pub success: bool,
}

impl StageResult {
    /// Whether this stage passed.
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    pub(crate) fn failed(stage: &Stage, error: &PipelineError, duration_ms: u64) -> Self {
        Self {
            stage_name: stage.name.clone(),
            exit_code: -1,
            stdout: String::new(),
            stderr: error.to_string(),
            duration_ms,
            attempts: 1,
            success: false,
        }
    }
}

/// Executes one stage against a pipeline context.
pub struct StageRunner;

impl StageRunner {
    /// Run `stage` once.
    ///
    /// A command that exits non-zero is a failed `StageResult`; spawn
    /// failures, timeouts and in-process errors (including a rejected gate)
    /// are returned as `Err`.
    pub async fn execute_stage(stage: &Stage, ctx: &PipelineContext) -> PipelineResult<StageResult> {
        let start = Instant::now();
        let stdout = match &stage.action {
            StageAction::Command { command } => {
                return Self::execute_command(stage, command, &ctx.workdir).await;
            }
            StageAction::Train { data, models_dir } => {
                Self::train(ctx, &ctx.resolve(data), &ctx.resolve(models_dir)).await?
            }
            StageAction::Evaluate {
                artifact,
                holdout,
                output_dir,
            } => Self::evaluate(
                ctx,
                &ctx.resolve(artifact),
                &ctx.resolve(holdout),
                &ctx.resolve(output_dir),
            )
            .await?,
            StageAction::Publish { artifact, manifest } => {
                let manifest = manifest.as_ref().map(|m| ctx.resolve(m));
                Self::publish(ctx, &ctx.resolve(artifact), manifest.as_deref()).await?
            }
        };

        Ok(StageResult {
            stage_name: stage.name.clone(),
            exit_code: 0,
            stdout,
            stderr: String::new(),
            duration_ms: start.elapsed().as_millis() as u64,
            attempts: 1,
            success: true,
        })
    }

    async fn execute_command(
        stage: &Stage,
        command: &[String],
        workdir: &Path,
    ) -> PipelineResult<StageResult> {
        let start = Instant::now();

        let (exe, args) = command
            .split_first()
            .ok_or_else(|| PipelineError::EmptyCommand(stage.name.clone()))?;

        let child = Command::new(exe)
            .args(args)
            .current_dir(workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = if stage.timeout_secs > 0 {
            let after = Duration::from_secs(stage.timeout_secs);
            tokio::time::timeout(after, child.wait_with_output())
                .await
                .map_err(|_| PipelineError::Timeout {
                    stage: stage.name.clone(),
                    after,
                })??
        } else {
            child.wait_with_output().await?
        };

        Ok(StageResult {
            stage_name: stage.name.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            attempts: 1,
            success: output.status.success(),
        })
    }

    async fn train(ctx: &PipelineContext, data: &Path, models_dir: &Path) -> PipelineResult<String> {
        let training = ctx.config.training_config()?;
        let span = info_span!("pricegate.step", step = "train", model = %training.model_name);
        let csv = resolve_csv(data)?;
        let dataset = Dataset::from_csv_path(&csv, &training.target)?;
        let outcome = run_training(
            &training,
            dataset,
            models_dir,
            ctx.tracker.as_ref(),
            ctx.config.experiment_name(),
        )
        .instrument(span)
        .await?;
        Ok(format!(
            "trained {} -> {} (r2 {:.4}, mae {:.2})",
            outcome.artifact.kind,
            outcome.artifact_path.display(),
            outcome.metrics.r2,
            outcome.metrics.mae
        ))
    }

    /// Gate the artifact on the blocking pool; scoring and report writing
    /// are synchronous file and CPU work.
    async fn evaluate(
        ctx: &PipelineContext,
        artifact: &Path,
        holdout: &Path,
        output_dir: &Path,
    ) -> PipelineResult<String> {
        let model_name = ctx.config.model.name.clone();
        let thresholds = ctx.config.gate;
        let (artifact, holdout, output_dir) = (
            artifact.to_path_buf(),
            holdout.to_path_buf(),
            output_dir.to_path_buf(),
        );
        let (report, path) = tokio::task::spawn_blocking(move || -> PipelineResult<_> {
            let _span = StepSpan::enter("evaluate", &model_name);
            let report = evaluate_files(&artifact, &holdout, &thresholds)?;
            let path = write_evaluation_report(&output_dir, &report)
                .map_err(|e| PipelineError::Report(format!("{e:#}")))?;
            Ok((report, path))
        })
        .await
        .map_err(|e| PipelineError::Report(format!("evaluation task failed: {e}")))??;

        if !report.approved() {
            return Err(PipelineError::GateRejected {
                reasons: report.violations.iter().map(|v| v.reason.clone()).collect(),
            });
        }
        Ok(format!(
            "approved (r2 {:.4}, mae {:.2}, mape {:.2}%) -> {}",
            report.metrics.r2,
            report.metrics.mae,
            report.metrics.mape,
            path.display()
        ))
    }

    async fn publish(
        ctx: &PipelineContext,
        artifact: &Path,
        manifest: Option<&Path>,
    ) -> PipelineResult<String> {
        let model_name = ctx.config.deploy_model_name();
        let span = info_span!("pricegate.step", step = "publish", model = %model_name);
        let publisher = Publisher::new(ctx.store.clone(), ctx.versioning.clone());
        let outcome = publisher
            .publish(artifact, model_name)
            .instrument(span)
            .await?;
        if let Some(path) = manifest {
            write_publish_manifest(path, &outcome)
                .map_err(|e| PipelineError::Report(format!("{e:#}")))?;
        }
        Ok(format!("published {} -> {}", outcome.version, outcome.uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_result_passed() {
        let result = StageResult {
            stage_name: "data_processing".to_string(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 100,
            attempts: 1,
            success: true,
        };
        assert!(result.passed());
    }

    #[test]
    fn test_stage_result_failed() {
        let result = StageResult {
            stage_name: "data_processing".to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "error".to_string(),
            duration_ms: 100,
            attempts: 2,
            success: false,
        };
        assert!(!result.passed());
    }

    fn evaluate_stage() -> Stage {
        Stage::new(
            "model_validation",
            StageAction::Evaluate {
                artifact: "model.json".into(),
                holdout: "test.csv".into(),
                output_dir: "output".into(),
            },
        )
    }

    fn write_linear_artifact(dir: &Path) {
        use pricegate_core::{ModelArtifact, ModelKind, ModelParams, Regressor};

        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![900.0 + 40.0 * i as f64]).collect();
        let y: Vec<f64> = x.iter().map(|r| 150.0 * r[0] + 30_000.0).collect();
        let regressor =
            Regressor::fit(&ModelParams::defaults(ModelKind::LinearRegression), &x, &y).unwrap();
        let artifact = ModelArtifact::new(
            "house-price-model",
            ModelKind::LinearRegression,
            vec!["sqft_living".to_string()],
            "price",
            regressor,
        );
        std::fs::write(dir.join("model.json"), artifact.to_json_bytes().unwrap()).unwrap();

        let mut csv = String::from("sqft_living,price\n");
        for i in 0..12 {
            let sqft = 1_000.0 + 75.0 * i as f64;
            csv.push_str(&format!("{sqft},{}\n", 150.0 * sqft + 30_000.0));
        }
        std::fs::write(dir.join("test.csv"), csv).unwrap();
    }

    #[tokio::test]
    async fn test_evaluate_runs_off_the_async_thread() {
        let dir = tempfile::tempdir().unwrap();
        write_linear_artifact(dir.path());
        let ctx = PipelineContext::for_tests(dir.path());

        let result = StageRunner::execute_stage(&evaluate_stage(), &ctx)
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.stdout.starts_with("approved"), "{}", result.stdout);
        assert!(dir.path().join("output/evaluation.json").is_file());
    }

    #[tokio::test]
    async fn test_evaluate_error_crosses_the_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::for_tests(dir.path());

        let err = StageRunner::execute_stage(&evaluate_stage(), &ctx)
            .await
            .unwrap_err();
        match err {
            PipelineError::Core(e) => {
                assert_eq!(e.kind(), pricegate_core::ErrorKind::Input)
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dir.path().join("output").exists());
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::for_tests(dir.path());
        let stage = Stage::command("echo_test", ["echo", "hello"]).with_timeout(60);

        let result = StageRunner::execute_stage(&stage, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::for_tests(dir.path());
        let stage = Stage::command("false_test", ["false"]);

        let result = StageRunner::execute_stage(&stage, &ctx).await.unwrap();
        assert!(!result.success);
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_command_runs_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let ctx = PipelineContext::for_tests(dir.path());
        let stage = Stage::command("ls", ["ls"]);

        let result = StageRunner::execute_stage(&stage, &ctx).await.unwrap();
        assert!(result.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::for_tests(dir.path());
        let stage = Stage::command("sleepy", ["sleep", "5"]).with_timeout(1);

        let err = StageRunner::execute_stage(&stage, &ctx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_executable_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::for_tests(dir.path());
        let stage = Stage::command("ghost", ["definitely-not-a-real-binary-pricegate"]);

        let err = StageRunner::execute_stage(&stage, &ctx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
