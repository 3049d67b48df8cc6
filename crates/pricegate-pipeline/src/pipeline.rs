//! Pipeline orchestration: ordered stages, retries, stop on first failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pricegate_core::{
    emit_stage_finished, emit_stage_started, ExperimentTracker, PricegateConfig, Versioning,
};
use pricegate_store::ObjectStore;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PipelineResult;
use crate::runner::{StageResult, StageRunner};
use crate::spec::PipelineDefinition;

/// Everything in-process stages need.
#[derive(Clone)]
pub struct PipelineContext {
    /// Directory relative stage paths resolve against; commands run here.
    pub workdir: PathBuf,
    pub config: PricegateConfig,
    pub store: Arc<dyn ObjectStore>,
    pub versioning: Versioning,
    pub tracker: Arc<dyn ExperimentTracker>,
}

impl PipelineContext {
    pub fn new(
        workdir: impl Into<PathBuf>,
        config: PricegateConfig,
        store: Arc<dyn ObjectStore>,
        versioning: Versioning,
        tracker: Arc<dyn ExperimentTracker>,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            config,
            store,
            versioning,
            tracker,
        }
    }

    /// Absolute paths pass through; relative ones join `workdir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(workdir: &Path) -> Self {
        use pricegate_core::{NoopTracker, RevisionLookup, VersionConfig};
        use pricegate_store::fakes::MemoryObjectStore;

        let config = "[model]\nbest_model = \"LinearRegression\"\n"
            .parse()
            .expect("minimal config parses");
        Self::new(
            workdir,
            config,
            Arc::new(MemoryObjectStore::default()),
            Versioning::fixed(VersionConfig::default(), RevisionLookup::Unavailable),
            Arc::new(NoopTracker),
        )
    }
}

/// Result of a complete pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub pipeline: String,

    /// Whether every stage passed.
    pub success: bool,

    /// Stages that ran, in order. Stages after a failure are absent.
    pub stages: Vec<StageResult>,

    /// Name of the stage that stopped the run.
    pub failed_stage: Option<String>,

    pub duration_ms: u64,

    /// Digest of the ordered stage names.
    pub stages_digest: String,
}

impl PipelineRun {
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed()).count()
    }

    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage_name == name)
    }
}

/// Local pipeline runner.
pub struct PipelineRunner {
    ctx: PipelineContext,
}

impl PipelineRunner {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Validate and execute `definition`.
    ///
    /// Each stage gets up to `retries` extra attempts, `retry_delay_secs`
    /// apart, unless its error is not retryable. The first stage that still
    /// fails ends the run; later stages never start.
    pub async fn run(&self, definition: &PipelineDefinition) -> PipelineResult<PipelineRun> {
        definition.validate()?;

        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let retry_delay = Duration::from_secs(definition.retry_delay_secs);

        info!(run_id = %run_id, pipeline = %definition.name, "Starting pipeline");

        let mut stage_results = Vec::new();
        let mut failed_stage = None;

        for stage in &definition.stages {
            let mut attempt = 0u32;
            let result = loop {
                attempt += 1;
                emit_stage_started(&definition.name, &stage.name, attempt);
                let attempt_start = Instant::now();

                let (result, retryable) = match StageRunner::execute_stage(stage, &self.ctx).await {
                    Ok(r) => (r, true),
                    Err(e) => {
                        warn!(stage = %stage.name, attempt = attempt, error = %e, "Stage error");
                        let elapsed = attempt_start.elapsed().as_millis() as u64;
                        (StageResult::failed(stage, &e, elapsed), e.is_retryable())
                    }
                };
                emit_stage_finished(
                    &definition.name,
                    &stage.name,
                    result.duration_ms,
                    result.passed(),
                );

                if result.passed() || !retryable || attempt > definition.retries {
                    break StageResult {
                        attempts: attempt,
                        ..result
                    };
                }
                info!(stage = %stage.name, attempt = attempt, "Retrying stage");
                tokio::time::sleep(retry_delay).await;
            };

            let passed = result.passed();
            stage_results.push(result);
            if !passed {
                failed_stage = Some(stage.name.clone());
                break;
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = failed_stage.is_none();
        if success {
            info!(run_id = %run_id, "Pipeline completed successfully");
        } else {
            info!(run_id = %run_id, stage = ?failed_stage, "Pipeline failed");
        }

        Ok(PipelineRun {
            run_id,
            pipeline: definition.name.clone(),
            success,
            stages: stage_results,
            failed_stage,
            duration_ms,
            stages_digest: definition.stages_digest(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_result(name: &str, success: bool) -> StageResult {
        StageResult {
            stage_name: name.to_string(),
            exit_code: if success { 0 } else { 1 },
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 10,
            attempts: 1,
            success,
        }
    }

    #[test]
    fn test_pipeline_run_counts() {
        let run = PipelineRun {
            run_id: "run123".to_string(),
            pipeline: "p".to_string(),
            success: false,
            stages: vec![stage_result("a", true), stage_result("b", false)],
            failed_stage: Some("b".to_string()),
            duration_ms: 20,
            stages_digest: "abc".to_string(),
        };
        assert_eq!(run.passed_count(), 1);
        assert_eq!(run.failed_count(), 1);
        assert!(run.stage("b").is_some());
        assert!(run.stage("c").is_none());
    }

    #[test]
    fn relative_paths_resolve_against_workdir() {
        let ctx = PipelineContext::for_tests(Path::new("/srv/ml"));
        assert_eq!(
            ctx.resolve(Path::new("data/raw.csv")),
            PathBuf::from("/srv/ml/data/raw.csv")
        );
        assert_eq!(
            ctx.resolve(Path::new("/opt/ml/model")),
            PathBuf::from("/opt/ml/model")
        );
    }
}
