//! Pipeline definitions and their validation.

use std::collections::HashSet;
use std::path::PathBuf;

use pricegate_core::DEFAULT_MODEL_NAME;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PipelineError, PipelineResult};
use crate::stage::{Stage, StageAction};

/// Ordered pipeline: identity, schedule, retry policy and stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineDefinition {
    pub name: String,
    pub description: String,

    /// Cron-style schedule, `None` for on-demand pipelines.
    pub schedule: Option<String>,

    pub owner: String,

    /// Extra attempts per stage after the first failure.
    pub retries: u32,

    pub retry_delay_secs: u64,

    /// Whether missed scheduled runs are backfilled.
    pub catchup: bool,

    /// Locations that exist before the first stage runs.
    pub inputs: Vec<String>,

    pub stages: Vec<Stage>,
}

impl PipelineDefinition {
    /// Weekly local pipeline for the default model name.
    pub fn scheduled() -> Self {
        Self::scheduled_for(DEFAULT_MODEL_NAME)
    }

    /// Weekly local pipeline: process → features → train → validate → deploy.
    pub fn scheduled_for(model_name: &str) -> Self {
        let raw = "data/raw/house_data.csv";
        let cleaned = "data/processed/cleaned_house_data.csv";
        let featured = "data/processed/featured_house_data.csv";
        let preprocessor = "models/trained/preprocessor.pkl";
        let holdout = "data/holdout/";
        let artifact = format!("models/trained/{model_name}.json");
        let report = "output/evaluation.json";
        let manifest = "output/publish.json";

        let stages = vec![
            Stage::command(
                "data_processing",
                [
                    "python",
                    "src/data/run_processing.py",
                    "--input",
                    raw,
                    "--output",
                    cleaned,
                ],
            )
            .consumes([raw])
            .produces([cleaned]),
            Stage::command(
                "feature_engineering",
                [
                    "python",
                    "src/features/engineer.py",
                    "--input",
                    cleaned,
                    "--output",
                    featured,
                    "--preprocessor",
                    preprocessor,
                ],
            )
            .consumes([cleaned])
            .produces([featured, preprocessor]),
            Stage::new(
                "model_training",
                StageAction::Train {
                    data: featured.into(),
                    models_dir: "models".into(),
                },
            )
            .consumes([featured])
            .produces([artifact.clone()]),
            Stage::new(
                "model_validation",
                StageAction::Evaluate {
                    artifact: PathBuf::from(&artifact),
                    holdout: holdout.into(),
                    output_dir: "output".into(),
                },
            )
            .consumes([artifact.as_str(), holdout])
            .produces([report]),
            Stage::new(
                "model_deployment",
                StageAction::Publish {
                    artifact: PathBuf::from(&artifact),
                    manifest: Some(manifest.into()),
                },
            )
            .consumes([artifact.as_str(), report])
            .produces([
                manifest.to_string(),
                format!("models/{model_name}/latest/version.txt"),
            ]),
        ];

        Self {
            name: "house_price_ml_pipeline".to_string(),
            description: "Automated ML pipeline for house price prediction".to_string(),
            schedule: Some("@weekly".to_string()),
            owner: "mlops-team".to_string(),
            retries: 1,
            retry_delay_secs: 300,
            catchup: false,
            inputs: vec![raw.to_string(), holdout.to_string()],
            stages,
        }
    }

    /// Two-step managed pipeline: ProcessData → TrainModel.
    pub fn cloud() -> Self {
        let raw = "s3://house-price-mlops/data/raw/";
        let processed = "s3://house-price-mlops/data/processed/";

        let stages = vec![
            Stage::command(
                "ProcessData",
                [
                    "python",
                    "src/data/run_processing.py",
                    "--input",
                    "/opt/ml/processing/input",
                    "--output",
                    "/opt/ml/processing/output",
                ],
            )
            .consumes([raw])
            .produces([processed]),
            Stage::new(
                "TrainModel",
                StageAction::Train {
                    data: "/opt/ml/input/data/training".into(),
                    models_dir: "/opt/ml/model".into(),
                },
            )
            .consumes([processed])
            .produces(["/opt/ml/model/"]),
        ];

        Self {
            name: "house-price-pipeline".to_string(),
            description: "Managed processing and training for the house price model".to_string(),
            schedule: None,
            owner: "mlops-team".to_string(),
            retries: 0,
            retry_delay_secs: 0,
            catchup: false,
            inputs: vec![raw.to_string()],
            stages,
        }
    }

    /// Look up a built-in definition by name.
    pub fn builtin(name: &str, model_name: &str) -> Option<Self> {
        match name {
            "scheduled" | "house_price_ml_pipeline" => Some(Self::scheduled_for(model_name)),
            "cloud" | "house-price-pipeline" => Some(Self::cloud()),
            _ => None,
        }
    }

    /// Check structure: at least one stage, unique names, and every input
    /// available from the pipeline inputs or an earlier stage's outputs.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty(self.name.clone()));
        }

        let mut names = HashSet::new();
        let mut available: HashSet<&str> = self.inputs.iter().map(String::as_str).collect();
        for stage in &self.stages {
            if !names.insert(stage.name.as_str()) {
                return Err(PipelineError::DuplicateStage(stage.name.clone()));
            }
            if let StageAction::Command { command } = &stage.action {
                if command.is_empty() {
                    return Err(PipelineError::EmptyCommand(stage.name.clone()));
                }
            }
            if let Some(missing) = stage
                .inputs
                .iter()
                .find(|input| !available.contains(input.as_str()))
            {
                return Err(PipelineError::UnresolvedInput {
                    stage: stage.name.clone(),
                    input: missing.clone(),
                });
            }
            available.extend(stage.outputs.iter().map(String::as_str));
        }
        Ok(())
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    /// SHA-256 of the ordered stage names.
    pub fn stages_digest(&self) -> String {
        compute_stages_digest(&self.stage_names())
    }
}

fn compute_stages_digest(stages: &[String]) -> String {
    let mut hasher = Sha256::new();
    for stage in stages {
        hasher.update(stage.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
