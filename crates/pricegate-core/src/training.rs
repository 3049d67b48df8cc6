//! Training step: split, cross-validate, fit, score, persist, track.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::domain::error::{PricegateError, Result};
use crate::domain::TrainingMetrics;
use crate::model::{ModelArtifact, ModelParams, Regressor};
use crate::obs::{emit_tracking_failed, emit_training_finished, emit_training_started};
use crate::reporting::write_atomic;
use crate::scoring::{mae, mean, mse, population_std, r2};
use crate::tracker::{ExperimentTracker, TrackedRun};

/// Directory under `models_dir` holding trained artifacts.
pub const TRAINED_DIR: &str = "trained";

/// Holdout split and cross-validation settings (`[training]` section).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

fn default_test_size() -> f64 {
    0.2
}

fn default_cv_folds() -> usize {
    5
}

fn default_random_state() -> u64 {
    42
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            cv_folds: default_cv_folds(),
            random_state: default_random_state(),
        }
    }
}

/// Everything the training step needs besides data.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub model_name: String,
    pub target: String,
    pub params: ModelParams,
    pub split: SplitConfig,
}

/// Row indices of a holdout split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle split: the first `ceil(test_size · n)` shuffled rows are
/// the holdout.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PricegateError::Config(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PricegateError::InvalidDataset(format!(
            "{n} rows cannot be split with test_size {test_size}"
        )));
    }
    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = perm.split_off(n_test);
    Ok(Split { train, test: perm })
}

/// Contiguous, unshuffled folds; the first `n % k` folds get one extra row.
pub fn kfold_ranges(n: usize, k: usize) -> Vec<Range<usize>> {
    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    (0..k)
        .map(|fold| {
            let len = base + usize::from(fold < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// R² of each fold when the model is fit on the remaining folds.
pub fn cross_validate(params: &ModelParams, x: &[Vec<f64>], y: &[f64], k: usize) -> Result<Vec<f64>> {
    if k < 2 {
        return Err(PricegateError::Config(format!(
            "cv_folds must be at least 2, got {k}"
        )));
    }
    if y.len() < k {
        return Err(PricegateError::InvalidDataset(format!(
            "{} training rows cannot form {k} folds",
            y.len()
        )));
    }

    kfold_ranges(y.len(), k)
        .into_iter()
        .map(|fold| -> Result<f64> {
            let train_idx: Vec<usize> = (0..y.len()).filter(|i| !fold.contains(i)).collect();
            let fx: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
            let fy: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
            let model = Regressor::fit(params, &fx, &fy)?;
            let predictions = model.predict_many(&x[fold.clone()])?;
            Ok(r2(&y[fold], &predictions))
        })
        .collect()
}

/// Split, cross-validate, fit the final model and score it on the holdout.
pub fn fit_and_score(config: &TrainingConfig, dataset: &Dataset) -> Result<(ModelArtifact, TrainingMetrics)> {
    if dataset.target_name() != config.target {
        return Err(PricegateError::MissingColumn {
            column: config.target.clone(),
            context: "training data".to_string(),
        });
    }
    let split = train_test_split(
        dataset.len(),
        config.split.test_size,
        config.split.random_state,
    )?;
    let (train_x, train_y) = dataset.subset(&split.train);
    let (test_x, test_y) = dataset.subset(&split.test);

    let cv_scores = cross_validate(&config.params, &train_x, &train_y, config.split.cv_folds)?;
    let regressor = Regressor::fit(&config.params, &train_x, &train_y)?;
    let predictions = regressor.predict_many(&test_x)?;
    if predictions.iter().any(|p| !p.is_finite()) {
        return Err(PricegateError::Model(
            "fitted model produced non-finite predictions".to_string(),
        ));
    }

    let holdout_mse = mse(&test_y, &predictions);
    let metrics = TrainingMetrics {
        mae: mae(&test_y, &predictions),
        mse: holdout_mse,
        rmse: holdout_mse.sqrt(),
        r2: r2(&test_y, &predictions),
        cv_r2_mean: mean(&cv_scores),
        cv_r2_std: population_std(&cv_scores),
        n_train: split.train.len(),
        n_test: split.test.len(),
    };

    let artifact = ModelArtifact::new(
        config.model_name.clone(),
        config.params.kind(),
        dataset.feature_names().to_vec(),
        config.target.clone(),
        regressor,
    );
    Ok((artifact, metrics))
}

/// Paths written by a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub metrics: TrainingMetrics,
    pub artifact_path: PathBuf,
    pub metrics_path: PathBuf,
    /// Tracker run id when tracking succeeded.
    pub tracking_run_id: Option<String>,
}

/// `<models_dir>/trained/<model_name>.json`
pub fn artifact_path(models_dir: &Path, model_name: &str) -> PathBuf {
    models_dir.join(TRAINED_DIR).join(format!("{model_name}.json"))
}

/// `<models_dir>/trained/<model_name>.metrics.json`
pub fn metrics_path(models_dir: &Path, model_name: &str) -> PathBuf {
    models_dir
        .join(TRAINED_DIR)
        .join(format!("{model_name}.metrics.json"))
}

/// Run the full training step and persist its outputs.
///
/// Fitting runs on the blocking pool. Tracker failures are logged and
/// ignored.
pub async fn run_training(
    config: &TrainingConfig,
    dataset: Dataset,
    models_dir: &Path,
    tracker: &dyn ExperimentTracker,
    experiment: &str,
) -> Result<TrainingOutcome> {
    emit_training_started(&config.model_name, config.params.kind().as_str(), dataset.len());

    let owned = config.clone();
    let (artifact, metrics) = tokio::task::spawn_blocking(move || fit_and_score(&owned, &dataset))
        .await
        .map_err(|e| PricegateError::Model(format!("training task failed: {e}")))??;

    emit_training_finished(
        &config.model_name,
        metrics.mae,
        metrics.rmse,
        metrics.r2,
        metrics.cv_r2_mean,
    );

    let artifact_path = artifact_path(models_dir, &config.model_name);
    let metrics_path = metrics_path(models_dir, &config.model_name);
    write_atomic(&artifact_path, &artifact.to_json_bytes()?)?;
    write_atomic(&metrics_path, &serde_json::to_vec_pretty(&metrics)?)?;

    let run = TrackedRun {
        experiment: experiment.to_string(),
        run_name: format!("{}-training", config.params.kind()),
        params: config.params.flatten(),
        metrics: metrics
            .named()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        tags: BTreeMap::from([
            ("model_name".to_string(), config.model_name.clone()),
            ("model_kind".to_string(), config.params.kind().to_string()),
        ]),
    };
    let tracking_run_id = match tracker.log_run(&run).await {
        Ok(id) => id,
        Err(e) => {
            emit_tracking_failed(&config.model_name, &e);
            None
        }
    };

    Ok(TrainingOutcome {
        artifact,
        metrics,
        artifact_path,
        metrics_path,
        tracking_run_id,
    })
}
