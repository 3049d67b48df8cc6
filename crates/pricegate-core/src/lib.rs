//! Pricegate Core Library
//!
//! Versioning, training, the evaluation gate and artifact publishing for the
//! house-price regression model.

pub mod config;
pub mod dataset;
pub mod deploy;
pub mod domain;
pub mod gate;
pub mod git;
pub mod model;
pub mod obs;
pub mod reporting;
pub mod scoring;
pub mod telemetry;
pub mod tracker;
pub mod training;
pub mod versioning;

pub use config::{DeployConfig, ModelSection, PricegateConfig, CONFIG_ENV};
pub use dataset::{resolve_csv, Dataset, DEFAULT_TARGET};
pub use deploy::{
    fetch_artifact, latest_version, list_versions, PublishOutcome, Publisher, DEFAULT_MODEL_NAME,
};
pub use domain::{
    ErrorKind, FeatureViolation, GateThresholds, HoldoutMetrics, HouseFeatures,
    PredictionResponse, PricegateError, Result, Revision, TrainingMetrics, Version,
    FEATURE_NAMES,
};
pub use gate::{
    apply_thresholds, evaluate, evaluate_files, EvaluationReport, GateRule, Violation,
    REPORT_FILE,
};
pub use git::{head_revision, is_commit_hash};
pub use model::{ModelArtifact, ModelKind, ModelParams, Regressor};
pub use obs::{
    emit_artifact_published, emit_gate_evaluated, emit_pointer_update_failed, emit_stage_finished,
    emit_stage_started, emit_tracking_failed, emit_training_finished, emit_training_started,
    StepSpan,
};
pub use reporting::{
    read_evaluation_report, render_evaluation_md, write_evaluation_report, write_publish_manifest,
};
pub use telemetry::{init_tracing, wants_json, LOG_FORMAT_ENV};
pub use tracker::{
    tracker_for, ExperimentTracker, MlflowTracker, NoopTracker, TrackedRun, TrackerError,
    TrackingConfig,
};
pub use training::{
    cross_validate, fit_and_score, kfold_ranges, run_training, train_test_split, SplitConfig,
    TrainingConfig, TrainingOutcome,
};
pub use versioning::{
    EnvOrGit, FixedRevision, RevisionLookup, RevisionSource, VersionConfig, Versioning,
};

/// Pricegate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
