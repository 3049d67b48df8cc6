//! Pricegate - train, gate, publish and orchestrate the house-price model
//!
//! The `pricegate` command runs each pipeline step on explicit paths.
//!
//! ## Commands
//!
//! - `version`: Print the model version for the current revision
//! - `train`: Fit the configured regressor and write the artifact
//! - `evaluate`: Score an artifact on a holdout set and write `evaluation.json`
//! - `publish`: Upload an artifact and move the `latest` pointer
//! - `versions`: List published versions
//! - `pipeline`: Show or run a pipeline definition

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pricegate_core::{
    evaluate_files, init_tracing, latest_version, list_versions, render_evaluation_md,
    resolve_csv, run_training, tracker_for, wants_json, write_evaluation_report,
    write_publish_manifest, Dataset, DeployConfig, ErrorKind, GateThresholds, PricegateConfig,
    PricegateError, Publisher, VersionConfig, Versioning, DEFAULT_MODEL_NAME, LOG_FORMAT_ENV,
};
use pricegate_pipeline::{PipelineContext, PipelineDefinition, PipelineError, PipelineRunner};
use pricegate_store::{FsObjectStore, ObjectStore, StorageError};
use tracing::{info, Level};

/// Exit status of `evaluate --require-approval` when the gate rejects.
const EXIT_REJECTED: u8 = 5;

#[derive(Parser)]
#[command(name = "pricegate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, gate, publish and orchestrate the house-price model", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "PRICEGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Object store location; overrides `[deploy]`.
#[derive(Args, Debug, Clone, Default)]
struct StoreArgs {
    /// Root directory of the filesystem object store
    #[arg(long, env = "PRICEGATE_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Bucket name inside the store
    #[arg(long, env = "PRICEGATE_BUCKET")]
    bucket: Option<String>,
}

impl StoreArgs {
    fn open(&self, deploy: &DeployConfig) -> Result<Arc<dyn ObjectStore>> {
        let root = self.storage_root.as_ref().unwrap_or(&deploy.storage_root);
        let bucket = self.bucket.as_deref().unwrap_or(&deploy.bucket);
        let store = FsObjectStore::new(root, bucket)
            .with_context(|| format!("Failed to open object store at {:?}", root))?;
        Ok(Arc::new(store))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the model version for the current revision
    Version {
        /// Repository used for the revision lookup
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Also print the storage path for this version
        #[arg(long)]
        path: bool,

        /// Print a build timestamp (YYYYMMDD_HHMMSS) instead
        #[arg(long)]
        timestamp: bool,
    },

    /// Fit the configured regressor and write the artifact and metrics
    Train {
        /// Processed CSV dataset (file, or directory holding one)
        #[arg(short, long)]
        data: PathBuf,

        /// Output directory; files land under `<models-dir>/trained/`
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,

        /// Experiment tracking server; overrides `[tracking].uri`
        #[arg(long, env = "PRICEGATE_TRACKING_URI")]
        tracking_uri: Option<String>,
    },

    /// Score an artifact on a holdout set and write evaluation.json
    Evaluate {
        /// Trained artifact
        #[arg(short, long)]
        artifact: PathBuf,

        /// Holdout CSV (file, or directory holding one)
        #[arg(long)]
        holdout: PathBuf,

        /// Directory receiving evaluation.json
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Exit with status 5 when the model is rejected
        #[arg(long)]
        require_approval: bool,

        /// Print a markdown summary
        #[arg(long)]
        summary: bool,
    },

    /// Upload an artifact under the current version and update `latest`
    Publish {
        /// Artifact file to upload
        #[arg(short, long)]
        artifact: PathBuf,

        /// Model name for storage keys; overrides the config
        #[arg(long)]
        model_name: Option<String>,

        /// Write the publish manifest (URI, version, digest) here
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Repository used for the revision lookup
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// List published versions, newest first
    Versions {
        /// Model name for storage keys; overrides the config
        #[arg(long)]
        model_name: Option<String>,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Pipeline definitions
    Pipeline {
        #[command(subcommand)]
        action: PipelineAction,
    },
}

#[derive(Subcommand)]
enum PipelineAction {
    /// Print a built-in definition as JSON
    Show {
        /// `scheduled` or `cloud`
        name: String,
    },

    /// Run a built-in definition locally
    Run {
        /// `scheduled` or `cloud`
        name: String,

        /// Working directory for stage paths and commands
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        #[command(flatten)]
        store: StoreArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let json = cli.json || wants_json(std::env::var(LOG_FORMAT_ENV).ok().as_deref());
    init_tracing(json, level);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Version {
            repo,
            path,
            timestamp,
        } => cmd_version(load_optional(config_path)?.as_ref(), &repo, path, timestamp),
        Commands::Train {
            data,
            models_dir,
            tracking_uri,
        } => cmd_train(&load_config(config_path)?, &data, &models_dir, tracking_uri).await,
        Commands::Evaluate {
            artifact,
            holdout,
            output_dir,
            require_approval,
            summary,
        } => {
            let thresholds = load_optional(config_path)?
                .map(|c| c.gate)
                .unwrap_or_default();
            cmd_evaluate(
                &artifact,
                &holdout,
                &output_dir,
                &thresholds,
                require_approval,
                summary,
            )
        }
        Commands::Publish {
            artifact,
            model_name,
            manifest,
            repo,
            store,
        } => {
            let config = load_optional(config_path)?;
            cmd_publish(
                config.as_ref(),
                &store,
                &artifact,
                model_name.as_deref(),
                manifest.as_deref(),
                &repo,
            )
            .await
        }
        Commands::Versions { model_name, store } => {
            let config = load_optional(config_path)?;
            cmd_versions(config.as_ref(), &store, model_name.as_deref()).await
        }
        Commands::Pipeline { action } => match action {
            PipelineAction::Show { name } => {
                let model_name = load_optional(config_path)?
                    .map(|c| c.model.name)
                    .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());
                cmd_pipeline_show(&name, &model_name)
            }
            PipelineAction::Run {
                name,
                workdir,
                store,
            } => cmd_pipeline_run(load_config(config_path)?, &name, &workdir, &store).await,
        },
    }
}

/// Exit status for a failed command.
///
/// 2 = configuration, 3 = input, 4 = storage, 1 = anything else.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<PricegateError>() {
            return e.kind().exit_code() as u8;
        }
        if let Some(e) = cause.downcast_ref::<PipelineError>() {
            return match e {
                PipelineError::Core(inner) => inner.kind().exit_code() as u8,
                PipelineError::Empty(_)
                | PipelineError::DuplicateStage(_)
                | PipelineError::UnresolvedInput { .. }
                | PipelineError::EmptyCommand(_) => ErrorKind::Configuration.exit_code() as u8,
                _ => ErrorKind::Internal.exit_code() as u8,
            };
        }
        if cause.downcast_ref::<StorageError>().is_some() {
            return ErrorKind::Storage.exit_code() as u8;
        }
    }
    ErrorKind::Internal.exit_code() as u8
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<PricegateConfig> {
    let path = path.ok_or_else(|| {
        PricegateError::Config("no config file: pass --config or set PRICEGATE_CONFIG".to_string())
    })?;
    Ok(PricegateConfig::load(path)?)
}

fn load_optional(path: Option<&Path>) -> Result<Option<PricegateConfig>> {
    path.map(|p| load_config(Some(p))).transpose()
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_version(
    config: Option<&PricegateConfig>,
    repo: &Path,
    with_path: bool,
    timestamp: bool,
) -> Result<u8> {
    let version_config = config.map(|c| c.versioning).unwrap_or_default();
    let versioning = Versioning::from_env(version_config, repo);

    if timestamp {
        println!("{}", versioning.get_timestamp());
        return Ok(0);
    }

    println!("{}", versioning.get_version());
    if with_path {
        let deploy = config.map(|c| c.deploy.clone()).unwrap_or_default();
        let model_name = config
            .map(|c| c.deploy_model_name().to_string())
            .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());
        println!("{}", versioning.get_model_path(&deploy.bucket, &model_name));
    }
    Ok(0)
}

async fn cmd_train(
    config: &PricegateConfig,
    data: &Path,
    models_dir: &Path,
    tracking_uri: Option<String>,
) -> Result<u8> {
    let training = config.training_config()?;

    let mut tracking = config.tracking.clone();
    if tracking_uri.is_some() {
        tracking.uri = tracking_uri;
    }
    let tracker = tracker_for(&tracking).context("Failed to set up experiment tracking")?;

    let csv = resolve_csv(data)?;
    let dataset = Dataset::from_csv_path(&csv, &training.target)?;
    info!(rows = dataset.len(), path = %csv.display(), "Loaded training data");

    let outcome = run_training(
        &training,
        dataset,
        models_dir,
        tracker.as_ref(),
        config.experiment_name(),
    )
    .await?;

    let m = &outcome.metrics;
    println!(
        "Trained {} model '{}'",
        outcome.artifact.kind, outcome.artifact.model_name
    );
    println!("  Artifact: {}", outcome.artifact_path.display());
    println!("  Metrics:  {}", outcome.metrics_path.display());
    println!(
        "  Holdout:  mae={:.2} rmse={:.2} r2={:.4} ({} rows)",
        m.mae, m.rmse, m.r2, m.n_test
    );
    println!("  CV r2:    {:.4} ± {:.4}", m.cv_r2_mean, m.cv_r2_std);
    if let Some(run_id) = &outcome.tracking_run_id {
        println!("  Tracking run: {run_id}");
    }
    Ok(0)
}

fn cmd_evaluate(
    artifact: &Path,
    holdout: &Path,
    output_dir: &Path,
    thresholds: &GateThresholds,
    require_approval: bool,
    summary: bool,
) -> Result<u8> {
    let report = evaluate_files(artifact, holdout, thresholds)?;
    let path = write_evaluation_report(output_dir, &report)?;

    if summary {
        println!("{}", render_evaluation_md(&report));
    } else {
        let status = if report.model_approved {
            "✓ APPROVED"
        } else {
            "✗ REJECTED"
        };
        println!("Gate: {status}");
        println!(
            "  r2={:.4} mae={:.2} rmse={:.2} mape={:.2}%",
            report.metrics.r2, report.metrics.mae, report.metrics.rmse, report.metrics.mape
        );
        for violation in &report.violations {
            println!("  - {}", violation.reason);
        }
    }
    println!("Report: {}", path.display());

    if require_approval && !report.approved() {
        return Ok(EXIT_REJECTED);
    }
    Ok(0)
}

async fn cmd_publish(
    config: Option<&PricegateConfig>,
    store_args: &StoreArgs,
    artifact: &Path,
    model_name: Option<&str>,
    manifest: Option<&Path>,
    repo: &Path,
) -> Result<u8> {
    let deploy = config.map(|c| c.deploy.clone()).unwrap_or_default();
    let model_name = model_name
        .or(config.map(|c| c.deploy_model_name()))
        .unwrap_or(DEFAULT_MODEL_NAME);
    let version_config: VersionConfig = config.map(|c| c.versioning).unwrap_or_default();

    let store = store_args.open(&deploy)?;
    let publisher = Publisher::new(store, Versioning::from_env(version_config, repo));
    let outcome = publisher
        .publish(artifact, model_name)
        .await
        .with_context(|| format!("Failed to publish {:?}", artifact))?;

    println!("Published {} {}", model_name, outcome.version);
    println!("  URI:    {}", outcome.uri);
    println!("  SHA256: {}", outcome.sha256);
    if !outcome.pointer_updated {
        println!("  Warning: latest pointer was not updated");
    }
    if let Some(path) = manifest {
        write_publish_manifest(path, &outcome)?;
        println!("  Manifest: {}", path.display());
    }
    Ok(0)
}

async fn cmd_versions(
    config: Option<&PricegateConfig>,
    store_args: &StoreArgs,
    model_name: Option<&str>,
) -> Result<u8> {
    let deploy = config.map(|c| c.deploy.clone()).unwrap_or_default();
    let model_name = model_name
        .or(config.map(|c| c.deploy_model_name()))
        .unwrap_or(DEFAULT_MODEL_NAME);
    let store = store_args.open(&deploy)?;

    let versions = list_versions(store.as_ref(), model_name).await?;
    let latest = latest_version(store.as_ref(), model_name).await?;

    if versions.is_empty() {
        println!("No versions published for {model_name}");
        return Ok(0);
    }
    for version in versions.iter().map(ToString::to_string) {
        let marker = if latest.as_deref() == Some(version.as_str()) {
            " (latest)"
        } else {
            ""
        };
        println!("{version}{marker}");
    }
    Ok(0)
}

fn builtin_definition(name: &str, model_name: &str) -> Result<PipelineDefinition> {
    PipelineDefinition::builtin(name, model_name).ok_or_else(|| {
        PricegateError::Config(format!(
            "unknown pipeline '{name}' (expected 'scheduled' or 'cloud')"
        ))
        .into()
    })
}

fn cmd_pipeline_show(name: &str, model_name: &str) -> Result<u8> {
    let definition = builtin_definition(name, model_name)?;
    definition.validate()?;
    println!("{}", serde_json::to_string_pretty(&definition)?);
    Ok(0)
}

async fn cmd_pipeline_run(
    config: PricegateConfig,
    name: &str,
    workdir: &Path,
    store_args: &StoreArgs,
) -> Result<u8> {
    let definition = builtin_definition(name, &config.model.name)?;

    let store = store_args.open(&config.deploy)?;
    let tracker = tracker_for(&config.tracking).context("Failed to set up experiment tracking")?;
    let versioning = Versioning::from_env(config.versioning, workdir);
    let context = PipelineContext::new(workdir, config, store, versioning, Arc::from(tracker));

    println!("Running pipeline {} in {:?}", definition.name, workdir);
    println!("Stages: {}", definition.stage_names().join(" -> "));
    println!();

    let result = PipelineRunner::new(context)
        .run(&definition)
        .await
        .context("Pipeline failed to run")?;

    println!("Run ID: {}", result.run_id);
    println!(
        "Status: {}",
        if result.success { "✓ PASSED" } else { "✗ FAILED" }
    );
    println!("Duration: {}ms", result.duration_ms);
    println!();

    for stage in &result.stages {
        let status = if stage.passed() { "✓" } else { "✗" };
        println!(
            "  {} {} ({}ms, attempts: {}, exit code: {})",
            status, stage.stage_name, stage.duration_ms, stage.attempts, stage.exit_code
        );
        if !stage.passed() && !stage.stderr.is_empty() {
            println!("      {}", stage.stderr.trim());
        }
    }

    println!();
    println!(
        "Summary: {}/{} stages passed",
        result.passed_count(),
        definition.stages.len()
    );

    Ok(if result.success { 0 } else { 1 })
}
