//! Integration tests for the local pipeline runner.

use std::path::Path;
use std::sync::Arc;

use pricegate_core::{
    latest_version, read_evaluation_report, NoopTracker, PricegateConfig, RevisionLookup,
    VersionConfig, Versioning,
};
use pricegate_pipeline::{
    PipelineContext, PipelineDefinition, PipelineError, PipelineRunner, Stage, StageAction,
};
use pricegate_store::fakes::MemoryObjectStore;
use pricegate_store::ObjectStore;

const CONFIG: &str = r#"
[model]
name = "house-price-model"
best_model = "LinearRegression"

[gate]
min_r2 = 0.6
max_mae = 80000.0
max_mape = 20.0
"#;

fn write_houses_csv(path: &Path, rows: usize) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut out = String::from("sqft,bedrooms,price\n");
    for i in 0..rows {
        let sqft = 900.0 + (i * 53 % 1900) as f64;
        let bedrooms = (1 + i % 4) as f64;
        let price = 40_000.0 + 160.0 * sqft + 9_000.0 * bedrooms;
        out.push_str(&format!("{sqft},{bedrooms},{price}\n"));
    }
    std::fs::write(path, out).unwrap();
}

fn context(workdir: &Path, config: &str, store: Arc<dyn ObjectStore>) -> PipelineContext {
    let config: PricegateConfig = config.parse().unwrap();
    PipelineContext::new(
        workdir,
        config,
        store,
        Versioning::fixed(
            VersionConfig::default(),
            RevisionLookup::Found("0123abcd".to_string()),
        ),
        Arc::new(NoopTracker),
    )
}

fn command_pipeline(stages: Vec<Stage>, retries: u32) -> PipelineDefinition {
    PipelineDefinition {
        name: "test_pipeline".to_string(),
        description: String::new(),
        schedule: None,
        owner: "tests".to_string(),
        retries,
        retry_delay_secs: 0,
        catchup: false,
        inputs: Vec::new(),
        stages,
    }
}

/// Train → evaluate → publish over local paths.
fn train_gate_publish() -> PipelineDefinition {
    let artifact = "models/trained/house-price-model.json";
    let mut def = command_pipeline(
        vec![
            Stage::new(
                "model_training",
                StageAction::Train {
                    data: "data/train.csv".into(),
                    models_dir: "models".into(),
                },
            )
            .consumes(["data/train.csv"])
            .produces([artifact]),
            Stage::new(
                "model_validation",
                StageAction::Evaluate {
                    artifact: artifact.into(),
                    holdout: "data/holdout".into(),
                    output_dir: "output".into(),
                },
            )
            .consumes([artifact, "data/holdout"])
            .produces(["output/evaluation.json"]),
            Stage::new(
                "model_deployment",
                StageAction::Publish {
                    artifact: artifact.into(),
                    manifest: Some("output/publish.json".into()),
                },
            )
            .consumes([artifact, "output/evaluation.json"]),
        ],
        1,
    );
    def.inputs = vec!["data/train.csv".to_string(), "data/holdout".to_string()];
    def
}

fn seed_data(workdir: &Path) {
    write_houses_csv(&workdir.join("data/train.csv"), 100);
    write_houses_csv(&workdir.join("data/holdout/test.csv"), 30);
}

#[tokio::test]
async fn test_successful_command_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let runner = PipelineRunner::new(context(
        dir.path(),
        CONFIG,
        Arc::new(MemoryObjectStore::default()),
    ));
    let def = command_pipeline(
        vec![
            Stage::command("first", ["echo", "hello"]),
            Stage::command("second", ["echo", "world"]),
        ],
        0,
    );

    let run = runner.run(&def).await.unwrap();
    assert!(run.success);
    assert_eq!(run.passed_count(), 2);
    assert_eq!(run.failed_count(), 0);
    assert!(run.failed_stage.is_none());
    assert!(!run.run_id.is_empty());
    assert_eq!(run.stages_digest, def.stages_digest());
}

#[tokio::test]
async fn test_stops_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = PipelineRunner::new(context(
        dir.path(),
        CONFIG,
        Arc::new(MemoryObjectStore::default()),
    ));
    let def = command_pipeline(
        vec![
            Stage::command("broken", ["false"]),
            Stage::command("never", ["touch", "ran.txt"]),
        ],
        0,
    );

    let run = runner.run(&def).await.unwrap();
    assert!(!run.success);
    assert_eq!(run.stages.len(), 1);
    assert_eq!(run.failed_stage.as_deref(), Some("broken"));
    assert!(!dir.path().join("ran.txt").exists());
}

#[tokio::test]
async fn test_failed_stage_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let runner = PipelineRunner::new(context(
        dir.path(),
        CONFIG,
        Arc::new(MemoryObjectStore::default()),
    ));
    let flaky = Stage::command(
        "flaky",
        [
            "sh",
            "-c",
            "if [ -f seen ]; then exit 0; else touch seen; exit 1; fi",
        ],
    );

    let run = runner.run(&command_pipeline(vec![flaky.clone()], 1)).await.unwrap();
    assert!(run.success);
    assert_eq!(run.stages[0].attempts, 2);

    std::fs::remove_file(dir.path().join("seen")).unwrap();
    let run = runner.run(&command_pipeline(vec![flaky], 0)).await.unwrap();
    assert!(!run.success);
    assert_eq!(run.stages[0].attempts, 1);
}

#[tokio::test]
async fn test_invalid_definition_is_rejected_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let runner = PipelineRunner::new(context(
        dir.path(),
        CONFIG,
        Arc::new(MemoryObjectStore::default()),
    ));
    let def = command_pipeline(
        vec![Stage::command("needs_input", ["touch", "ran.txt"]).consumes(["missing.csv"])],
        0,
    );

    let err = runner.run(&def).await.unwrap_err();
    assert!(matches!(err, PipelineError::UnresolvedInput { .. }));
    assert!(!dir.path().join("ran.txt").exists());
}

#[tokio::test]
async fn test_approved_model_is_published() {
    let dir = tempfile::tempdir().unwrap();
    seed_data(dir.path());
    let store = Arc::new(MemoryObjectStore::new("mlops"));
    let runner = PipelineRunner::new(context(dir.path(), CONFIG, store.clone()));

    let run = runner.run(&train_gate_publish()).await.unwrap();
    assert!(run.success, "stages: {:?}", run.stages);
    assert_eq!(run.passed_count(), 3);

    let report = read_evaluation_report(&dir.path().join("output/evaluation.json")).unwrap();
    assert!(report.model_approved);
    assert!(dir.path().join("output/publish.json").is_file());
    assert_eq!(
        latest_version(store.as_ref(), "house-price-model")
            .await
            .unwrap()
            .as_deref(),
        Some("v1.0.0-0123abcd")
    );
}

#[tokio::test]
async fn test_rejected_gate_stops_deployment() {
    let dir = tempfile::tempdir().unwrap();
    seed_data(dir.path());
    let store = Arc::new(MemoryObjectStore::new("mlops"));
    let strict = CONFIG.replace("max_mae = 80000.0", "max_mae = 0.0");
    let runner = PipelineRunner::new(context(dir.path(), &strict, store.clone()));

    let run = runner.run(&train_gate_publish()).await.unwrap();
    assert!(!run.success);
    assert_eq!(run.failed_stage.as_deref(), Some("model_validation"));
    assert!(run.stage("model_deployment").is_none());

    let validation = run.stage("model_validation").unwrap();
    assert_eq!(validation.attempts, 1);
    assert!(validation.stderr.contains("gate rejected"));

    let report = read_evaluation_report(&dir.path().join("output/evaluation.json")).unwrap();
    assert!(!report.model_approved);
    assert_eq!(report.thresholds.max_mae, 0.0);
    assert_eq!(report.thresholds.min_r2, 0.6);
    assert!(store.keys().is_empty());
}
