//! Pipeline stage definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default per-stage timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// What a stage does when it runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageAction {
    /// External process (first element is the executable).
    Command { command: Vec<String> },

    /// In-process training on the CSV at `data` (file or directory).
    Train { data: PathBuf, models_dir: PathBuf },

    /// In-process evaluation gate. Writes `evaluation.json` into `output_dir`
    /// and fails the stage when the model is not approved.
    Evaluate {
        artifact: PathBuf,
        holdout: PathBuf,
        output_dir: PathBuf,
    },

    /// In-process upload of `artifact` plus the `latest` pointer update.
    Publish {
        artifact: PathBuf,
        manifest: Option<PathBuf>,
    },
}

impl StageAction {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            StageAction::Command { .. } => "command",
            StageAction::Train { .. } => "train",
            StageAction::Evaluate { .. } => "evaluate",
            StageAction::Publish { .. } => "publish",
        }
    }
}

/// One named step of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    /// Unique name within the pipeline.
    pub name: String,

    pub action: StageAction,

    /// Locations this stage reads.
    pub inputs: Vec<String>,

    /// Locations this stage writes.
    pub outputs: Vec<String>,

    /// Timeout in seconds for external commands (0 = none).
    pub timeout_secs: u64,
}

impl Stage {
    pub fn new(name: impl Into<String>, action: StageAction) -> Self {
        Self {
            name: name.into(),
            action,
            inputs: Vec::new(),
            outputs: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// External command stage.
    pub fn command<I, S>(name: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            StageAction::Command {
                command: command.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn consumes<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn produces<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(outputs.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
