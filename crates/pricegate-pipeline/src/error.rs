use std::time::Duration;

use pricegate_core::PricegateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline '{0}' has no stages")]
    Empty(String),

    #[error("stage name '{0}' is used more than once")]
    DuplicateStage(String),

    #[error("stage '{stage}' consumes '{input}', which no earlier stage produces")]
    UnresolvedInput { stage: String, input: String },

    #[error("stage '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("stage '{stage}' timed out after {}s", .after.as_secs())]
    Timeout { stage: String, after: Duration },

    #[error("gate rejected the model: {}", .reasons.join("; "))]
    GateRejected { reasons: Vec<String> },

    #[error("report error: {0}")]
    Report(String),

    #[error(transparent)]
    Core(#[from] PricegateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether another attempt could change the outcome.
    ///
    /// Definition errors, gate verdicts and configuration problems are
    /// deterministic; everything else may be transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Empty(_)
            | PipelineError::DuplicateStage(_)
            | PipelineError::UnresolvedInput { .. }
            | PipelineError::EmptyCommand(_)
            | PipelineError::GateRejected { .. } => false,
            PipelineError::Core(e) => e.kind() != pricegate_core::ErrorKind::Configuration,
            _ => true,
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_rejection_is_final() {
        let err = PipelineError::GateRejected {
            reasons: vec!["r2 0.1000 is not above required 0.6000".to_string()],
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("r2 0.1000"));
    }

    #[test]
    fn timeouts_and_io_are_retryable() {
        let timeout = PipelineError::Timeout {
            stage: "data_processing".to_string(),
            after: Duration::from_secs(3),
        };
        assert!(timeout.is_retryable());
        assert_eq!(
            timeout.to_string(),
            "stage 'data_processing' timed out after 3s"
        );
        assert!(PipelineError::Io(std::io::Error::other("disk")).is_retryable());
    }

    #[test]
    fn config_errors_are_not_retried() {
        let err = PipelineError::Core(PricegateError::UnsupportedModel("SVR".into()));
        assert!(!err.is_retryable());
        let err = PipelineError::Core(PricegateError::InvalidDataset("empty".into()));
        assert!(err.is_retryable());
    }
}
