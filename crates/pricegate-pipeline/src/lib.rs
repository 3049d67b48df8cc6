//! Pricegate Pipeline - ordered stage execution for the house-price model
//!
//! Provides:
//! - The scheduled (weekly) and cloud pipeline definitions
//! - Definition validation (stage order against declared inputs/outputs)
//! - A local runner with per-stage retries and timeouts that stops at the
//!   first failing stage, including a rejected gate verdict

pub mod error;
pub mod pipeline;
pub mod runner;
pub mod spec;
pub mod stage;

// Re-export key types
pub use error::{PipelineError, PipelineResult as Result};
pub use pipeline::{PipelineContext, PipelineRun, PipelineRunner};
pub use runner::{StageResult, StageRunner};
pub use spec::PipelineDefinition;
pub use stage::{Stage, StageAction};
