//! Domain models for Pricegate.
//!
//! Canonical definitions for the core entities:
//! - `Version`: identity of a published artifact
//! - `GateThresholds`, `HoldoutMetrics`, `TrainingMetrics`: evaluation inputs and outputs
//! - `HouseFeatures`, `PredictionResponse`: the serving schema

pub mod error;
pub mod eval;
pub mod prediction;
pub mod version;

pub use error::{ErrorKind, PricegateError, Result};
pub use eval::{GateThresholds, HoldoutMetrics, TrainingMetrics};
pub use prediction::{FeatureViolation, HouseFeatures, PredictionResponse, FEATURE_NAMES};
pub use version::{Revision, Version};
