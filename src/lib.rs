//! Clinical Risk Engine - a leakage-safe fit/apply modeling pipeline
//!
//! This library provides a two-phase feature-engineering and modeling pipeline
//! for clinical tabular data: a fit phase learns every data-dependent parameter
//! from the training partition, and an apply phase replays those parameters on
//! unseen data without ever recomputing statistics from the unseen data itself.

pub mod frame;
pub mod pipeline;
pub mod pipeline_core;
pub mod stats;
pub mod utils;

pub use frame::{Column, Frame};
pub use pipeline::{ModelPipeline, ParameterBundle, PipelineConfig};
pub use pipeline_core::estimator::{Estimator, LinearEstimator, LogisticEstimator};
pub use pipeline_core::select::SelectionMetric;
pub use utils::PipelineError;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
