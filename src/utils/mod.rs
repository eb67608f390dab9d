/// Utility modules for error handling, standardization and range masking
pub mod error;
pub mod ranges;
pub mod standardize;

// Re-export commonly used types
pub use error::PipelineError;
pub use ranges::FeatureRanges;
pub use standardize::{fit_standardization, is_standardized, standardize_with, StandardizationParams};
