use std::fmt;

/// Custom error type for pipeline operations
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Malformed configuration (selector length, K <= 0, unknown metric)
    Validation(String),
    /// predict/evaluate invoked before a successful fit
    UnfitPipeline,
    /// Apply-phase selector requests a method with no fit-phase handle
    MissingHandle(String),
    /// An expected column is absent from the input frame at apply time
    SchemaMismatch(String),
    /// A wrapped imputer/detector/leaf estimator failed during fit or apply
    Estimator(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Validation(msg) => write!(f, "ValidationError: {}", msg),
            PipelineError::UnfitPipeline => {
                write!(f, "UnfitPipelineError: fit must be called before predict/evaluate")
            }
            PipelineError::MissingHandle(msg) => write!(f, "MissingHandleError: {}", msg),
            PipelineError::SchemaMismatch(msg) => write!(f, "SchemaMismatchError: {}", msg),
            PipelineError::Estimator(msg) => write!(f, "UpstreamEstimatorError: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
