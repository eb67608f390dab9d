/// ML stage modules: anomaly detectors, imputation, selection, leaf estimators
pub mod anomaly;
pub mod boundary;
pub mod estimator;
pub mod iforest;
pub mod impute;
pub mod lof;
pub mod select;

// Re-export commonly used types
pub use anomaly::{AnomalyBundle, AnomalyMethod, DetectorHandle, MethodSelector};

use ndarray::Array2;

use crate::utils::PipelineError;

/// Maximum number of input columns supported by the anomaly detectors
/// (KD-tree and isolation forest use fixed-width points)
pub const MAX_DETECTOR_FEATURES: usize = 16;

/// Pad matrix rows to the fixed detector point width, zero-filling unused
/// dimensions. Exceeding the width is a validation error.
pub(crate) fn pad_points(
    features: &Array2<f64>,
) -> Result<Vec<[f64; MAX_DETECTOR_FEATURES]>, PipelineError> {
    let n_features = features.ncols();
    if n_features == 0 {
        return Err(PipelineError::Validation(
            "detector input must have at least one column".to_string(),
        ));
    }
    if n_features > MAX_DETECTOR_FEATURES {
        return Err(PipelineError::Validation(format!(
            "detector input has {} columns, maximum supported is {}. \
             Consider feature selection before anomaly scoring.",
            n_features, MAX_DETECTOR_FEATURES
        )));
    }

    Ok(features
        .rows()
        .into_iter()
        .map(|row| {
            let mut point = [0.0; MAX_DETECTOR_FEATURES];
            for (j, &val) in row.iter().enumerate() {
                point[j] = val;
            }
            point
        })
        .collect())
}
