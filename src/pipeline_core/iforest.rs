//! Isolation-based ensemble anomaly scoring.

use extended_isolation_forest::{Forest, ForestOptions};
use ndarray::Array2;

use crate::pipeline_core::{pad_points, MAX_DETECTOR_FEATURES};
use crate::utils::PipelineError;

/// A fitted isolation forest detector
pub struct ForestDetector {
    forest: Forest<f64, MAX_DETECTOR_FEATURES>,
    n_features: usize,
}

impl ForestDetector {
    /// Fit an isolation forest on training rows.
    ///
    /// Uses 100 trees with adaptive subsampling (all rows below 256).
    pub fn fit(features: &Array2<f64>) -> Result<Self, PipelineError> {
        let points = pad_points(features)?;
        if points.is_empty() {
            return Err(PipelineError::Estimator(
                "isolation forest needs a non-empty training matrix".to_string(),
            ));
        }

        let sample_size = points.len().min(256);
        let options = ForestOptions {
            n_trees: 100,
            sample_size,
            max_tree_depth: None,
            extension_level: 1,
        };

        let forest = Forest::from_slice(&points, &options).map_err(|e| {
            PipelineError::Estimator(format!("isolation forest training failed: {:?}", e))
        })?;

        Ok(Self {
            forest,
            n_features: features.ncols(),
        })
    }

    /// Score rows with the fitted forest.
    ///
    /// The raw forest score lives in [0, 1] with higher = more anomalous;
    /// it is reported as `0.5 - raw` so larger values mean more normal,
    /// consistent with the other detectors.
    pub fn score(&self, features: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        if features.ncols() != self.n_features {
            return Err(PipelineError::SchemaMismatch(format!(
                "detector was fit on {} columns, got {}",
                self.n_features,
                features.ncols()
            )));
        }
        let points = pad_points(features)?;
        Ok(points.iter().map(|p| 0.5 - self.forest.score(p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outlier_scores_lower() {
        let features = Array2::from_shape_vec(
            (5, 2),
            vec![1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 2.5, 3.5, 100.0, 200.0],
        )
        .unwrap();
        let detector = ForestDetector::fit(&features).unwrap();
        let scores = detector.score(&features).unwrap();

        assert_eq!(scores.len(), 5);
        // Larger score = more normal; the far point must rank below the cluster
        assert!(scores[4] < scores[0]);
        assert!(scores[4] < scores[1]);
    }

    #[test]
    fn test_apply_is_deterministic() {
        let features = Array2::from_shape_vec(
            (6, 2),
            vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0],
        )
        .unwrap();
        let detector = ForestDetector::fit(&features).unwrap();

        let unseen = Array2::from_shape_vec((2, 2), vec![2.5, 2.5, 80.0, -80.0]).unwrap();
        let first = detector.score(&unseen).unwrap();
        let second = detector.score(&unseen).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_training_is_error() {
        let features = Array2::<f64>::zeros((0, 2));
        assert!(ForestDetector::fit(&features).is_err());
    }

    #[test]
    fn test_column_count_mismatch() {
        let features = Array2::from_shape_vec((4, 2), vec![0.0; 8]).unwrap();
        let detector = ForestDetector::fit(&features).unwrap();
        assert!(matches!(
            detector.score(&Array2::<f64>::zeros((1, 5))),
            Err(PipelineError::SchemaMismatch(_))
        ));
    }
}
