//! One-class boundary scoring with a Gaussian kernel.
//!
//! The detector keeps the training rows and scores a point by its mean RBF
//! kernel value against them, so points far outside the training support
//! fall toward zero. Bandwidth follows the `scale` heuristic,
//! gamma = 1 / (n_features * variance).

use ndarray::Array2;

use crate::utils::PipelineError;

/// A fitted one-class kernel boundary detector
pub struct BoundaryDetector {
    train: Array2<f64>,
    gamma: f64,
}

impl BoundaryDetector {
    /// Fit the detector on training rows
    pub fn fit(features: &Array2<f64>) -> Result<Self, PipelineError> {
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(PipelineError::Estimator(
                "boundary detector needs a non-empty training matrix".to_string(),
            ));
        }

        let n = (features.nrows() * features.ncols()) as f64;
        let mean = features.iter().sum::<f64>() / n;
        let var = features.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let gamma = if var > 0.0 {
            1.0 / (features.ncols() as f64 * var)
        } else {
            1.0 / features.ncols() as f64
        };

        Ok(Self {
            train: features.clone(),
            gamma,
        })
    }

    /// Score rows against the fitted boundary; larger values mean more normal
    pub fn score(&self, features: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        if features.ncols() != self.train.ncols() {
            return Err(PipelineError::SchemaMismatch(format!(
                "detector was fit on {} columns, got {}",
                self.train.ncols(),
                features.ncols()
            )));
        }

        let n_train = self.train.nrows() as f64;
        let scores = features
            .rows()
            .into_iter()
            .map(|row| {
                let kernel_sum: f64 = self
                    .train
                    .rows()
                    .into_iter()
                    .map(|train_row| {
                        let sq_dist: f64 = row
                            .iter()
                            .zip(train_row.iter())
                            .map(|(a, b)| (a - b).powi(2))
                            .sum();
                        (-self.gamma * sq_dist).exp()
                    })
                    .sum();
                kernel_sum / n_train
            })
            .collect();

        Ok(scores)
    }
}
