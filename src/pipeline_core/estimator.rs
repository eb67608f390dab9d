//! Leaf estimators behind a single fit/predict capability interface.
//!
//! The orchestrator depends only on [`Estimator`]; concrete families plug in
//! underneath it and their failures surface unchanged as estimator errors.

use linfa::prelude::*;
use linfa_linear::{FittedLinearRegression, LinearRegression};
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};

use crate::utils::PipelineError;

/// A supervised leaf estimator producing one risk score per row
pub trait Estimator {
    /// Short family name, also used as the score column of the results table
    fn name(&self) -> &str;

    /// Train on a complete feature matrix and row-aligned labels
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), PipelineError>;

    /// Score rows with the trained model
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, PipelineError>;
}

/// Least-squares linear model; the predicted value is used as the risk score
#[derive(Default)]
pub struct LinearEstimator {
    model: Option<FittedLinearRegression<f64>>,
}

impl LinearEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Estimator for LinearEstimator {
    fn name(&self) -> &str {
        "linear"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), PipelineError> {
        let dataset = Dataset::new(x.clone(), y.clone());
        let model = LinearRegression::default()
            .fit(&dataset)
            .map_err(|e| PipelineError::Estimator(format!("linear regression failed: {}", e)))?;
        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PipelineError::Estimator("linear model is not fitted".to_string()))?;
        Ok(model.predict(x))
    }
}

/// Logistic regression; the risk score is the positive-class probability
pub struct LogisticEstimator {
    model: Option<FittedLogisticRegression<f64, bool>>,
    max_iterations: u64,
}

impl LogisticEstimator {
    pub fn new() -> Self {
        Self {
            model: None,
            max_iterations: 150,
        }
    }

    pub fn with_max_iterations(max_iterations: u64) -> Self {
        Self {
            model: None,
            max_iterations,
        }
    }
}

impl Default for LogisticEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for LogisticEstimator {
    fn name(&self) -> &str {
        "logistic"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), PipelineError> {
        let targets: Array1<bool> = y.mapv(|v| v > 0.5);
        let dataset = Dataset::new(x.clone(), targets);
        let model = LogisticRegression::default()
            .max_iterations(self.max_iterations)
            .fit(&dataset)
            .map_err(|e| PipelineError::Estimator(format!("logistic regression failed: {}", e)))?;
        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PipelineError::Estimator("logistic model is not fitted".to_string()))?;
        Ok(model.predict_probabilities(x))
    }
}
