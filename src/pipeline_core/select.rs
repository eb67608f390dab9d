//! Feature selection: rank candidate columns at fit time and freeze the
//! chosen list. Apply-phase code reuses the frozen list verbatim and never
//! re-ranks.

use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::Array1;
use std::str::FromStr;

use crate::frame::Frame;
use crate::utils::PipelineError;

/// Ranking metric used to freeze the selected-feature list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionMetric {
    /// A precomputed column list, passed through verbatim
    Explicit(Vec<String>),
    /// Top-K columns by signed Pearson correlation with the label
    Correlation,
    /// Top-K columns by absolute coefficient of a least-squares model
    ModelImportance,
    /// Keep all columns, frame order preserved
    None,
}

impl FromStr for SelectionMetric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "correlation" => Ok(SelectionMetric::Correlation),
            "importance" | "model-importance" | "xgb" => Ok(SelectionMetric::ModelImportance),
            "" | "none" => Ok(SelectionMetric::None),
            other => Err(PipelineError::Validation(format!(
                "unknown selection metric `{}`",
                other
            ))),
        }
    }
}

/// Rank the frame's columns against the labels and return the frozen
/// ordered list of at most `k` column names.
pub fn select(
    frame: &Frame,
    labels: &Array1<f64>,
    metric: &SelectionMetric,
    k: usize,
) -> Result<Vec<String>, PipelineError> {
    if k == 0 {
        return Err(PipelineError::Validation(
            "n_features must be a positive integer".to_string(),
        ));
    }

    match metric {
        SelectionMetric::Explicit(list) => Ok(list.clone()),
        SelectionMetric::None => Ok(frame.column_names().to_vec()),
        SelectionMetric::Correlation => {
            let names = frame.column_names().to_vec();
            let matrix = frame.to_matrix(&names)?;
            let y: Vec<f64> = labels.iter().copied().collect();
            let scored: Vec<(String, f64)> = names
                .iter()
                .enumerate()
                .map(|(j, name)| {
                    let col: Vec<f64> = matrix.column(j).iter().copied().collect();
                    (name.clone(), pearson(&col, &y))
                })
                .collect();
            Ok(top_k(scored, k))
        }
        SelectionMetric::ModelImportance => {
            let names = frame.column_names().to_vec();
            let matrix = frame.to_matrix(&names)?;
            let dataset = Dataset::new(matrix, labels.clone());
            let model = LinearRegression::default().fit(&dataset).map_err(|e| {
                PipelineError::Estimator(format!("importance ranking model failed: {}", e))
            })?;
            let scored: Vec<(String, f64)> = names
                .iter()
                .zip(model.params().iter())
                .map(|(name, &coef)| (name.clone(), coef.abs()))
                .collect();
            Ok(top_k(scored, k))
        }
    }
}

/// Signed Pearson correlation; zero-variance inputs score 0
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if x.is_empty() {
        return 0.0;
    }
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

/// Keep the k highest-scoring names; ties keep frame order (stable sort)
fn top_k(mut scored: Vec<(String, f64)>, k: usize) -> Vec<String> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored.into_iter().map(|(name, _)| name).collect()
}
