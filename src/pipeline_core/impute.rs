//! Multivariate iterative imputation over numeric columns.
//!
//! Missing cells start at the column mean, then a fixed number of
//! round-robin rounds regress each column on all the others and re-predict
//! its missing cells. The fitted per-column models and means form the
//! imputer handle; applying the handle replays them on unseen data without
//! refitting anything.

use linfa::prelude::*;
use linfa_linear::{FittedLinearRegression, LinearRegression};
use ndarray::{Array1, Array2};

use crate::frame::{Column, Frame};
use crate::utils::PipelineError;

/// Number of round-robin refinement rounds
pub const DEFAULT_ROUNDS: usize = 5;

/// Per-column completion model
enum ColumnModel {
    /// Fall back to the stored column mean (degenerate columns)
    Mean,
    /// Regression of the column on all other imputer columns
    Linear(FittedLinearRegression<f64>),
}

/// Fitted imputation state: column list, means and per-column models
pub struct ImputerHandle {
    columns: Vec<String>,
    means: Vec<f64>,
    models: Vec<ColumnModel>,
    rounds: usize,
}

impl ImputerHandle {
    /// Columns this handle was fit on, in fit order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Fit the imputer on the training frame and return the completed frame
/// plus the handle used for apply-phase imputation.
pub fn fit(frame: &Frame, columns: &[String]) -> Result<(Frame, ImputerHandle), PipelineError> {
    let cells = gather(frame, columns)?;
    let means: Vec<f64> = cells.iter().map(|col| observed_mean(col)).collect();

    let mut filled: Vec<Vec<f64>> = cells
        .iter()
        .zip(&means)
        .map(|(col, &mean)| col.iter().map(|c| c.unwrap_or(mean)).collect())
        .collect();

    let rounds = DEFAULT_ROUNDS;
    let mut models: Vec<ColumnModel> = Vec::with_capacity(columns.len());

    if columns.len() < 2 || frame.n_rows() < 2 {
        // Nothing to regress on; mean fill is the whole model
        models = columns.iter().map(|_| ColumnModel::Mean).collect();
    } else {
        for round in 0..rounds {
            let last_round = round + 1 == rounds;
            for j in 0..columns.len() {
                let observed: Vec<usize> = (0..cells[j].len())
                    .filter(|&r| cells[j][r].is_some())
                    .collect();
                if observed.len() < 2 {
                    if last_round {
                        models.push(ColumnModel::Mean);
                    }
                    continue;
                }

                let x = predictor_matrix(&filled, j, &observed)?;
                let y: Array1<f64> =
                    observed.iter().map(|&r| filled[j][r]).collect();
                let model = LinearRegression::default()
                    .fit(&Dataset::new(x, y))
                    .map_err(|e| {
                        PipelineError::Estimator(format!(
                            "imputation regression for `{}` failed: {}",
                            columns[j], e
                        ))
                    })?;

                let missing: Vec<usize> = (0..cells[j].len())
                    .filter(|&r| cells[j][r].is_none())
                    .collect();
                if !missing.is_empty() {
                    let xm = predictor_matrix(&filled, j, &missing)?;
                    let predictions = model.predict(&xm);
                    for (idx, &r) in missing.iter().enumerate() {
                        filled[j][r] = predictions[idx];
                    }
                }

                if last_round {
                    models.push(ColumnModel::Linear(model));
                }
            }
        }
    }

    let out = emit(frame, columns, &filled)?;
    Ok((
        out,
        ImputerHandle {
            columns: columns.to_vec(),
            means,
            models,
            rounds,
        },
    ))
}

/// Complete an unseen frame using only the stored handle.
///
/// Every column recorded in the handle must be present; absence is a
/// schema mismatch.
pub fn apply(frame: &Frame, handle: &ImputerHandle) -> Result<Frame, PipelineError> {
    let cells = gather(frame, &handle.columns)?;

    let mut filled: Vec<Vec<f64>> = cells
        .iter()
        .zip(&handle.means)
        .map(|(col, &mean)| col.iter().map(|c| c.unwrap_or(mean)).collect())
        .collect();

    for _ in 0..handle.rounds {
        for (j, model) in handle.models.iter().enumerate() {
            let model = match model {
                ColumnModel::Linear(model) => model,
                ColumnModel::Mean => continue,
            };
            let missing: Vec<usize> = (0..cells[j].len())
                .filter(|&r| cells[j][r].is_none())
                .collect();
            if missing.is_empty() {
                continue;
            }
            let xm = predictor_matrix(&filled, j, &missing)?;
            let predictions = model.predict(&xm);
            for (idx, &r) in missing.iter().enumerate() {
                filled[j][r] = predictions[idx];
            }
        }
    }

    emit(frame, &handle.columns, &filled)
}

fn gather(frame: &Frame, columns: &[String]) -> Result<Vec<Vec<Option<f64>>>, PipelineError> {
    columns
        .iter()
        .map(|name| frame.numeric(name).map(|v| v.clone()))
        .collect()
}

fn observed_mean(cells: &[Option<f64>]) -> f64 {
    let values: Vec<f64> = cells.iter().flatten().copied().collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Build the predictor matrix for one target column over the given rows
fn predictor_matrix(
    filled: &[Vec<f64>],
    target: usize,
    rows: &[usize],
) -> Result<Array2<f64>, PipelineError> {
    let n_cols = filled.len() - 1;
    let mut data = Vec::with_capacity(rows.len() * n_cols);
    for &r in rows {
        for (j, col) in filled.iter().enumerate() {
            if j != target {
                data.push(col[r]);
            }
        }
    }
    Array2::from_shape_vec((rows.len(), n_cols), data)
        .map_err(|e| PipelineError::Validation(format!("failed to shape predictor matrix: {}", e)))
}

fn emit(frame: &Frame, columns: &[String], filled: &[Vec<f64>]) -> Result<Frame, PipelineError> {
    let mut out = frame.clone();
    for (name, values) in columns.iter().zip(filled) {
        out.insert(
            name,
            Column::Numeric(values.iter().map(|&v| Some(v)).collect()),
        )?;
    }
    Ok(out)
}
