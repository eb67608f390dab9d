use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::frame::{Column, Frame};
use crate::stats::mean_std;
use crate::utils::PipelineError;

/// Tolerance used by the already-standardized heuristic
pub const STANDARDIZED_EPSILON: f64 = 1e-10;

/// Per-column z-score parameters learned at fit time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub mean: f64,
    pub std: f64,
}

/// Mapping from column name to its learned moments
pub type StandardizationParams = BTreeMap<String, Moments>;

/// Fit z-score standardization on the given columns and apply it.
///
/// Mean and sample standard deviation are computed over non-missing values
/// only. A zero-variance column records the identity transform
/// `{mean: 0, std: 1}` and is left unchanged, so the persisted std is never
/// 0 and constant columns cannot produce NaN/inf downstream.
pub fn fit_standardization(
    frame: &Frame,
    columns: &[String],
) -> Result<(Frame, StandardizationParams), PipelineError> {
    let mut out = frame.clone();
    let mut params = StandardizationParams::new();

    for name in columns {
        let values = out.observed_numeric(name)?;
        let (mean, std) = mean_std(&values);

        if std == 0.0 {
            params.insert(name.clone(), Moments { mean: 0.0, std: 1.0 });
            continue;
        }

        let cells: Vec<Option<f64>> = out
            .numeric(name)?
            .iter()
            .map(|c| c.map(|x| (x - mean) / std))
            .collect();
        out.insert(name, Column::Numeric(cells))?;
        params.insert(name.clone(), Moments { mean, std });
    }

    Ok((out, params))
}

/// Apply stored standardization parameters to the given columns.
///
/// Nothing is recomputed from the input frame; a column without stored
/// params is a schema mismatch.
pub fn standardize_with(
    frame: &Frame,
    columns: &[String],
    params: &StandardizationParams,
) -> Result<Frame, PipelineError> {
    let mut out = frame.clone();

    for name in columns {
        let moments = params.get(name).ok_or_else(|| {
            PipelineError::SchemaMismatch(format!(
                "no standardization parameters recorded for column `{}`",
                name
            ))
        })?;
        let cells: Vec<Option<f64>> = out
            .numeric(name)?
            .iter()
            .map(|c| c.map(|x| (x - moments.mean) / moments.std))
            .collect();
        out.insert(name, Column::Numeric(cells))?;
    }

    Ok(out)
}

/// Check whether every column already has empirical mean ~0 and std ~1.
///
/// Read-only advisory check used by dependent stages to avoid
/// double-standardizing; downstream behavior (whether a detector records
/// input params) depends on this heuristic.
pub fn is_standardized(frame: &Frame, columns: &[String]) -> bool {
    for name in columns {
        let values = match frame.observed_numeric(name) {
            Ok(v) if !v.is_empty() => v,
            _ => return false,
        };
        let (mean, std) = mean_std(&values);
        if mean.abs() > STANDARDIZED_EPSILON || (std - 1.0).abs() > STANDARDIZED_EPSILON {
            debug!(
                "column `{}` is not standardized: mean={:.3}, std={:.3}",
                name, mean, std
            );
            return false;
        }
    }
    true
}
