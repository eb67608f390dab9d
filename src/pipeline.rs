//! Two-phase modeling pipeline.
//!
//! `fit` learns every data-dependent parameter from the training frame and
//! freezes it in a [`ParameterBundle`]; `transform`, `predict` and
//! `evaluate` only replay frozen parameters, so unseen data never leaks
//! into any fitted quantity.

use log::{debug, info};
use ndarray::Array1;
use std::collections::BTreeMap;

use crate::frame::{Column, Frame};
use crate::pipeline_core::anomaly::{self, AnomalyBundle, MethodSelector};
use crate::pipeline_core::estimator::Estimator;
use crate::pipeline_core::impute::{self, ImputerHandle};
use crate::pipeline_core::select::{self, SelectionMetric};
use crate::utils::standardize::{
    fit_standardization, is_standardized, standardize_with, StandardizationParams,
};
use crate::utils::PipelineError;

/// Feature-engineering switches, fixed before fit
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How to rank candidate features
    pub selection_metric: SelectionMetric,
    /// Cap on the number of selected features
    pub n_features: usize,
    /// Standardize numeric inputs and generated score columns
    pub standardization: bool,
    /// Positional toggles for the anomaly method table
    pub anomaly_selector: Vec<bool>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            selection_metric: SelectionMetric::ModelImportance,
            n_features: 100,
            standardization: false,
            anomaly_selector: vec![false; anomaly::METHOD_COUNT],
        }
    }
}

/// Every fitted parameter of one pipeline, frozen at fit time
pub struct ParameterBundle {
    /// Per-column boolean mode used to fill missing categorical cells
    pub categorical_modes: BTreeMap<String, bool>,
    /// Numeric column names captured from the training frame
    pub numeric_columns: Vec<String>,
    /// Round-robin regression imputer state
    pub imputer: ImputerHandle,
    /// Input standardization snapshot; `None` when the training data was
    /// already standardized or standardization was disabled
    pub standard_params: Option<StandardizationParams>,
    /// Fitted anomaly detectors and their standardization snapshots
    pub anomaly: AnomalyBundle,
    /// Frozen ordered feature list fed to the estimator
    pub selected_features: Vec<String>,
}

/// Fit/apply pipeline around one leaf estimator
pub struct ModelPipeline {
    config: PipelineConfig,
    estimator: Box<dyn Estimator>,
    bundle: Option<ParameterBundle>,
}

impl ModelPipeline {
    pub fn new(config: PipelineConfig, estimator: Box<dyn Estimator>) -> Self {
        Self {
            config,
            estimator,
            bundle: None,
        }
    }

    /// The frozen parameters, once fit has succeeded
    pub fn bundle(&self) -> Option<&ParameterBundle> {
        self.bundle.as_ref()
    }

    /// Learn every pipeline parameter from the training frame and train
    /// the estimator on the engineered features.
    ///
    /// A failed fit leaves the pipeline unfit rather than half-updated.
    pub fn fit(&mut self, frame: &Frame, labels: &Array1<f64>) -> Result<(), PipelineError> {
        self.bundle = None;

        let selector = MethodSelector::from_bits(&self.config.anomaly_selector)?;
        if self.config.n_features == 0 {
            return Err(PipelineError::Validation(
                "n_features must be a positive integer".to_string(),
            ));
        }
        if frame.n_rows() == 0 {
            return Err(PipelineError::Validation("training frame is empty".to_string()));
        }
        if labels.len() != frame.n_rows() {
            return Err(PipelineError::Validation(format!(
                "label vector has {} entries, frame has {} rows",
                labels.len(),
                frame.n_rows()
            )));
        }
        info!(
            "fitting pipeline on {} rows, {} columns",
            frame.n_rows(),
            frame.n_cols()
        );

        let (frame, categorical_modes) = fill_bools_fit(frame)?;
        let numeric_columns = frame.numeric_column_names();

        let (frame, imputer) = impute::fit(&frame, &numeric_columns)?;

        let (frame, standard_params) =
            if self.config.standardization && !is_standardized(&frame, &numeric_columns) {
                let (standardized, params) = fit_standardization(&frame, &numeric_columns)?;
                (standardized, Some(params))
            } else {
                (frame, None)
            };

        let (frame, anomaly_bundle) = anomaly::fit(
            &frame,
            labels,
            &numeric_columns,
            &selector,
            self.config.standardization,
        )?;

        let selected_features = select::select(
            &frame,
            labels,
            &self.config.selection_metric,
            self.config.n_features,
        )?;
        debug!("selected {} features", selected_features.len());

        let features = frame.select(&selected_features)?.to_matrix(&selected_features)?;
        self.estimator.fit(&features, labels)?;

        // Assigned last so a failed fit leaves no stale state behind
        self.bundle = Some(ParameterBundle {
            categorical_modes,
            numeric_columns,
            imputer,
            standard_params,
            anomaly: anomaly_bundle,
            selected_features,
        });
        Ok(())
    }

    /// Replay the frozen parameters over an unseen frame and return the
    /// engineered feature frame.
    pub fn transform(&self, frame: &Frame) -> Result<Frame, PipelineError> {
        let bundle = self.bundle.as_ref().ok_or(PipelineError::UnfitPipeline)?;
        let selector = MethodSelector::from_bits(&self.config.anomaly_selector)?;

        let frame = fill_bools_apply(frame, &bundle.categorical_modes)?;
        let frame = impute::apply(&frame, &bundle.imputer)?;
        let frame = match &bundle.standard_params {
            Some(params) => standardize_with(&frame, &bundle.numeric_columns, params)?,
            None => frame,
        };
        let frame = anomaly::apply(
            &frame,
            &bundle.numeric_columns,
            &selector,
            &bundle.anomaly,
            self.config.standardization,
        )?;
        frame.select(&bundle.selected_features)
    }

    /// Engineer features for an unseen frame and score it
    pub fn predict(&self, frame: &Frame) -> Result<Array1<f64>, PipelineError> {
        let bundle = self.bundle.as_ref().ok_or(PipelineError::UnfitPipeline)?;
        let features = self.transform(frame)?.to_matrix(&bundle.selected_features)?;
        self.estimator.predict(&features)
    }

    /// Score a labeled frame and return a two-column results table with
    /// row order preserved: predictions under the estimator name, labels
    /// under `target`.
    pub fn evaluate(&self, frame: &Frame, labels: &Array1<f64>) -> Result<Frame, PipelineError> {
        if labels.len() != frame.n_rows() {
            return Err(PipelineError::Validation(format!(
                "label vector has {} entries, frame has {} rows",
                labels.len(),
                frame.n_rows()
            )));
        }
        let predictions = self.predict(frame)?;
        info!("evaluated {} rows", predictions.len());

        let mut results = Frame::new();
        results.insert(
            self.estimator.name(),
            Column::Numeric(predictions.iter().map(|&p| Some(p)).collect()),
        )?;
        results.insert(
            "target",
            Column::Numeric(labels.iter().map(|&y| Some(y)).collect()),
        )?;
        Ok(results)
    }
}

/// Mode of an observed boolean column; ties and all-missing columns
/// resolve to `false`
fn bool_mode(values: &[Option<bool>]) -> bool {
    let trues = values.iter().flatten().filter(|&&v| v).count();
    let falses = values.iter().flatten().filter(|&&v| !v).count();
    trues > falses
}

/// Fill missing boolean cells with each column's mode and record the modes
fn fill_bools_fit(frame: &Frame) -> Result<(Frame, BTreeMap<String, bool>), PipelineError> {
    let mut modes = BTreeMap::new();
    let mut out = frame.clone();
    for name in frame.bool_column_names() {
        let values = frame.bools(&name)?;
        let mode = bool_mode(values);
        let filled: Vec<Option<bool>> =
            values.iter().map(|v| Some(v.unwrap_or(mode))).collect();
        out.insert(&name, Column::Bool(filled))?;
        modes.insert(name, mode);
    }
    Ok((out, modes))
}

/// Fill missing boolean cells with the modes recorded at fit time
fn fill_bools_apply(
    frame: &Frame,
    modes: &BTreeMap<String, bool>,
) -> Result<Frame, PipelineError> {
    let mut out = frame.clone();
    for (name, &mode) in modes {
        let values = frame.bools(name)?;
        let filled: Vec<Option<bool>> =
            values.iter().map(|v| Some(v.unwrap_or(mode))).collect();
        out.insert(name, Column::Bool(filled))?;
    }
    Ok(out)
}
