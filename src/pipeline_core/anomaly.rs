//! Anomaly-score ensemble: unsupervised and semi-supervised detectors used
//! as feature generators.
//!
//! Five candidate methods live in a closed, ordered table. Each enabled
//! method independently standardizes its own view of the input (when the
//! data is not already standardized), fits its detector on the full
//! training set or on the negative-label subset, scores every training row
//! and appends one derived column. Apply replays the stored detectors and
//! standardization snapshots; nothing is refit from unseen data.

use log::{debug, info};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

use crate::frame::{Column, Frame};
use crate::pipeline_core::boundary::BoundaryDetector;
use crate::pipeline_core::iforest::ForestDetector;
use crate::pipeline_core::lof::{LofDetector, DEFAULT_NEIGHBORS};
use crate::utils::standardize::{
    fit_standardization, is_standardized, standardize_with, StandardizationParams,
};
use crate::utils::PipelineError;

/// Size of the closed method table
pub const METHOD_COUNT: usize = 5;

/// The closed, ordered set of ensemble methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyMethod {
    /// Local-outlier score trained on all rows
    LofAll,
    /// Local-outlier score trained on negative-label rows only
    LofMajority,
    /// One-class boundary score trained on all rows
    BoundaryAll,
    /// One-class boundary score trained on negative-label rows only
    BoundaryMajority,
    /// Isolation-based ensemble score trained on all rows
    IsolationForest,
}

impl AnomalyMethod {
    /// Methods in selector order
    pub const TABLE: [AnomalyMethod; METHOD_COUNT] = [
        AnomalyMethod::LofAll,
        AnomalyMethod::LofMajority,
        AnomalyMethod::BoundaryAll,
        AnomalyMethod::BoundaryMajority,
        AnomalyMethod::IsolationForest,
    ];

    /// Key of the fitted detector handle in the bundle
    pub fn handle_key(self) -> &'static str {
        match self {
            AnomalyMethod::LofAll => "lof_all",
            AnomalyMethod::LofMajority => "lof_majority",
            AnomalyMethod::BoundaryAll => "ocsvm_all",
            AnomalyMethod::BoundaryMajority => "ocsvm_majority",
            AnomalyMethod::IsolationForest => "if_anomaly",
        }
    }

    /// Name of the generated score column
    pub fn column_name(self) -> &'static str {
        match self {
            AnomalyMethod::LofAll => "lof_score_all",
            AnomalyMethod::LofMajority => "lof_score_majority",
            AnomalyMethod::BoundaryAll => "ocsvm_score_all",
            AnomalyMethod::BoundaryMajority => "ocsvm_score_majority",
            AnomalyMethod::IsolationForest => "if_anomaly_score",
        }
    }

    /// Whether the detector trains on the negative-label subset only
    pub fn trains_on_majority(self) -> bool {
        matches!(self, AnomalyMethod::LofMajority | AnomalyMethod::BoundaryMajority)
    }

    /// Whether the detector requires standardized input
    pub fn requires_standardized_input(self) -> bool {
        !matches!(self, AnomalyMethod::IsolationForest)
    }
}

/// Which ensemble methods are enabled, indexed by the method table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSelector {
    enabled: [bool; METHOD_COUNT],
}

impl MethodSelector {
    /// Build a selector from a positional boolean vector.
    ///
    /// The vector length must be exactly the method-table size.
    pub fn from_bits(bits: &[bool]) -> Result<Self, PipelineError> {
        if bits.len() != METHOD_COUNT {
            return Err(PipelineError::Validation(format!(
                "the expected length of the anomaly method selector is {}, got {}",
                METHOD_COUNT,
                bits.len()
            )));
        }
        let mut enabled = [false; METHOD_COUNT];
        enabled.copy_from_slice(bits);
        Ok(Self { enabled })
    }

    /// The enabled methods, in table order
    pub fn enabled_methods(&self) -> Vec<AnomalyMethod> {
        AnomalyMethod::TABLE
            .iter()
            .enumerate()
            .filter(|(i, _)| self.enabled[*i])
            .map(|(_, m)| *m)
            .collect()
    }
}

/// An opaque fitted detector
pub enum Detector {
    Lof(LofDetector),
    Boundary(BoundaryDetector),
    Forest(ForestDetector),
}

impl Detector {
    fn score(&self, features: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        match self {
            Detector::Lof(d) => d.score(features),
            Detector::Boundary(d) => d.score(features),
            Detector::Forest(d) => d.score(features),
        }
    }
}

/// A fitted detector plus the standardization snapshot used to train it.
///
/// `input_standardization == None` means the input was already standardized
/// at fit time and apply must not re-standardize.
pub struct DetectorHandle {
    pub detector: Detector,
    pub input_standardization: Option<StandardizationParams>,
    pub n_training_rows: usize,
}

/// All state the ensemble learned during one fit call
#[derive(Default)]
pub struct AnomalyBundle {
    /// Detector input columns snapshotted at fit time; apply always builds
    /// its matrices from this list, never from the unseen frame's layout
    pub input_columns: Vec<String>,
    /// Fitted detectors keyed by method handle key
    pub handles: BTreeMap<String, DetectorHandle>,
    /// Group standardization of the generated columns, when requested
    pub output_params: Option<StandardizationParams>,
    /// Generated column names, in method-table order
    pub generated_columns: Vec<String>,
}

/// Fit every enabled method on the training frame and append one score
/// column per method.
///
/// The negative-label subset is computed once and shared by the majority
/// methods; detectors fit on the subset still score every training row.
/// Returns the augmented frame and the learned bundle.
pub fn fit(
    frame: &Frame,
    labels: &Array1<f64>,
    numeric_columns: &[String],
    selector: &MethodSelector,
    standardize_output: bool,
) -> Result<(Frame, AnomalyBundle), PipelineError> {
    if labels.len() != frame.n_rows() {
        return Err(PipelineError::Validation(format!(
            "label vector has {} entries, frame has {} rows",
            labels.len(),
            frame.n_rows()
        )));
    }

    let enabled = selector.enabled_methods();
    // Snapshot the input columns before any score column is appended so
    // every method sees the same input regardless of table position
    let input_columns = frame.column_names().to_vec();
    let mut bundle = AnomalyBundle {
        input_columns: input_columns.clone(),
        ..AnomalyBundle::default()
    };

    let majority_mask: Option<Vec<bool>> =
        if enabled.iter().any(|m| m.trains_on_majority()) {
            let mask: Vec<bool> = labels.iter().map(|&y| y == 0.0).collect();
            if !mask.iter().any(|&m| m) {
                return Err(PipelineError::Validation(
                    "majority-only training requires at least one negative-label row"
                        .to_string(),
                ));
            }
            Some(mask)
        } else {
            None
        };

    let mut scores: Vec<(String, Vec<f64>)> = Vec::with_capacity(enabled.len());

    for method in &enabled {
        // Each method standardizes its own view; the input frame is never
        // touched and the skip heuristic decides whether params are recorded
        let (view, input_params) = if method.requires_standardized_input()
            && !is_standardized(frame, numeric_columns)
        {
            info!("standardizing input for {}", method.handle_key());
            let (view, params) = fit_standardization(frame, numeric_columns)?;
            (view, Some(params))
        } else {
            (frame.clone(), None)
        };

        let full = view.to_matrix(&input_columns)?;
        let train = match (&majority_mask, method.trains_on_majority()) {
            (Some(mask), true) => view.filter_rows(mask)?.to_matrix(&input_columns)?,
            _ => full.clone(),
        };
        debug!(
            "fitting {} on {} of {} rows",
            method.handle_key(),
            train.nrows(),
            full.nrows()
        );

        let detector = match method {
            AnomalyMethod::LofAll | AnomalyMethod::LofMajority => {
                Detector::Lof(LofDetector::fit(&train, DEFAULT_NEIGHBORS)?)
            }
            AnomalyMethod::BoundaryAll | AnomalyMethod::BoundaryMajority => {
                Detector::Boundary(BoundaryDetector::fit(&train)?)
            }
            AnomalyMethod::IsolationForest => Detector::Forest(ForestDetector::fit(&train)?),
        };

        // Score the full training set, never only the subset
        let column_scores = detector.score(&full)?;
        bundle.handles.insert(
            method.handle_key().to_string(),
            DetectorHandle {
                detector,
                input_standardization: input_params,
                n_training_rows: train.nrows(),
            },
        );
        scores.push((method.column_name().to_string(), column_scores));
    }

    let mut out = frame.clone();
    for (name, values) in scores {
        out.insert(&name, Column::Numeric(values.into_iter().map(Some).collect()))?;
        bundle.generated_columns.push(name);
    }

    if standardize_output {
        let (standardized, params) = fit_standardization(&out, &bundle.generated_columns)?;
        out = standardized;
        bundle.output_params = Some(params);
    }

    Ok((out, bundle))
}

/// Score an unseen frame with the stored detectors and append one column
/// per enabled method.
///
/// Recorded input-standardization snapshots are replayed exactly, and the
/// detector matrices are built from the column list frozen at fit time, so
/// the unseen frame may carry extra columns or a different column order.
/// A selector bit with no corresponding handle is a fit/apply mismatch.
pub fn apply(
    frame: &Frame,
    numeric_columns: &[String],
    selector: &MethodSelector,
    bundle: &AnomalyBundle,
    standardize_output: bool,
) -> Result<Frame, PipelineError> {
    let enabled = selector.enabled_methods();
    let mut scores: Vec<(String, Vec<f64>)> = Vec::with_capacity(enabled.len());

    for method in &enabled {
        let handle = bundle.handles.get(method.handle_key()).ok_or_else(|| {
            PipelineError::MissingHandle(format!(
                "no fitted detector for `{}`; fit and apply selectors disagree",
                method.handle_key()
            ))
        })?;

        let view = match &handle.input_standardization {
            Some(params) => standardize_with(frame, numeric_columns, params)?,
            None => frame.clone(),
        };
        let matrix = view.to_matrix(&bundle.input_columns)?;
        scores.push((method.column_name().to_string(), handle.detector.score(&matrix)?));
    }

    let mut out = frame.clone();
    let mut generated = Vec::with_capacity(scores.len());
    for (name, values) in scores {
        out.insert(&name, Column::Numeric(values.into_iter().map(Some).collect()))?;
        generated.push(name);
    }

    if standardize_output {
        let params = bundle.output_params.as_ref().ok_or_else(|| {
            PipelineError::MissingHandle(
                "no output standardization parameters were recorded at fit time".to_string(),
            )
        })?;
        out = standardize_with(&out, &generated, params)?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::mean_std;
    use ndarray::arr1;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn selector(bits: [u8; 5]) -> MethodSelector {
        let bools: Vec<bool> = bits.iter().map(|&b| b != 0).collect();
        MethodSelector::from_bits(&bools).unwrap()
    }

    /// 10 training rows, 3 numeric columns, 7 negative / 3 positive labels
    fn training_data() -> (Frame, Array1<f64>) {
        let mut frame = Frame::new();
        frame
            .insert(
                "hr",
                Column::Numeric(
                    vec![62.0, 71.0, 80.0, 66.0, 75.0, 69.0, 73.0, 110.0, 125.0, 131.0]
                        .into_iter()
                        .map(Some)
                        .collect(),
                ),
            )
            .unwrap();
        frame
            .insert(
                "temp",
                Column::Numeric(
                    vec![36.5, 36.7, 36.9, 36.4, 36.6, 37.0, 36.8, 38.9, 39.4, 39.8]
                        .into_iter()
                        .map(Some)
                        .collect(),
                ),
            )
            .unwrap();
        frame
            .insert(
                "lactate",
                Column::Numeric(
                    vec![1.0, 1.2, 0.9, 1.1, 1.3, 0.8, 1.0, 3.5, 4.2, 4.8]
                        .into_iter()
                        .map(Some)
                        .collect(),
                ),
            )
            .unwrap();
        let labels = arr1(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        (frame, labels)
    }

    #[test]
    fn test_selector_length_must_be_five() {
        let result = MethodSelector::from_bits(&[true, false, true]);
        assert!(matches!(result, Err(PipelineError::Validation(_))));

        let result = MethodSelector::from_bits(&[false; 6]);
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_majority_subset_size_and_full_scoring() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let (augmented, bundle) =
            fit(&frame, &labels, &numeric, &selector([0, 1, 0, 0, 0]), false).unwrap();

        // Fit on the 7 negative rows only
        let handle = bundle.handles.get("lof_majority").unwrap();
        assert_eq!(handle.n_training_rows, 7);

        // But scored on every training row
        let column = augmented.numeric("lof_score_majority").unwrap();
        assert_eq!(column.len(), 10);
        assert!(column.iter().all(|c| c.is_some()));
    }

    #[test]
    fn test_input_standardization_recorded_when_needed() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);

        // Raw input: LOF standardizes locally and records the snapshot
        let (_, bundle) =
            fit(&frame, &labels, &numeric, &selector([1, 0, 0, 0, 0]), false).unwrap();
        assert!(bundle.handles["lof_all"].input_standardization.is_some());

        // Pre-standardized input: the skip heuristic leaves the snapshot empty
        let (standardized, _) = fit_standardization(&frame, &numeric).unwrap();
        let (_, bundle) =
            fit(&standardized, &labels, &numeric, &selector([1, 0, 0, 0, 0]), false).unwrap();
        assert!(bundle.handles["lof_all"].input_standardization.is_none());
    }

    #[test]
    fn test_forest_skips_input_standardization() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let (_, bundle) =
            fit(&frame, &labels, &numeric, &selector([0, 0, 0, 0, 1]), false).unwrap();
        assert!(bundle.handles["if_anomaly"].input_standardization.is_none());
    }

    #[test]
    fn test_output_standardization_of_generated_columns() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let (augmented, bundle) =
            fit(&frame, &labels, &numeric, &selector([0, 1, 0, 0, 1]), true).unwrap();

        assert_eq!(
            bundle.generated_columns,
            vec!["lof_score_majority", "if_anomaly_score"]
        );
        for name in &bundle.generated_columns {
            let values = augmented.observed_numeric(name).unwrap();
            let (mean, std) = mean_std(&values);
            assert!(mean.abs() < 1e-9, "{} mean {}", name, mean);
            assert!((std - 1.0).abs() < 1e-9, "{} std {}", name, std);
        }
        assert!(bundle.output_params.is_some());
    }

    #[test]
    fn test_apply_appends_same_columns_to_unseen_rows() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let sel = selector([0, 1, 0, 0, 1]);
        let (_, bundle) = fit(&frame, &labels, &numeric, &sel, true).unwrap();

        let mut unseen = Frame::new();
        unseen
            .insert(
                "hr",
                Column::Numeric(vec![Some(70.0), Some(72.0), Some(68.0), Some(140.0), Some(65.0)]),
            )
            .unwrap();
        unseen
            .insert(
                "temp",
                Column::Numeric(vec![Some(36.6), Some(36.8), Some(36.5), Some(40.1), Some(36.7)]),
            )
            .unwrap();
        unseen
            .insert(
                "lactate",
                Column::Numeric(vec![Some(1.1), Some(1.0), Some(1.2), Some(5.5), Some(0.9)]),
            )
            .unwrap();

        let scored = apply(&unseen, &numeric, &sel, &bundle, true).unwrap();
        assert_eq!(scored.n_rows(), 5);
        assert!(scored.column("lof_score_majority").is_some());
        assert!(scored.column("if_anomaly_score").is_some());
    }

    #[test]
    fn test_apply_accepts_extra_unseen_columns() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let sel = selector([1, 0, 0, 0, 0]);
        let (_, bundle) = fit(&frame, &labels, &numeric, &sel, false).unwrap();

        // Columns the fit never saw must be ignored, not a schema error
        let mut wider = frame.clone();
        wider
            .insert("ward_id", Column::Numeric(vec![Some(3.0); 10]))
            .unwrap();
        let scored = apply(&wider, &numeric, &sel, &bundle, false).unwrap();
        let baseline = apply(&frame, &numeric, &sel, &bundle, false).unwrap();
        assert_eq!(
            scored.numeric("lof_score_all").unwrap(),
            baseline.numeric("lof_score_all").unwrap()
        );
    }

    #[test]
    fn test_apply_is_insertion_order_independent() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let sel = selector([1, 0, 0, 0, 0]);
        let (_, bundle) = fit(&frame, &labels, &numeric, &sel, false).unwrap();

        // Same data, columns inserted in reverse order
        let mut reordered = Frame::new();
        for name in ["lactate", "temp", "hr"] {
            reordered
                .insert(name, frame.column(name).unwrap().clone())
                .unwrap();
        }

        let baseline = apply(&frame, &numeric, &sel, &bundle, false).unwrap();
        let scored = apply(&reordered, &numeric, &sel, &bundle, false).unwrap();
        assert_eq!(
            scored.numeric("lof_score_all").unwrap(),
            baseline.numeric("lof_score_all").unwrap()
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let sel = selector([0, 1, 0, 0, 1]);
        let (_, bundle) = fit(&frame, &labels, &numeric, &sel, true).unwrap();

        let first = apply(&frame, &numeric, &sel, &bundle, true).unwrap();
        let second = apply(&frame, &numeric, &sel, &bundle, true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_apply_never_mutates_the_input_frame() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let sel = selector([1, 0, 0, 0, 0]);
        let (_, bundle) = fit(&frame, &labels, &numeric, &sel, false).unwrap();

        let before = frame.clone();
        let _ = apply(&frame, &numeric, &sel, &bundle, false).unwrap();
        assert_eq!(frame, before);
    }

    #[test]
    fn test_selector_mismatch_raises_missing_handle() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let (_, bundle) =
            fit(&frame, &labels, &numeric, &selector([1, 0, 0, 0, 0]), false).unwrap();

        let result = apply(&frame, &numeric, &selector([1, 1, 0, 0, 0]), &bundle, false);
        assert!(matches!(result, Err(PipelineError::MissingHandle(_))));
    }

    #[test]
    fn test_majority_without_negatives_is_error() {
        let (frame, _) = training_data();
        let labels = arr1(&[1.0; 10]);
        let numeric = cols(&["hr", "temp", "lactate"]);
        let result = fit(&frame, &labels, &numeric, &selector([0, 0, 0, 1, 0]), false);
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_boundary_methods_fit_and_score() {
        let (frame, labels) = training_data();
        let numeric = cols(&["hr", "temp", "lactate"]);
        let (augmented, bundle) =
            fit(&frame, &labels, &numeric, &selector([0, 0, 1, 1, 0]), false).unwrap();

        assert_eq!(bundle.handles["ocsvm_all"].n_training_rows, 10);
        assert_eq!(bundle.handles["ocsvm_majority"].n_training_rows, 7);
        assert!(augmented.column("ocsvm_score_all").is_some());
        assert!(augmented.column("ocsvm_score_majority").is_some());
    }
}
