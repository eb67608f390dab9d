use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::frame::{Column, Frame};
use crate::utils::PipelineError;

/// Allowed value range for one clinical feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Deserialize)]
struct RangeEntry {
    feature: String,
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct RangesFile {
    #[serde(rename = "human ranges")]
    human_ranges: Vec<RangeEntry>,
}

/// Clinically plausible value ranges, keyed by feature name.
///
/// Values outside a feature's range are measurement artifacts and are
/// masked to missing before imputation.
#[derive(Debug, Clone, Default)]
pub struct FeatureRanges {
    ranges: BTreeMap<String, RangeSpec>,
}

impl FeatureRanges {
    /// Parse the ranges document from its JSON form
    pub fn from_json_str(json_data: &str) -> crate::Result<Self> {
        let file: RangesFile = serde_json::from_str(json_data)?;
        let mut ranges = BTreeMap::new();
        for entry in file.human_ranges {
            ranges.insert(entry.feature, RangeSpec { min: entry.min, max: entry.max });
        }
        Ok(Self { ranges })
    }

    /// Look up the range for a feature
    pub fn get(&self, name: &str) -> Option<RangeSpec> {
        self.ranges.get(name).copied()
    }

    /// Replace out-of-range numeric values with missing.
    ///
    /// Columns without a configured range are left untouched and returned
    /// in the second tuple element; they are reported, not treated as an
    /// error.
    pub fn mask(&self, frame: &Frame) -> Result<(Frame, Vec<String>), PipelineError> {
        let mut out = frame.clone();
        let mut unmatched = Vec::new();
        let mut masked = 0usize;

        for name in frame.column_names().to_vec() {
            let spec = match self.ranges.get(&name) {
                Some(spec) => *spec,
                None => {
                    unmatched.push(name.clone());
                    continue;
                }
            };
            // A range configured for a non-numeric column is a
            // misconfiguration; surface it rather than skipping silently
            let cells = out.numeric(&name)?;
            let replaced: Vec<Option<f64>> = cells
                .iter()
                .map(|c| match c {
                    Some(x) if *x < spec.min || *x > spec.max => {
                        masked += 1;
                        None
                    }
                    other => *other,
                })
                .collect();
            out.insert(&name, Column::Numeric(replaced))?;
        }

        if !unmatched.is_empty() {
            warn!(
                "no clinical ranges configured for columns {:?}; left untouched",
                unmatched
            );
        }
        info!("masked {} out-of-range values", masked);

        Ok((out, unmatched))
    }
}
