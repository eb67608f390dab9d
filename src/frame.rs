use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::PipelineError;

/// A single named column: numeric or boolean, with missing values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
}

impl Column {
    /// Number of rows in the column
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Bool(v) => v.len(),
        }
    }

    /// Check if the column has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of missing cells in the column
    pub fn missing_count(&self) -> usize {
        match self {
            Column::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            Column::Bool(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }
}

/// A collection of named, typed columns sharing one row count.
///
/// Columns are addressed by name, never by position. Rows represent
/// independent observations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Frame {
    order: Vec<String>,
    columns: HashMap<String, Column>,
    n_rows: usize,
}

impl Frame {
    /// Create a new empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of rows
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Get the number of columns
    pub fn n_cols(&self) -> usize {
        self.order.len()
    }

    /// Check if the frame has no columns
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert or replace a column. The first inserted column pins the row
    /// count; later columns must match it.
    pub fn insert(&mut self, name: &str, column: Column) -> Result<(), PipelineError> {
        if self.order.is_empty() {
            self.n_rows = column.len();
        } else if column.len() != self.n_rows {
            return Err(PipelineError::Validation(format!(
                "column `{}` has {} rows, frame has {}",
                name,
                column.len(),
                self.n_rows
            )));
        }
        if !self.columns.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.columns.insert(name.to_string(), column);
        Ok(())
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Get a numeric column's cells, failing on absent or non-numeric columns
    pub fn numeric(&self, name: &str) -> Result<&Vec<Option<f64>>, PipelineError> {
        match self.columns.get(name) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Bool(_)) => Err(PipelineError::Validation(format!(
                "column `{}` is boolean, expected numeric",
                name
            ))),
            None => Err(PipelineError::SchemaMismatch(format!(
                "column `{}` not found in frame",
                name
            ))),
        }
    }

    /// Get a boolean column's cells, failing on absent or non-boolean columns
    pub fn bools(&self, name: &str) -> Result<&Vec<Option<bool>>, PipelineError> {
        match self.columns.get(name) {
            Some(Column::Bool(v)) => Ok(v),
            Some(Column::Numeric(_)) => Err(PipelineError::Validation(format!(
                "column `{}` is numeric, expected boolean",
                name
            ))),
            None => Err(PipelineError::SchemaMismatch(format!(
                "column `{}` not found in frame",
                name
            ))),
        }
    }

    /// Column names in insertion order
    pub fn column_names(&self) -> &[String] {
        &self.order
    }

    /// Names of all boolean columns, in frame order
    pub fn bool_column_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|n| matches!(self.columns.get(*n), Some(Column::Bool(_))))
            .cloned()
            .collect()
    }

    /// Names of all numeric columns, in frame order
    pub fn numeric_column_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|n| matches!(self.columns.get(*n), Some(Column::Numeric(_))))
            .cloned()
            .collect()
    }

    /// Non-missing values of a numeric column
    pub fn observed_numeric(&self, name: &str) -> Result<Vec<f64>, PipelineError> {
        Ok(self.numeric(name)?.iter().flatten().copied().collect())
    }

    /// Restrict the frame to the given columns, preserving the given order
    pub fn select(&self, names: &[String]) -> Result<Frame, PipelineError> {
        let mut out = Frame::new();
        for name in names {
            let column = self.columns.get(name).ok_or_else(|| {
                PipelineError::SchemaMismatch(format!("column `{}` not found in frame", name))
            })?;
            out.insert(name, column.clone())?;
        }
        // A frame with zero selected columns still carries the row count
        if names.is_empty() {
            out.n_rows = self.n_rows;
        }
        Ok(out)
    }

    /// Keep only the rows where the mask is true
    pub fn filter_rows(&self, mask: &[bool]) -> Result<Frame, PipelineError> {
        if mask.len() != self.n_rows {
            return Err(PipelineError::Validation(format!(
                "row mask has {} entries, frame has {} rows",
                mask.len(),
                self.n_rows
            )));
        }
        let mut out = Frame::new();
        for name in &self.order {
            let filtered = match &self.columns[name] {
                Column::Numeric(v) => Column::Numeric(
                    v.iter().zip(mask).filter(|(_, &m)| m).map(|(c, _)| *c).collect(),
                ),
                Column::Bool(v) => Column::Bool(
                    v.iter().zip(mask).filter(|(_, &m)| m).map(|(c, _)| *c).collect(),
                ),
            };
            out.insert(name, filtered)?;
        }
        if self.order.is_empty() {
            out.n_rows = mask.iter().filter(|&&m| m).count();
        }
        Ok(out)
    }

    /// Convert the given columns to a dense matrix (rows = observations).
    ///
    /// Boolean cells map to 0.0/1.0. Any remaining missing cell is an error;
    /// callers must impute first.
    pub fn to_matrix(&self, names: &[String]) -> Result<Array2<f64>, PipelineError> {
        let mut data = Vec::with_capacity(self.n_rows * names.len());
        for row in 0..self.n_rows {
            for name in names {
                let value = match self.columns.get(name) {
                    Some(Column::Numeric(v)) => v[row],
                    Some(Column::Bool(v)) => v[row].map(|b| if b { 1.0 } else { 0.0 }),
                    None => {
                        return Err(PipelineError::SchemaMismatch(format!(
                            "column `{}` not found in frame",
                            name
                        )))
                    }
                };
                match value {
                    Some(x) => data.push(x),
                    None => {
                        return Err(PipelineError::Validation(format!(
                            "column `{}` still has missing values at row {}",
                            name, row
                        )))
                    }
                }
            }
        }
        Array2::from_shape_vec((self.n_rows, names.len()), data).map_err(|e| {
            PipelineError::Validation(format!("failed to shape matrix: {}", e))
        })
    }

    /// Load a frame from CSV. Empty cells, `nan` and `null` become missing;
    /// columns whose non-missing values are all `true`/`false` become
    /// boolean, everything else must parse as numeric.
    pub fn from_csv(csv_data: &str) -> crate::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv_data.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

        for result in reader.records() {
            let record = result?;
            for (i, field) in record.iter().enumerate() {
                let cell = match field.trim() {
                    "" => None,
                    t if t.eq_ignore_ascii_case("nan") || t.eq_ignore_ascii_case("null") => None,
                    t => Some(t.to_string()),
                };
                raw[i].push(cell);
            }
        }

        let mut frame = Frame::new();
        for (header, cells) in headers.iter().zip(raw) {
            let is_bool = cells.iter().flatten().count() > 0
                && cells.iter().flatten().all(|c| {
                    c.eq_ignore_ascii_case("true") || c.eq_ignore_ascii_case("false")
                });
            let column = if is_bool {
                Column::Bool(
                    cells
                        .iter()
                        .map(|c| c.as_ref().map(|v| v.eq_ignore_ascii_case("true")))
                        .collect(),
                )
            } else {
                let mut values = Vec::with_capacity(cells.len());
                for cell in &cells {
                    match cell {
                        None => values.push(None),
                        Some(v) => values.push(Some(v.parse::<f64>().map_err(|_| {
                            anyhow::anyhow!("column `{}` has non-numeric value `{}`", header, v)
                        })?)),
                    }
                }
                Column::Numeric(values)
            };
            frame.insert(header, column)?;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        let mut frame = Frame::new();
        frame
            .insert("hr", Column::Numeric(vec![Some(60.0), Some(75.0), None]))
            .unwrap();
        frame
            .insert("diabetic", Column::Bool(vec![Some(true), None, Some(false)]))
            .unwrap();
        frame
    }

    #[test]
    fn test_insert_and_lookup() {
        let frame = sample_frame();
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.n_cols(), 2);
        assert_eq!(frame.numeric("hr").unwrap()[0], Some(60.0));
        assert_eq!(frame.bools("diabetic").unwrap()[2], Some(false));
    }

    #[test]
    fn test_insert_row_count_mismatch() {
        let mut frame = sample_frame();
        let result = frame.insert("bad", Column::Numeric(vec![Some(1.0)]));
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_column_type_partition() {
        let frame = sample_frame();
        assert_eq!(frame.numeric_column_names(), vec!["hr"]);
        assert_eq!(frame.bool_column_names(), vec!["diabetic"]);
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let frame = sample_frame();
        assert!(matches!(
            frame.numeric("spo2"),
            Err(PipelineError::SchemaMismatch(_))
        ));
        assert!(matches!(
            frame.select(&["spo2".to_string()]),
            Err(PipelineError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_select_preserves_requested_order() {
        let frame = sample_frame();
        let selected = frame
            .select(&["diabetic".to_string(), "hr".to_string()])
            .unwrap();
        assert_eq!(selected.column_names(), ["diabetic", "hr"]);
        assert_eq!(selected.n_rows(), 3);
    }

    #[test]
    fn test_filter_rows() {
        let frame = sample_frame();
        let filtered = frame.filter_rows(&[true, false, true]).unwrap();
        assert_eq!(filtered.n_rows(), 2);
        assert_eq!(filtered.numeric("hr").unwrap(), &vec![Some(60.0), None]);
    }

    #[test]
    fn test_to_matrix_rejects_missing() {
        let frame = sample_frame();
        let result = frame.to_matrix(&["hr".to_string()]);
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_to_matrix_bool_as_01() {
        let mut frame = Frame::new();
        frame
            .insert("flag", Column::Bool(vec![Some(true), Some(false)]))
            .unwrap();
        frame
            .insert("x", Column::Numeric(vec![Some(2.0), Some(4.0)]))
            .unwrap();
        let m = frame
            .to_matrix(&["flag".to_string(), "x".to_string()])
            .unwrap();
        assert_eq!(m[[0, 0]], 1.0);
        assert_eq!(m[[1, 0]], 0.0);
        assert_eq!(m[[1, 1]], 4.0);
    }

    #[test]
    fn test_csv_loading() {
        let csv_data = "hr,temp,diabetic\n60,36.5,true\n75,,false\n,37.2,";
        let frame = Frame::from_csv(csv_data).unwrap();

        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.numeric("hr").unwrap(), &vec![Some(60.0), Some(75.0), None]);
        assert_eq!(frame.numeric("temp").unwrap()[1], None);
        assert_eq!(
            frame.bools("diabetic").unwrap(),
            &vec![Some(true), Some(false), None]
        );
    }

    #[test]
    fn test_csv_rejects_garbage() {
        let csv_data = "x\n1.0\nhello";
        assert!(Frame::from_csv(csv_data).is_err());
    }
}
