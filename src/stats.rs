use crate::frame::Frame;

/// Summary statistics computed from one numeric column
#[derive(Debug, Clone)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnSummary {
    /// Compute summary statistics over the non-missing values of a numeric
    /// column. Returns None for absent, non-numeric or all-missing columns.
    pub fn compute(frame: &Frame, column: &str) -> Option<Self> {
        let values = frame.observed_numeric(column).ok()?;
        if values.is_empty() {
            return None;
        }

        let (mean, std) = mean_std(&values);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(ColumnSummary {
            column: column.to_string(),
            count: values.len(),
            mean,
            std,
            min,
            max,
        })
    }
}

/// Mean and sample standard deviation (ddof = 1) of a value slice.
///
/// Fewer than two values yield a standard deviation of 0.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    fn create_test_frame() -> Frame {
        let mut frame = Frame::new();
        frame
            .insert(
                "value",
                Column::Numeric(vec![Some(10.0), Some(20.0), Some(30.0), None, Some(40.0)]),
            )
            .unwrap();
        frame
    }

    #[test]
    fn test_summary_skips_missing() {
        let frame = create_test_frame();
        let summary = ColumnSummary::compute(&frame, "value").unwrap();

        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, 25.0);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 40.0);
    }

    #[test]
    fn test_summary_absent_column() {
        let frame = create_test_frame();
        assert!(ColumnSummary::compute(&frame, "other").is_none());
    }

    #[test]
    fn test_mean_std_sample_variance() {
        let (mean, std) = mean_std(&[2.0, 4.0, 6.0]);
        assert_eq!(mean, 4.0);
        // sample variance: ((2-4)^2 + 0 + (6-4)^2) / 2 = 4
        assert!((std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_std_degenerate() {
        assert_eq!(mean_std(&[]), (0.0, 0.0));
        assert_eq!(mean_std(&[5.0]), (5.0, 0.0));
    }
}
