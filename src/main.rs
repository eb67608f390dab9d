use clap::{Parser, Subcommand};
use clinical_risk_engine::stats::ColumnSummary;
use clinical_risk_engine::utils::FeatureRanges;
use clinical_risk_engine::{
    Column, Estimator, Frame, LinearEstimator, LogisticEstimator, ModelPipeline, PipelineConfig,
    SelectionMetric,
};
use ndarray::Array1;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clinical-risk-engine")]
#[command(author = "Hummer Team")]
#[command(version = "0.1.0")]
#[command(about = "A leakage-safe fit/apply modeling pipeline for clinical tabular data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the pipeline on a training CSV and evaluate it on a test CSV
    FitEval {
        /// Path to the training CSV file
        #[arg(long)]
        train: PathBuf,

        /// Path to the test CSV file
        #[arg(long)]
        test: PathBuf,

        /// Name of the label column
        #[arg(short, long, default_value = "target")]
        label: String,

        /// Feature ranking metric: correlation, importance or none
        #[arg(short, long, default_value = "importance")]
        metric: String,

        /// Maximum number of selected features
        #[arg(short = 'k', long, default_value_t = 100)]
        n_features: usize,

        /// Standardize numeric inputs and generated score columns
        #[arg(short, long)]
        standardize: bool,

        /// Anomaly method toggles as a 5-character bitstring, e.g. 01001
        #[arg(short, long, default_value = "00000")]
        anomaly: String,

        /// Leaf estimator: linear or logistic
        #[arg(long, default_value = "linear")]
        model: String,

        /// Optional JSON file of plausible per-feature value ranges
        #[arg(short, long)]
        ranges: Option<PathBuf>,
    },

    /// Load a CSV file and summarize one of its columns
    Inspect {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Column to summarize (optional)
        #[arg(short = 'a', long)]
        analyze: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::FitEval {
            train,
            test,
            label,
            metric,
            n_features,
            standardize,
            anomaly,
            model,
            ranges,
        } => {
            let mut train_frame = Frame::from_csv(&fs::read_to_string(&train)?)?;
            let mut test_frame = Frame::from_csv(&fs::read_to_string(&test)?)?;
            println!(
                "Loaded {} training rows and {} test rows ({} columns)",
                train_frame.n_rows(),
                test_frame.n_rows(),
                train_frame.n_cols()
            );

            if let Some(path) = ranges {
                let ranges = FeatureRanges::from_json_str(&fs::read_to_string(&path)?)?;
                let (masked, unmatched) = ranges.mask(&train_frame)?;
                train_frame = masked;
                let (masked, _) = ranges.mask(&test_frame)?;
                test_frame = masked;
                if !unmatched.is_empty() {
                    println!("Ranges without a matching column: {:?}", unmatched);
                }
            }

            let (train_frame, train_labels) = split_label(&train_frame, &label)?;
            let (test_frame, test_labels) = split_label(&test_frame, &label)?;

            let config = PipelineConfig {
                selection_metric: metric.parse()?,
                n_features,
                standardization: standardize,
                anomaly_selector: parse_selector(&anomaly)?,
            };
            let mut pipeline = ModelPipeline::new(config, make_estimator(&model)?);

            pipeline.fit(&train_frame, &train_labels)?;
            let bundle = pipeline
                .bundle()
                .ok_or_else(|| anyhow::anyhow!("fit produced no parameter bundle"))?;
            println!(
                "Fitted pipeline: {} selected features, {} anomaly detectors",
                bundle.selected_features.len(),
                bundle.anomaly.handles.len()
            );

            let results = pipeline.evaluate(&test_frame, &test_labels)?;
            print_results(&results, &model)?;
        }

        Commands::Inspect { file, analyze } => {
            let frame = Frame::from_csv(&fs::read_to_string(&file)?)?;
            println!(
                "Loaded dataset with {} rows and {} columns",
                frame.n_rows(),
                frame.n_cols()
            );
            println!("Columns: {:?}", frame.column_names());

            if let Some(column) = analyze {
                if let Some(summary) = ColumnSummary::compute(&frame, &column) {
                    print_summary(&summary);
                } else {
                    println!("Could not summarize column '{}'", column);
                }
            }
        }
    }

    Ok(())
}

/// Pull the label column out of the frame, leaving the feature columns
fn split_label(frame: &Frame, label: &str) -> anyhow::Result<(Frame, Array1<f64>)> {
    let labels: Vec<f64> = match frame.column(label) {
        Some(Column::Numeric(values)) => values
            .iter()
            .map(|v| v.ok_or_else(|| anyhow::anyhow!("label column '{}' has missing values", label)))
            .collect::<anyhow::Result<_>>()?,
        Some(Column::Bool(values)) => values
            .iter()
            .map(|v| {
                v.map(|b| if b { 1.0 } else { 0.0 })
                    .ok_or_else(|| anyhow::anyhow!("label column '{}' has missing values", label))
            })
            .collect::<anyhow::Result<_>>()?,
        None => anyhow::bail!("label column '{}' not found", label),
    };

    let features: Vec<String> = frame
        .column_names()
        .iter()
        .filter(|name| name.as_str() != label)
        .cloned()
        .collect();
    Ok((frame.select(&features)?, Array1::from(labels)))
}

/// Parse a positional bitstring such as `01001` into method toggles
fn parse_selector(bits: &str) -> anyhow::Result<Vec<bool>> {
    bits.chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            other => anyhow::bail!("invalid selector character '{}', expected 0 or 1", other),
        })
        .collect()
}

fn make_estimator(model: &str) -> anyhow::Result<Box<dyn Estimator>> {
    match model {
        "linear" => Ok(Box::new(LinearEstimator::new())),
        "logistic" => Ok(Box::new(LogisticEstimator::new())),
        other => anyhow::bail!("unknown model '{}', expected linear or logistic", other),
    }
}

fn print_results(results: &Frame, model: &str) -> anyhow::Result<()> {
    let predictions = results.observed_numeric(model)?;
    let targets = results.observed_numeric("target")?;

    println!("\n=== Evaluation ({} rows) ===", results.n_rows());
    for (p, t) in predictions.iter().zip(&targets).take(20) {
        println!("predicted {:8.4}  target {:6.2}", p, t);
    }
    if results.n_rows() > 20 {
        println!("... {} more rows", results.n_rows() - 20);
    }

    let mse = predictions
        .iter()
        .zip(&targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / predictions.len().max(1) as f64;
    println!("Mean squared error: {:.6}", mse);
    Ok(())
}

fn print_summary(summary: &ColumnSummary) {
    println!("\n=== Summary for '{}' ===", summary.column);
    println!("Count: {}", summary.count);
    println!("Mean:  {:.2}", summary.mean);
    println!("Std:   {:.2}", summary.std);
    println!("Min:   {:.2}", summary.min);
    println!("Max:   {:.2}", summary.max);
}
