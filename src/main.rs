//! CLI entry point for the sensor data cleaning pipeline.

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use sensor_scrub::{
    ImputationStrategy, NormalizeMode, OutlierPolicy, Pipeline, PipelineConfig, RedactionAssist,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[cfg(feature = "assist")]
use sensor_scrub::GeminiAssist;

/// CLI-compatible outlier policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierPolicy {
    /// Replace outliers with missing markers (imputed later)
    Null,
    /// Remove rows containing outliers
    Remove,
    /// Keep outliers as-is
    Keep,
}

impl From<CliOutlierPolicy> for OutlierPolicy {
    fn from(cli: CliOutlierPolicy) -> Self {
        match cli {
            CliOutlierPolicy::Null => OutlierPolicy::Null,
            CliOutlierPolicy::Remove => OutlierPolicy::Remove,
            CliOutlierPolicy::Keep => OutlierPolicy::Keep,
        }
    }
}

/// CLI-compatible imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliImputation {
    /// Use the mean of non-null values
    Mean,
    /// Use the median of non-null values
    Median,
    /// Deterministic k-nearest-neighbour fill
    Model,
}

impl From<CliImputation> for ImputationStrategy {
    fn from(cli: CliImputation) -> Self {
        match cli {
            CliImputation::Mean => ImputationStrategy::Mean,
            CliImputation::Median => ImputationStrategy::Median,
            CliImputation::Model => ImputationStrategy::Model,
        }
    }
}

/// CLI-compatible normalization mode enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNormalize {
    /// Zero mean, unit variance
    ZScore,
    /// Rescale into [0, 1]
    MinMax,
    /// Leave columns unscaled
    None,
}

impl From<CliNormalize> for NormalizeMode {
    fn from(cli: CliNormalize) -> Self {
        match cli {
            CliNormalize::ZScore => NormalizeMode::ZScore,
            CliNormalize::MinMax => NormalizeMode::MinMax,
            CliNormalize::None => NormalizeMode::None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Data-cleaning pipeline for tabular sensor datasets",
    long_about = "Cleans SECOM-style sensor CSVs: multi-file key join, IQR outlier\n\
                  handling, missing-value imputation, normalization, and optional\n\
                  PII redaction.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  GEMINI_API_KEY    API key for the redaction assist service (optional)\n\n\
                  EXAMPLES:\n  \
                  # Clean a single file with defaults\n  \
                  sensor-scrub -s secom.csv\n\n  \
                  # Join readings and labels, redact text columns\n  \
                  sensor-scrub -s secom.csv -s labels.csv --redact\n\n  \
                  # Mean imputation, wider outlier fence\n  \
                  sensor-scrub -s secom.csv --imputation mean --outlier-multiplier 3.0"
)]
struct Args {
    /// Input CSV file(s); repeat for multiple files joined on the key column
    #[arg(short, long = "source", required = true)]
    source: Vec<PathBuf>,

    /// Output directory for the cleaned table and run report
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Custom output file name (without extension)
    ///
    /// If not specified, derived from the first input file name
    #[arg(long)]
    output_name: Option<String>,

    /// Key column used to align rows across input files
    #[arg(long, default_value = "id")]
    join_key: String,

    /// What to do with values flagged as outliers
    #[arg(long, value_enum, default_value = "null")]
    outlier_policy: CliOutlierPolicy,

    /// IQR fence multiplier
    #[arg(long, default_value = "1.5")]
    outlier_multiplier: f64,

    /// Strategy for imputing missing numeric values
    #[arg(long, value_enum, default_value = "median")]
    imputation: CliImputation,

    /// Number of neighbours for model-based imputation
    #[arg(long, default_value = "5")]
    model_neighbors: usize,

    /// Normalization mode for numeric columns
    #[arg(long, value_enum, default_value = "z-score")]
    normalize: CliNormalize,

    /// Enable the PII redaction stage
    #[arg(long)]
    redact: bool,

    /// Minimum confidence for masking a PII finding (0.0 - 1.0)
    #[arg(long, default_value = "0.6")]
    confidence_threshold: f64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final summary)
    #[arg(short, long)]
    quiet: bool,

    /// Output the run report as JSON to stdout instead of a summary
    ///
    /// Disables all progress logs; only the final JSON is written.
    /// Useful for piping to other tools: `... --json | jq .rows_loaded`
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Build the assist capability from the environment.
///
/// A missing key is not an error: the redactor runs locally and the run
/// report flags the assist as skipped.
#[cfg(feature = "assist")]
fn build_assist() -> Option<Box<dyn RedactionAssist>> {
    match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => match GeminiAssist::new(key) {
            Ok(assist) => {
                info!("Redaction assist enabled (Gemini)");
                Some(Box::new(assist))
            }
            Err(e) => {
                warn!("Could not create assist client, continuing local-only: {}", e);
                None
            }
        },
        _ => {
            info!("GEMINI_API_KEY not set, redaction runs local-only");
            None
        }
    }
}

#[cfg(not(feature = "assist"))]
fn build_assist() -> Option<Box<dyn RedactionAssist>> {
    None
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let config = PipelineConfig::builder()
        .join_key(&args.join_key)
        .outlier_policy(args.outlier_policy.into())
        .outlier_multiplier(args.outlier_multiplier)
        .imputation(args.imputation.into())
        .model_neighbors(args.model_neighbors)
        .normalize(args.normalize.into())
        .redact(args.redact)
        .confidence_threshold(args.confidence_threshold)
        .output_dir(&args.output);

    let config = match &args.output_name {
        Some(name) => config.output_name(name),
        None => config,
    }
    .build()
    .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let assist = if args.redact { build_assist() } else { None };

    let mut builder = Pipeline::builder().config(config);
    if let Some(assist) = assist.as_deref() {
        builder = builder.assist(assist);
    }
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:>3.0}%] {}",
                update.progress * 100.0,
                update.message
            );
        });
    }

    let pipeline = builder
        .build()
        .map_err(|e| anyhow!("Failed to build pipeline: {}", e))?;

    let report = pipeline.run(&args.source).map_err(|e| {
        anyhow!(
            "Pipeline failed ({}): {}",
            e.error_code(),
            e
        )
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", report.summary());
        if let Some(path) = &report.output_path {
            println!("Output: {}", path);
        }
    }

    Ok(())
}
