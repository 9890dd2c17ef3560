//! Sensor Data Cleaning Pipeline Library
//!
//! A data-cleaning pipeline for tabular industrial sensor datasets
//! (SECOM-style CSVs) built with Rust and Polars.
//!
//! # Overview
//!
//! The pipeline runs a fixed sequence of stages over one or more CSV
//! inputs:
//!
//! - **Loading**: CSV ingest; multiple files are aligned on a shared
//!   key column with an inner join
//! - **Cleaning**: IQR outlier handling and missing-value imputation
//!   (mean, median, or deterministic k-nearest-neighbour)
//! - **Normalizing**: z-score or min-max rescaling of numeric columns
//! - **Redacting** (optional): local PII recognition with a best-effort
//!   generative-assist second opinion for ambiguous findings
//! - **Writing**: atomic CSV output plus a JSON run report
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sensor_scrub::{Pipeline, PipelineConfig, CancellationToken};
//! use std::path::PathBuf;
//!
//! let config = PipelineConfig::builder()
//!     .imputation(sensor_scrub::ImputationStrategy::Median)
//!     .redact(true)
//!     .build()?;
//!
//! let token = CancellationToken::new();
//! let report = Pipeline::builder()
//!     .config(config)
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&[PathBuf::from("secom.csv"), PathBuf::from("labels.csv")])?;
//!
//! println!("{}", report.summary());
//! ```
//!
//! # Redaction assist
//!
//! The redactor works entirely locally. When the `assist` feature is on
//! and a `GEMINI_API_KEY` is available, ambiguous findings are reviewed
//! by [`redact::GeminiAssist`] in batched requests; without a key the
//! pipeline falls back to [`redact::NoAssist`], flags the report, and
//! still succeeds. Any implementation of [`redact::RedactionAssist`]
//! can be plugged in through [`PipelineBuilder::assist`].

pub mod cleaner;
pub mod config;
pub mod error;
pub mod loader;
pub mod normalizer;
pub mod pipeline;
pub mod redact;
pub mod report;
pub mod writer;

// Re-exports for convenient access
pub use cleaner::{Cleaner, Imputer, OutlierHandler};
pub use config::{
    ConfigValidationError, ImputationStrategy, NormalizeMode, OutlierPolicy, PipelineConfig,
    PipelineConfigBuilder,
};
pub use error::{PipelineError, Result, ResultExt};
pub use loader::Loader;
pub use normalizer::Normalizer;
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage,
    ProgressReporter, ProgressUpdate,
};
pub use redact::{NoAssist, PiiAnalyzer, PiiEntity, PiiFinding, RedactionAssist, Redactor};
pub use report::RunReport;
pub use writer::Writer;

#[cfg(feature = "assist")]
pub use redact::GeminiAssist;
