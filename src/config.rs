//! Configuration types for the cleaning pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to do with values flagged as outliers by the IQR rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutlierPolicy {
    /// Replace the outlying value with a missing marker (imputed later)
    #[default]
    Null,
    /// Remove the whole row containing the outlier
    Remove,
    /// Keep outliers as-is (no handling)
    Keep,
}

/// Strategy for imputing missing numeric values.
///
/// One strategy applies uniformly to all numeric columns in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ImputationStrategy {
    /// Use the mean of non-null values
    Mean,
    /// Use the median of non-null values
    #[default]
    Median,
    /// Deterministic k-nearest-neighbour fill over the other numeric columns
    Model,
}

/// How numeric columns are rescaled after imputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NormalizeMode {
    /// Zero mean, unit variance
    #[default]
    ZScore,
    /// Rescale into [0, 1]
    MinMax,
    /// Leave columns unscaled
    None,
}

/// Configuration for the cleaning pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with a fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use sensor_scrub::config::{ImputationStrategy, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .imputation(ImputationStrategy::Mean)
///     .outlier_multiplier(3.0)
///     .redact(true)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Column used to align rows when multiple input files are given.
    /// Default: "id"
    pub join_key: String,

    /// What to do with detected outliers.
    /// Default: Null
    pub outlier_policy: OutlierPolicy,

    /// IQR fence multiplier `k`: values outside `[Q1 - k*IQR, Q3 + k*IQR]`
    /// are outliers. Default: 1.5
    pub outlier_multiplier: f64,

    /// Missing-value imputation strategy, uniform across numeric columns.
    /// Default: Median
    pub imputation: ImputationStrategy,

    /// Number of neighbours for the model-based imputation strategy.
    /// Default: 5
    pub model_neighbors: usize,

    /// Rescaling mode applied after imputation.
    /// Default: ZScore
    pub normalize: NormalizeMode,

    /// Whether the PII redaction stage runs.
    /// Default: false
    pub redact: bool,

    /// Minimum confidence for a PII finding to be masked (0.0 - 1.0).
    /// Default: 0.6
    pub confidence_threshold: f64,

    /// Output directory for the cleaned table and run report.
    /// Default: "output"
    pub output_dir: PathBuf,

    /// Custom output file name (without extension).
    /// If None, derived from the first input file stem.
    /// Default: None
    pub output_name: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            join_key: "id".to_string(),
            outlier_policy: OutlierPolicy::default(),
            outlier_multiplier: 1.5,
            imputation: ImputationStrategy::default(),
            model_neighbors: 5,
            normalize: NormalizeMode::default(),
            redact: false,
            confidence_threshold: 0.6,
            output_dir: PathBuf::from("output"),
            output_name: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.join_key.trim().is_empty() {
            return Err(ConfigValidationError::EmptyJoinKey);
        }

        if !self.outlier_multiplier.is_finite() || self.outlier_multiplier <= 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(
                self.outlier_multiplier,
            ));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "confidence_threshold".to_string(),
                value: self.confidence_threshold,
            });
        }

        if self.model_neighbors == 0 {
            return Err(ConfigValidationError::InvalidModelNeighbors(
                self.model_neighbors,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Join key must not be empty")]
    EmptyJoinKey,

    #[error("Invalid outlier multiplier: {0} (must be a positive finite number)")]
    InvalidMultiplier(f64),

    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid model neighbours: {0} (must be at least 1)")]
    InvalidModelNeighbors(usize),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    join_key: Option<String>,
    outlier_policy: Option<OutlierPolicy>,
    outlier_multiplier: Option<f64>,
    imputation: Option<ImputationStrategy>,
    model_neighbors: Option<usize>,
    normalize: Option<NormalizeMode>,
    redact: Option<bool>,
    confidence_threshold: Option<f64>,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
}

impl PipelineConfigBuilder {
    /// Set the key column used to join multiple input files.
    pub fn join_key(mut self, key: impl Into<String>) -> Self {
        self.join_key = Some(key.into());
        self
    }

    /// Set the outlier handling policy.
    pub fn outlier_policy(mut self, policy: OutlierPolicy) -> Self {
        self.outlier_policy = Some(policy);
        self
    }

    /// Set the IQR fence multiplier.
    pub fn outlier_multiplier(mut self, multiplier: f64) -> Self {
        self.outlier_multiplier = Some(multiplier);
        self
    }

    /// Set the imputation strategy for missing numeric values.
    pub fn imputation(mut self, strategy: ImputationStrategy) -> Self {
        self.imputation = Some(strategy);
        self
    }

    /// Set the number of neighbours for model-based imputation.
    pub fn model_neighbors(mut self, k: usize) -> Self {
        self.model_neighbors = Some(k);
        self
    }

    /// Set the normalization mode.
    pub fn normalize(mut self, mode: NormalizeMode) -> Self {
        self.normalize = Some(mode);
        self
    }

    /// Enable or disable the PII redaction stage.
    pub fn redact(mut self, enable: bool) -> Self {
        self.redact = Some(enable);
        self
    }

    /// Set the minimum confidence for masking a PII finding.
    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    /// Set the output directory for the cleaned table and report.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set a custom output file name (without extension).
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            join_key: self.join_key.unwrap_or_else(|| "id".to_string()),
            outlier_policy: self.outlier_policy.unwrap_or_default(),
            outlier_multiplier: self.outlier_multiplier.unwrap_or(1.5),
            imputation: self.imputation.unwrap_or_default(),
            model_neighbors: self.model_neighbors.unwrap_or(5),
            normalize: self.normalize.unwrap_or_default(),
            redact: self.redact.unwrap_or(false),
            confidence_threshold: self.confidence_threshold.unwrap_or(0.6),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("output")),
            output_name: self.output_name,
        };

        config.validate()?;
        Ok(config)
    }
}
