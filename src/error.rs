//! Error types for the cleaning pipeline.
//!
//! The taxonomy distinguishes fatal errors (abort the run, non-zero exit)
//! from column-local and redaction errors, which are recorded in the run
//! report and surfaced as warnings.

use serde::ser::SerializeStruct;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the cleaning pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline was cancelled before the next stage boundary.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// An input path does not exist or could not be read.
    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Input files cannot be aligned (missing key column, colliding columns).
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A column has no usable values to compute statistics from.
    #[error("Column '{column}' has no usable values")]
    InsufficientData { column: String },

    /// The generative-assist service failed; local detection stands.
    #[error("Redaction service unavailable: {0}")]
    RedactionServiceUnavailable(String),

    /// Writing the output table or report failed.
    #[error("Failed to write '{}': {reason}", .path.display())]
    WriteFailure { path: PathBuf, reason: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (assist client, only with "assist" feature).
    #[cfg(feature = "assist")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for machine consumers of the run report.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::RedactionServiceUnavailable(_) => "REDACTION_SERVICE_UNAVAILABLE",
            Self::WriteFailure { .. } => "WRITE_FAILURE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "assist")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Whether this error aborts the run.
    ///
    /// `InsufficientData` and `RedactionServiceUnavailable` are recorded in
    /// the run report and the affected column/stage is passed through;
    /// everything else terminates the pipeline.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InsufficientData { .. } | Self::RedactionServiceUnavailable(_) => false,
            Self::WithContext { source, .. } => source.is_fatal(),
            _ => true,
        }
    }
}

/// Errors are serialized as `{ code, message }` so the run report stays
/// easy to consume from scripts.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
