//! Progress reporting and cancellation for the cleaning pipeline.
//!
//! Progress is optional: attach a [`ProgressReporter`] to observe stage
//! transitions, or ignore it for a silent run. Cancellation is a shared
//! atomic flag checked at stage boundaries.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stages of the cleaning pipeline, in execution order.
///
/// `Redacting` is skipped unless redaction is enabled. `Done`,
/// `Cancelled`, and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Reading and aligning input files
    Loading,
    /// Outlier handling and imputation
    Cleaning,
    /// Rescaling numeric columns
    Normalizing,
    /// Masking PII in text columns
    Redacting,
    /// Writing the output table and report
    Writing,
    /// Run finished successfully
    Done,
    /// Run was cancelled
    Cancelled,
    /// Run failed
    Failed,
}

impl PipelineStage {
    /// Human-readable name for terminal output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Inputs",
            Self::Cleaning => "Cleaning Data",
            Self::Normalizing => "Normalizing Columns",
            Self::Redacting => "Redacting PII",
            Self::Writing => "Writing Output",
            Self::Done => "Done",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Typical share of the run spent in this stage (0.0 - 1.0).
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.15,
            Self::Cleaning => 0.40,
            Self::Normalizing => 0.15,
            Self::Redacting => 0.20,
            Self::Writing => 0.10,
            Self::Done | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Loading => 0.0,
            Self::Cleaning => 0.15,
            Self::Normalizing => 0.55,
            Self::Redacting => 0.70,
            Self::Writing => 0.90,
            Self::Done => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// A progress event emitted at stage boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage
    pub stage: PipelineStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,
}

impl ProgressUpdate {
    /// Progress update at the start of a stage.
    pub fn new(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.base_progress().clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Successful completion.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Done,
            progress: 1.0,
            message: message.into(),
        }
    }

    /// The run was cancelled.
    pub fn cancelled() -> Self {
        Self {
            stage: PipelineStage::Cancelled,
            progress: 0.0,
            message: "Pipeline cancelled".to_string(),
        }
    }

    /// The run failed in the named stage.
    pub fn failed(failed_in: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Failed,
            progress: failed_in.base_progress(),
            message: message.into(),
        }
    }
}

/// Trait for receiving progress updates during a run.
///
/// Implementations must be `Send + Sync` so a reporter can live on a
/// different thread from the pipeline.
pub trait ProgressReporter: Send + Sync {
    /// Called at each stage boundary. Should be cheap and non-blocking.
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running pipeline.
///
/// Clones share the same flag, so any clone can cancel a run started
/// with another. The pipeline checks the token at stage boundaries and
/// returns [`PipelineError::Cancelled`](crate::error::PipelineError::Cancelled)
/// without writing any output.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Thread-safe.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested on this token or a clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
