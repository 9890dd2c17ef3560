//! Pipeline orchestration.
//!
//! Drives the stage machine `Loading -> Cleaning -> Normalizing ->
//! Redacting -> Writing -> Done`, with `Redacting` skipped unless
//! enabled. Cancellation is checked at every stage boundary; a cancelled
//! run never leaves a partial output file.
//!
//! # Example
//!
//! ```rust,ignore
//! use sensor_scrub::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder().redact(true).build()?;
//! let report = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&[PathBuf::from("secom.csv")])?;
//! ```

pub mod progress;

pub use progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};

use crate::cleaner::Cleaner;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::loader::Loader;
use crate::normalizer::Normalizer;
use crate::redact::{NoAssist, PiiAnalyzer, RedactionAssist, Redactor};
use crate::report::RunReport;
use crate::writer::Writer;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// The cleaning pipeline.
///
/// Built with [`Pipeline::builder()`]. The assist capability and
/// progress reporter are optional; the cancellation token defaults to a
/// fresh, uncancelled one.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    assist: Option<&'a dyn RedactionAssist>,
    reporter: Option<Box<dyn ProgressReporter + 'a>>,
    token: CancellationToken,
}

static_assertions::assert_impl_all!(Pipeline<'static>: Send);

impl<'a> Pipeline<'a> {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder<'a> {
        PipelineBuilder::default()
    }

    /// Run the pipeline over the given input files.
    ///
    /// Returns the run report on success. On failure the report is not
    /// written; the error names the stage that failed.
    pub fn run(&self, sources: &[PathBuf]) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::new(sources);

        match self.run_stages(sources, started, &mut report) {
            Ok(()) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Cleaned {} rows in {} ms",
                    report.rows_loaded, report.duration_ms
                )));
                Ok(report)
            }
            Err(e) if e.is_cancelled() => {
                self.report_progress(ProgressUpdate::cancelled());
                Err(e)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(
                    report.final_stage,
                    e.to_string(),
                ));
                Err(e)
            }
        }
    }

    fn run_stages(
        &self,
        sources: &[PathBuf],
        started: Instant,
        report: &mut RunReport,
    ) -> Result<()> {
        // The analyzer is created once per run and handed to the
        // redactor; it never lives in a global.
        let analyzer = PiiAnalyzer::new();
        let no_assist = NoAssist;
        let assist: &dyn RedactionAssist = self.assist.unwrap_or(&no_assist);

        let mut df = self.stage(PipelineStage::Loading, report, |report| {
            Loader::new(&self.config).load(sources, report)
        })?;

        self.stage(PipelineStage::Cleaning, report, |report| {
            Cleaner::new(&self.config).clean(&mut df, report)
        })?;

        self.stage(PipelineStage::Normalizing, report, |report| {
            Normalizer::new(&self.config).normalize(&mut df, report)
        })?;

        if self.config.redact {
            self.stage(PipelineStage::Redacting, report, |report| {
                Redactor::new(&self.config, &analyzer, assist).redact(&mut df, report)
            })?;
        }

        self.write_outputs(&mut df, sources, started, report)?;
        Ok(())
    }

    fn write_outputs(
        &self,
        df: &mut DataFrame,
        sources: &[PathBuf],
        started: Instant,
        report: &mut RunReport,
    ) -> Result<()> {
        self.check_cancelled()?;
        report.final_stage = PipelineStage::Writing;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Writing,
            PipelineStage::Writing.display_name(),
        ));

        let writer = Writer::new(&self.config);
        writer.write_table(df, sources, report)?;

        report.final_stage = PipelineStage::Done;
        report.duration_ms = started.elapsed().as_millis() as u64;
        writer.write_report(sources, report)?;

        info!(duration_ms = report.duration_ms, "Pipeline finished");
        Ok(())
    }

    /// Run one stage with a cancellation check and a progress event at
    /// its boundary.
    fn stage<T>(
        &self,
        stage: PipelineStage,
        report: &mut RunReport,
        f: impl FnOnce(&mut RunReport) -> Result<T>,
    ) -> Result<T> {
        self.check_cancelled()?;
        report.final_stage = stage;
        self.report_progress(ProgressUpdate::new(stage, stage.display_name()));
        f(report).context(format!("{} stage failed", stage.display_name()))
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.reporter {
            reporter.report(update);
        }
    }
}

/// Builder for [`Pipeline`] with fluent API.
#[derive(Default)]
pub struct PipelineBuilder<'a> {
    config: Option<PipelineConfig>,
    assist: Option<&'a dyn RedactionAssist>,
    reporter: Option<Box<dyn ProgressReporter + 'a>>,
    token: Option<CancellationToken>,
}

impl<'a> PipelineBuilder<'a> {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Attach a generative-assist capability for the redaction stage.
    ///
    /// Without one, ambiguous findings keep their local verdict and the
    /// report flags the assist as skipped.
    pub fn assist(mut self, assist: &'a dyn RedactionAssist) -> Self {
        self.assist = Some(assist);
        self
    }

    /// Attach a progress reporter.
    pub fn progress_reporter(mut self, reporter: Box<dyn ProgressReporter + 'a>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Attach a closure-based progress reporter.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'a,
    {
        self.reporter = Some(Box::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token shared with another thread.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> Result<Pipeline<'a>> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        Ok(Pipeline {
            config,
            assist: self.assist,
            reporter: self.reporter,
            token: self.token.unwrap_or_default(),
        })
    }
}
