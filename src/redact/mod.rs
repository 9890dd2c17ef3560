//! PII redaction stage.
//!
//! Scans text columns with the local analyzer, optionally asks the
//! assist capability to review ambiguous findings, and masks confirmed
//! spans with typed placeholders. Numeric columns are never scanned.

pub mod analyzer;
pub mod assist;

pub use analyzer::{PiiAnalyzer, PiiEntity, PiiFinding};
pub use assist::{AssistItem, NoAssist, RedactionAssist};

#[cfg(feature = "assist")]
pub use assist::GeminiAssist;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::report::RunReport;
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Findings at or above this confidence are masked without review.
/// Findings between the configured threshold and this value go to the
/// assist capability when one is available.
const CONFIDENT_THRESHOLD: f64 = 0.8;

/// How many ambiguous findings are reviewed per assist request.
const ASSIST_BATCH_SIZE: usize = 25;

/// Masks PII in the text columns of a table.
///
/// The analyzer and assist capability are passed in explicitly; the
/// redactor owns no global state and persists nothing between cells.
pub struct Redactor<'a> {
    config: &'a PipelineConfig,
    analyzer: &'a PiiAnalyzer,
    assist: &'a dyn RedactionAssist,
}

impl<'a> Redactor<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        analyzer: &'a PiiAnalyzer,
        assist: &'a dyn RedactionAssist,
    ) -> Self {
        Self {
            config,
            analyzer,
            assist,
        }
    }

    /// Redact every text column in place.
    pub fn redact(&self, df: &mut DataFrame, report: &mut RunReport) -> Result<()> {
        if !self.assist.is_enabled() {
            report.assist_skipped = true;
        }

        let text_columns: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|col| matches!(col.dtype(), DataType::String))
            .map(|col| col.name().to_string())
            .collect();

        for col_name in &text_columns {
            self.redact_column(df, col_name, report)?;
        }

        info!(
            columns = text_columns.len(),
            masked = report.total_redactions(),
            assist = self.assist.name(),
            "Redaction complete"
        );
        Ok(())
    }

    fn redact_column(
        &self,
        df: &mut DataFrame,
        col_name: &str,
        report: &mut RunReport,
    ) -> Result<()> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let strings = series.str()?;

        // First pass: collect findings for every cell.
        let mut findings: Vec<PiiFinding> = Vec::new();
        for (row, cell) in strings.into_iter().enumerate() {
            let Some(text) = cell else { continue };
            for span in self.analyzer.analyze(text) {
                if span.confidence >= self.config.confidence_threshold {
                    findings.push(PiiFinding {
                        column: col_name.to_string(),
                        row,
                        start: span.start,
                        end: span.end,
                        entity: span.entity,
                        confidence: span.confidence,
                    });
                }
            }
        }

        if findings.is_empty() {
            return Ok(());
        }

        // Ambiguous findings get a second opinion, in batches.
        let confirmed = self.review_ambiguous(&strings_vec(strings), findings, report);

        // Second pass: mask confirmed spans, right-to-left within each
        // cell so earlier spans keep their offsets.
        let mut values: Vec<Option<String>> = strings
            .into_iter()
            .map(|opt| opt.map(|s| s.to_string()))
            .collect();

        let mut by_row: Vec<PiiFinding> = confirmed;
        by_row.sort_by(|a, b| a.row.cmp(&b.row).then(b.start.cmp(&a.start)));

        for finding in &by_row {
            if let Some(Some(cell)) = values.get_mut(finding.row) {
                cell.replace_range(finding.start..finding.end, finding.entity.placeholder());
                report.count_redaction(finding.entity.label(), 1);
            }
        }

        let masked = Series::new(col_name.into(), values);
        df.replace(col_name, masked)?;
        debug!(column = %col_name, findings = by_row.len(), "Masked column");
        Ok(())
    }

    /// Split findings into confident and ambiguous, review the ambiguous
    /// ones, and return everything that should be masked.
    fn review_ambiguous(
        &self,
        cells: &[Option<String>],
        findings: Vec<PiiFinding>,
        report: &mut RunReport,
    ) -> Vec<PiiFinding> {
        let (confident, ambiguous): (Vec<PiiFinding>, Vec<PiiFinding>) = findings
            .into_iter()
            .partition(|f| f.confidence >= CONFIDENT_THRESHOLD);

        if ambiguous.is_empty() {
            return confident;
        }

        if !self.assist.is_enabled() {
            // Local verdict stands unreviewed.
            let mut all = confident;
            all.extend(ambiguous);
            return all;
        }

        let mut confirmed = confident;
        for batch in ambiguous.chunks(ASSIST_BATCH_SIZE) {
            let items: Vec<AssistItem> = batch
                .iter()
                .map(|f| AssistItem {
                    snippet: cells
                        .get(f.row)
                        .and_then(|c| c.as_ref())
                        .map(|text| text[f.start..f.end].to_string())
                        .unwrap_or_default(),
                    entity: f.entity,
                })
                .collect();

            report.assist_calls += 1;
            match self.assist.review(&items) {
                Ok(verdicts) => {
                    for (finding, keep) in batch.iter().zip(verdicts) {
                        if keep {
                            confirmed.push(finding.clone());
                        }
                    }
                }
                Err(e) => {
                    // Best effort only: the local result stands.
                    report.assist_failures += 1;
                    report.warn(format!("assist review failed: {}", e));
                    warn!("Assist review failed, keeping local findings: {}", e);
                    confirmed.extend(batch.iter().cloned());
                }
            }
        }

        confirmed
    }
}

fn strings_vec(chunked: &StringChunked) -> Vec<Option<String>> {
    chunked
        .into_iter()
        .map(|opt| opt.map(|s| s.to_string()))
        .collect()
}
