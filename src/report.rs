//! Run report accumulation and serialization.
//!
//! Every stage of the pipeline records what it did into a [`RunReport`];
//! nothing is dropped or altered silently. The finished report is written
//! next to the output table as JSON and summarized on the terminal.

use crate::pipeline::progress::PipelineStage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters and notes gathered over a single pipeline run.
///
/// BTreeMaps keep per-column entries in a stable order so report files
/// diff cleanly between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started (UTC).
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,

    /// Input files, in the order they were given.
    pub sources: Vec<String>,

    /// Rows in the table after loading (and joining, if applicable).
    pub rows_loaded: usize,

    /// Rows dropped because their key was not present in every input.
    pub rows_dropped_join: usize,

    /// Outlying values nulled, per column.
    pub outliers_nulled: BTreeMap<String, usize>,

    /// Rows removed because they contained an outlier (Remove policy).
    pub outlier_rows_removed: usize,

    /// Missing values filled, per column.
    pub values_imputed: BTreeMap<String, usize>,

    /// Columns skipped by a stage, with the reason.
    pub columns_skipped: BTreeMap<String, String>,

    /// Columns rescaled by the normalizer.
    pub columns_normalized: usize,

    /// Cells masked by the redactor, per entity type.
    pub entities_redacted: BTreeMap<String, usize>,

    /// Assist requests issued / failed.
    pub assist_calls: usize,
    pub assist_failures: usize,

    /// True when the redaction stage ran without the assist service.
    pub assist_skipped: bool,

    /// Non-fatal problems, in the order they occurred.
    pub warnings: Vec<String>,

    /// The last stage the run reached.
    pub final_stage: PipelineStage,

    /// Where the cleaned table was written, if the run got that far.
    pub output_path: Option<String>,
}

impl RunReport {
    /// Start a fresh report for the given input files.
    pub fn new(sources: &[std::path::PathBuf]) -> Self {
        Self {
            started_at: Utc::now(),
            duration_ms: 0,
            sources: sources
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            rows_loaded: 0,
            rows_dropped_join: 0,
            outliers_nulled: BTreeMap::new(),
            outlier_rows_removed: 0,
            values_imputed: BTreeMap::new(),
            columns_skipped: BTreeMap::new(),
            columns_normalized: 0,
            entities_redacted: BTreeMap::new(),
            assist_calls: 0,
            assist_failures: 0,
            assist_skipped: false,
            warnings: Vec::new(),
            final_stage: PipelineStage::Loading,
            output_path: None,
        }
    }

    /// Record a non-fatal problem.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Record a column a stage could not process.
    pub fn skip_column(&mut self, column: impl Into<String>, reason: impl Into<String>) {
        self.columns_skipped.insert(column.into(), reason.into());
    }

    /// Bump the redaction counter for an entity type.
    pub fn count_redaction(&mut self, entity: &str, count: usize) {
        *self.entities_redacted.entry(entity.to_string()).or_insert(0) += count;
    }

    /// Total values masked across all entity types.
    pub fn total_redactions(&self) -> usize {
        self.entities_redacted.values().sum()
    }

    /// Total values imputed across all columns.
    pub fn total_imputed(&self) -> usize {
        self.values_imputed.values().sum()
    }

    /// Total outlying values nulled across all columns.
    pub fn total_outliers_nulled(&self) -> usize {
        self.outliers_nulled.values().sum()
    }

    /// Render a short human-readable summary for the terminal.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Rows loaded:        {}", self.rows_loaded));
        if self.rows_dropped_join > 0 {
            lines.push(format!("Rows dropped (join): {}", self.rows_dropped_join));
        }
        lines.push(format!(
            "Outliers handled:   {} nulled, {} rows removed",
            self.total_outliers_nulled(),
            self.outlier_rows_removed
        ));
        lines.push(format!("Values imputed:     {}", self.total_imputed()));
        lines.push(format!("Columns normalized: {}", self.columns_normalized));
        if !self.columns_skipped.is_empty() {
            lines.push(format!("Columns skipped:    {}", self.columns_skipped.len()));
        }
        if !self.entities_redacted.is_empty() || self.assist_skipped {
            lines.push(format!(
                "Cells redacted:     {}{}",
                self.total_redactions(),
                if self.assist_skipped {
                    " (assist skipped)"
                } else {
                    ""
                }
            ));
        }
        for warning in &self.warnings {
            lines.push(format!("Warning: {}", warning));
        }
        lines.push(format!("Duration:           {} ms", self.duration_ms));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report() -> RunReport {
        RunReport::new(&[PathBuf::from("data.csv"), PathBuf::from("labels.csv")])
    }

    #[test]
    fn test_new_report_is_empty() {
        let r = report();
        assert_eq!(r.sources.len(), 2);
        assert_eq!(r.rows_loaded, 0);
        assert_eq!(r.total_redactions(), 0);
        assert!(!r.assist_skipped);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_redaction_counters_accumulate() {
        let mut r = report();
        r.count_redaction("EMAIL", 2);
        r.count_redaction("PHONE", 1);
        r.count_redaction("EMAIL", 1);
        assert_eq!(r.entities_redacted["EMAIL"], 3);
        assert_eq!(r.total_redactions(), 4);
    }

    #[test]
    fn test_skipped_columns_keep_reason() {
        let mut r = report();
        r.skip_column("s17", "no usable values");
        assert_eq!(r.columns_skipped["s17"], "no usable values");
    }

    #[test]
    fn test_json_round_trip() {
        let mut r = report();
        r.rows_loaded = 100;
        r.values_imputed.insert("s1".to_string(), 7);
        r.warn("assist unavailable");
        let json = serde_json::to_string_pretty(&r).unwrap();
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rows_loaded, 100);
        assert_eq!(back.values_imputed["s1"], 7);
        assert_eq!(back.warnings.len(), 1);
    }

    #[test]
    fn test_summary_mentions_warnings() {
        let mut r = report();
        r.warn("column s3 skipped");
        let text = r.summary();
        assert!(text.contains("Warning: column s3 skipped"));
    }
}
