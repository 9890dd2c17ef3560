//! CSV ingest and multi-file alignment.
//!
//! A single input file is read directly. When several files are given
//! (e.g. sensor readings in one file, labels in another) they are aligned
//! on a shared key column with an inner join: only rows whose key appears
//! in every input survive, and the dropped count is reported.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::report::RunReport;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads one or more CSV files into a single aligned table.
pub struct Loader<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Loader<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Load all input files and align them on the key column.
    ///
    /// Column order is stable: the first file's columns come first, then
    /// each subsequent file's non-key columns in file order.
    pub fn load(&self, paths: &[PathBuf], report: &mut RunReport) -> Result<DataFrame> {
        if paths.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one input file is required".to_string(),
            ));
        }

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            frames.push(self.read_csv(path)?);
        }

        let df = if frames.len() == 1 {
            frames.pop().ok_or_else(|| {
                PipelineError::InvalidConfig("no input frames".to_string())
            })?
        } else {
            self.join_on_key(frames, report)?
        };

        report.rows_loaded = df.height();
        info!(
            rows = df.height(),
            columns = df.width(),
            "Loaded {} input file(s)",
            paths.len()
        );
        Ok(df)
    }

    fn read_csv(&self, path: &Path) -> Result<DataFrame> {
        if !path.is_file() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        debug!(path = %path.display(), "Reading CSV");
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }

    /// Inner-join the frames on the configured key column.
    ///
    /// Rows whose key does not appear in every frame are dropped and
    /// counted in the report. Before joining, every frame must carry the
    /// key column, and non-key column names must not collide.
    fn join_on_key(&self, frames: Vec<DataFrame>, report: &mut RunReport) -> Result<DataFrame> {
        let key = self.config.join_key.as_str();

        let mut seen_columns: Vec<String> = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            let names: Vec<String> = frame
                .get_column_names()
                .iter()
                .map(|n| n.to_string())
                .collect();
            if !names.iter().any(|n| n == key) {
                return Err(PipelineError::SchemaMismatch(format!(
                    "input #{} is missing key column '{}'",
                    i + 1,
                    key
                )));
            }
            for name in &names {
                if name != key && seen_columns.contains(name) {
                    return Err(PipelineError::SchemaMismatch(format!(
                        "column '{}' appears in more than one input",
                        name
                    )));
                }
            }
            seen_columns.extend(names.into_iter().filter(|n| n != key));
        }

        let total_rows: usize = frames.iter().map(|f| f.height()).sum();
        let max_rows: usize = frames.iter().map(|f| f.height()).max().unwrap_or(0);

        let mut iter = frames.into_iter();
        let mut acc = iter.next().ok_or_else(|| {
            PipelineError::InvalidConfig("no input frames".to_string())
        })?;
        for next in iter {
            acc = acc
                .lazy()
                .join(
                    next.lazy(),
                    [col(key)],
                    [col(key)],
                    JoinArgs::new(JoinType::Inner),
                )
                .collect()?;
        }

        // Dropped rows relative to the largest input: a key absent from any
        // file removes that row everywhere.
        report.rows_dropped_join = max_rows.saturating_sub(acc.height());
        if report.rows_dropped_join > 0 {
            info!(
                dropped = report.rows_dropped_join,
                "Join dropped rows without a key in every input"
            );
        }
        debug!(
            inputs_rows = total_rows,
            joined_rows = acc.height(),
            "Aligned inputs on '{}'",
            key
        );
        Ok(acc)
    }
}
