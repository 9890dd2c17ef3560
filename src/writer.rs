//! Output stage: cleaned CSV and run report.
//!
//! The table is written to a temporary path in the output directory and
//! renamed into place, so a crash or cancellation mid-write never leaves
//! a partial output file. Existing outputs are overwritten silently.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::report::RunReport;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes the cleaned table and the run report.
pub struct Writer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Writer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Write `<stem>_cleaned.csv` and record its path in the report.
    ///
    /// The stem comes from `output_name` when set, otherwise from the
    /// first input file.
    pub fn write_table(
        &self,
        df: &mut DataFrame,
        sources: &[PathBuf],
        report: &mut RunReport,
    ) -> Result<PathBuf> {
        let stem = self.output_stem(sources);
        let output_path = self.config.output_dir.join(format!("{}_cleaned.csv", stem));

        fs::create_dir_all(&self.config.output_dir).map_err(|e| PipelineError::WriteFailure {
            path: self.config.output_dir.clone(),
            reason: e.to_string(),
        })?;

        // Stage through a temp file, then rename into place.
        let tmp_path = output_path.with_extension("csv.tmp");
        self.write_csv(df, &tmp_path)?;
        fs::rename(&tmp_path, &output_path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            PipelineError::WriteFailure {
                path: output_path.clone(),
                reason: e.to_string(),
            }
        })?;

        report.output_path = Some(output_path.display().to_string());
        info!(path = %output_path.display(), rows = df.height(), "Wrote cleaned table");
        Ok(output_path)
    }

    /// Write `<stem>_report.json` next to the table.
    pub fn write_report(&self, sources: &[PathBuf], report: &RunReport) -> Result<PathBuf> {
        let stem = self.output_stem(sources);
        let report_path = self.config.output_dir.join(format!("{}_report.json", stem));

        let json = serde_json::to_string_pretty(report)?;
        fs::write(&report_path, json).map_err(|e| PipelineError::WriteFailure {
            path: report_path.clone(),
            reason: e.to_string(),
        })?;

        debug!(path = %report_path.display(), "Wrote run report");
        Ok(report_path)
    }

    fn write_csv(&self, df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = fs::File::create(path).map_err(|e| PipelineError::WriteFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| PipelineError::WriteFailure {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn output_stem(&self, sources: &[PathBuf]) -> String {
        if let Some(name) = &self.config.output_name {
            return name.clone();
        }
        sources
            .first()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::io::csv::read::CsvReadOptions;

    fn config_with_dir(dir: &Path) -> PipelineConfig {
        PipelineConfig::builder()
            .output_dir(dir.to_path_buf())
            .build()
            .unwrap()
    }

    fn sample_df() -> DataFrame {
        df![
            "id" => [1i64, 2, 3],
            "s1" => [0.1, 0.2, 0.3],
        ]
        .unwrap()
    }

    #[test]
    fn test_write_table_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_dir(dir.path());
        let sources = vec![PathBuf::from("secom.csv")];
        let mut df = sample_df();
        let mut report = RunReport::new(&sources);

        let path = Writer::new(&config)
            .write_table(&mut df, &sources, &mut report)
            .unwrap();

        assert!(path.ends_with("secom_cleaned.csv"));
        assert!(path.is_file());
        assert!(report.output_path.is_some());

        // Reload reproduces column set and row count.
        let reloaded = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(reloaded.height(), df.height());
        assert_eq!(reloaded.get_column_names(), df.get_column_names());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_dir(dir.path());
        let sources = vec![PathBuf::from("data.csv")];
        let mut df = sample_df();
        let mut report = RunReport::new(&sources);

        Writer::new(&config)
            .write_table(&mut df, &sources, &mut report)
            .unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_overwrites_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_dir(dir.path());
        let sources = vec![PathBuf::from("data.csv")];
        let mut report = RunReport::new(&sources);
        let writer = Writer::new(&config);

        let mut df1 = sample_df();
        writer.write_table(&mut df1, &sources, &mut report).unwrap();

        let mut df2 = df!["id" => [9i64], "s1" => [9.9]].unwrap();
        let path = writer.write_table(&mut df2, &sources, &mut report).unwrap();

        let reloaded = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(reloaded.height(), 1);
    }

    #[test]
    fn test_custom_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::builder()
            .output_dir(dir.path().to_path_buf())
            .output_name("run42")
            .build()
            .unwrap();
        let sources = vec![PathBuf::from("data.csv")];
        let mut df = sample_df();
        let mut report = RunReport::new(&sources);

        let path = Writer::new(&config)
            .write_table(&mut df, &sources, &mut report)
            .unwrap();
        assert!(path.ends_with("run42_cleaned.csv"));
    }

    #[test]
    fn test_write_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_dir(dir.path());
        let sources = vec![PathBuf::from("data.csv")];
        let mut report = RunReport::new(&sources);
        report.rows_loaded = 42;

        let path = Writer::new(&config).write_report(&sources, &report).unwrap();

        assert!(path.ends_with("data_report.json"));
        let content = fs::read_to_string(path).unwrap();
        let parsed: RunReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.rows_loaded, 42);
    }
}
