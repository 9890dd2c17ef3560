//! Column rescaling after cleaning.
//!
//! Z-score and min-max normalization over numeric feature columns.
//! Statistics are computed over non-null values only, so a column the
//! imputer had to skip is still rescaled where it has data and its nulls
//! pass through. Zero-variance and degenerate-range columns map to a
//! constant 0.0 rather than dividing by zero.

use crate::cleaner::numeric_feature_columns;
use crate::config::{NormalizeMode, PipelineConfig};
use crate::error::Result;
use crate::report::RunReport;
use polars::prelude::*;
use tracing::{debug, info};

/// Rescales numeric feature columns in place.
pub struct Normalizer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Apply the configured normalization mode to every numeric feature
    /// column.
    pub fn normalize(&self, df: &mut DataFrame, report: &mut RunReport) -> Result<()> {
        if self.config.normalize == NormalizeMode::None {
            debug!("Normalization disabled");
            return Ok(());
        }

        let columns = numeric_feature_columns(df, &self.config.join_key);
        for col_name in &columns {
            let series = df.column(col_name)?.as_materialized_series().clone();
            let rescaled = match self.config.normalize {
                NormalizeMode::ZScore => z_score(&series, col_name)?,
                NormalizeMode::MinMax => min_max(&series, col_name)?,
                NormalizeMode::None => unreachable!(),
            };
            match rescaled {
                Some(new_series) => {
                    df.replace(col_name, new_series)?;
                    report.columns_normalized += 1;
                }
                None => {
                    report.skip_column(col_name, "no values to normalize");
                }
            }
        }

        info!(
            mode = ?self.config.normalize,
            columns = report.columns_normalized,
            "Normalized feature columns"
        );
        Ok(())
    }
}

/// Center and scale to zero mean and unit variance (population std).
///
/// Returns None when the column has no non-null values.
fn z_score(series: &Series, col_name: &str) -> Result<Option<Series>> {
    let float_series = series.cast(&DataType::Float64)?;
    let f64_chunked = float_series.f64()?;

    let values: Vec<f64> = f64_chunked.into_iter().flatten().collect();
    if values.is_empty() {
        return Ok(None);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    let rescaled: Vec<Option<f64>> = f64_chunked
        .into_iter()
        .map(|opt| {
            opt.map(|v| {
                if std < f64::EPSILON {
                    // Zero variance: every value is the mean.
                    0.0
                } else {
                    (v - mean) / std
                }
            })
        })
        .collect();

    Ok(Some(Series::new(col_name.into(), rescaled)))
}

/// Rescale into [0, 1]; a degenerate range maps to 0.0.
fn min_max(series: &Series, col_name: &str) -> Result<Option<Series>> {
    let float_series = series.cast(&DataType::Float64)?;
    let f64_chunked = float_series.f64()?;

    let (Some(min), Some(max)) = (f64_chunked.min(), f64_chunked.max()) else {
        return Ok(None);
    };
    let range = max - min;

    let rescaled: Vec<Option<f64>> = f64_chunked
        .into_iter()
        .map(|opt| {
            opt.map(|v| {
                if range < f64::EPSILON {
                    0.0
                } else {
                    (v - min) / range
                }
            })
        })
        .collect();

    Ok(Some(Series::new(col_name.into(), rescaled)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report() -> RunReport {
        RunReport::new(&[PathBuf::from("test.csv")])
    }

    fn column_values(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn test_z_score_mean_zero_var_one() {
        let mut df = df![
            "s1" => [2.0, 4.0, 6.0, 8.0, 10.0],
        ]
        .unwrap();
        let config = PipelineConfig::default();

        Normalizer::new(&config)
            .normalize(&mut df, &mut report())
            .unwrap();

        let values = column_values(&df, "s1");
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 1e-9);
        assert!((var - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_z_score_zero_variance_maps_to_zero() {
        let mut df = df![
            "s1" => [7.0, 7.0, 7.0],
        ]
        .unwrap();
        let config = PipelineConfig::default();

        Normalizer::new(&config)
            .normalize(&mut df, &mut report())
            .unwrap();

        for v in column_values(&df, "s1") {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_z_score_idempotent_within_tolerance() {
        let mut df = df![
            "s1" => [1.0, 5.0, 9.0, 13.0],
        ]
        .unwrap();
        let config = PipelineConfig::default();
        let normalizer = Normalizer::new(&config);

        normalizer.normalize(&mut df, &mut report()).unwrap();
        let once = column_values(&df, "s1");
        normalizer.normalize(&mut df, &mut report()).unwrap();
        let twice = column_values(&df, "s1");

        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_min_max_rescales_to_unit_interval() {
        let mut df = df![
            "s1" => [10.0, 20.0, 30.0],
        ]
        .unwrap();
        let config = PipelineConfig::builder()
            .normalize(NormalizeMode::MinMax)
            .build()
            .unwrap();

        Normalizer::new(&config)
            .normalize(&mut df, &mut report())
            .unwrap();

        let values = column_values(&df, "s1");
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_min_max_degenerate_range_maps_to_zero() {
        let mut df = df![
            "s1" => [3.0, 3.0, 3.0],
        ]
        .unwrap();
        let config = PipelineConfig::builder()
            .normalize(NormalizeMode::MinMax)
            .build()
            .unwrap();

        Normalizer::new(&config)
            .normalize(&mut df, &mut report())
            .unwrap();

        for v in column_values(&df, "s1") {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_none_mode_leaves_values() {
        let mut df = df![
            "s1" => [10.0, 20.0, 30.0],
        ]
        .unwrap();
        let config = PipelineConfig::builder()
            .normalize(NormalizeMode::None)
            .build()
            .unwrap();
        let mut r = report();

        Normalizer::new(&config).normalize(&mut df, &mut r).unwrap();

        assert_eq!(column_values(&df, "s1"), vec![10.0, 20.0, 30.0]);
        assert_eq!(r.columns_normalized, 0);
    }

    #[test]
    fn test_nulls_pass_through() {
        let mut df = df![
            "s1" => [Some(1.0), None, Some(3.0)],
        ]
        .unwrap();
        let config = PipelineConfig::default();

        Normalizer::new(&config)
            .normalize(&mut df, &mut report())
            .unwrap();

        let col = df.column("s1").unwrap();
        assert_eq!(col.null_count(), 1);
        // Non-null values are still centered over themselves.
        let values = column_values(&df, "s1");
        let sum: f64 = values.iter().sum();
        assert!(sum.abs() < 1e-9);
    }

    #[test]
    fn test_key_column_untouched() {
        let mut df = df![
            "id" => [1i64, 2, 3],
            "s1" => [1.0, 2.0, 3.0],
        ]
        .unwrap();
        let config = PipelineConfig::default();

        Normalizer::new(&config)
            .normalize(&mut df, &mut report())
            .unwrap();

        let ids: Vec<i64> = df
            .column("id")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
