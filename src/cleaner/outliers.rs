//! Outlier detection and treatment.
//!
//! Uses the IQR fence: a value outside `[Q1 - k*IQR, Q3 + k*IQR]` is an
//! outlier. The multiplier `k` and the treatment policy come from the
//! pipeline configuration.

use crate::config::OutlierPolicy;
use crate::error::Result;
use crate::report::RunReport;
use polars::prelude::*;
use tracing::debug;

/// Detects outliers column by column and applies the configured policy.
pub struct OutlierHandler {
    multiplier: f64,
    policy: OutlierPolicy,
}

impl OutlierHandler {
    pub fn new(multiplier: f64, policy: OutlierPolicy) -> Self {
        Self { multiplier, policy }
    }

    /// Apply outlier handling to the given numeric columns.
    pub fn handle(
        &self,
        df: &mut DataFrame,
        columns: &[String],
        report: &mut RunReport,
    ) -> Result<()> {
        if self.policy == OutlierPolicy::Keep {
            debug!("Outlier policy is Keep, leaving values untouched");
            return Ok(());
        }

        for col_name in columns {
            let series = df.column(col_name)?.as_materialized_series().clone();
            let Some((lower, upper)) = self.iqr_bounds(&series)? else {
                continue;
            };

            match self.policy {
                OutlierPolicy::Null => {
                    let nulled = self.null_outside(&series, lower, upper, col_name)?;
                    if nulled.1 > 0 {
                        df.replace(col_name, nulled.0)?;
                        report
                            .outliers_nulled
                            .insert(col_name.clone(), nulled.1);
                        debug!(column = %col_name, count = nulled.1, "Nulled outliers");
                    }
                }
                OutlierPolicy::Remove => {
                    let before = df.height();
                    let mask = self.inlier_mask(&series, lower, upper)?;
                    *df = df.filter(&mask)?;
                    let removed = before - df.height();
                    if removed > 0 {
                        report.outlier_rows_removed += removed;
                        debug!(column = %col_name, removed, "Removed outlier rows");
                    }
                }
                OutlierPolicy::Keep => unreachable!(),
            }
        }

        Ok(())
    }

    /// Compute the IQR fence for a column, or None when there are no
    /// usable values to rank.
    fn iqr_bounds(&self, series: &Series) -> Result<Option<(f64, f64)>> {
        let non_null = series.drop_nulls();
        if non_null.is_empty() {
            return Ok(None);
        }

        let sorted = non_null.sort(SortOptions::default())?;
        let n = sorted.len();
        let q1_idx = (n as f64 * 0.25) as usize;
        let q3_idx = ((n as f64 * 0.75) as usize).min(n - 1);

        let q1 = sorted.get(q1_idx)?.try_extract::<f64>().unwrap_or(0.0);
        let q3 = sorted.get(q3_idx)?.try_extract::<f64>().unwrap_or(0.0);
        let iqr = q3 - q1;

        Ok(Some((
            q1 - self.multiplier * iqr,
            q3 + self.multiplier * iqr,
        )))
    }

    /// Replace out-of-fence values with nulls. Returns the new series and
    /// how many values were nulled.
    fn null_outside(
        &self,
        series: &Series,
        lower: f64,
        upper: f64,
        col_name: &str,
    ) -> Result<(Series, usize)> {
        let float_series = series.cast(&DataType::Float64)?;
        let f64_chunked = float_series.f64()?;

        let mut values = Vec::with_capacity(f64_chunked.len());
        let mut nulled = 0;
        for opt_val in f64_chunked.into_iter() {
            match opt_val {
                Some(val) if val < lower || val > upper => {
                    values.push(None);
                    nulled += 1;
                }
                other => values.push(other),
            }
        }

        Ok((Series::new(col_name.into(), values), nulled))
    }

    /// Boolean mask that keeps in-fence values. Nulls are kept; the
    /// imputer deals with them.
    fn inlier_mask(&self, series: &Series, lower: f64, upper: f64) -> Result<BooleanChunked> {
        let float_series = series.cast(&DataType::Float64)?;
        let f64_chunked = float_series.f64()?;

        let mut mask_values = Vec::with_capacity(f64_chunked.len());
        for opt_val in f64_chunked.into_iter() {
            if let Some(val) = opt_val {
                mask_values.push(val >= lower && val <= upper);
            } else {
                mask_values.push(true);
            }
        }

        Ok(BooleanChunked::from_slice("mask".into(), &mask_values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report() -> RunReport {
        RunReport::new(&[PathBuf::from("test.csv")])
    }

    #[test]
    fn test_null_policy_nulls_extreme_value() {
        // Nine 10s and one 1000: Q1 = Q3 = 10, IQR = 0, fence = [10, 10].
        let mut df = df![
            "s1" => [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 1000.0],
        ]
        .unwrap();
        let handler = OutlierHandler::new(1.5, OutlierPolicy::Null);
        let mut r = report();

        handler
            .handle(&mut df, &["s1".to_string()], &mut r)
            .unwrap();

        let col = df.column("s1").unwrap();
        assert_eq!(col.null_count(), 1);
        assert_eq!(r.outliers_nulled["s1"], 1);
        // A later mean over the column no longer sees the outlier.
        let mean = col.as_materialized_series().mean().unwrap();
        assert!((mean - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_policy_drops_rows() {
        let mut df = df![
            "s1" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0],
        ]
        .unwrap();
        let handler = OutlierHandler::new(1.5, OutlierPolicy::Remove);
        let mut r = report();

        handler
            .handle(&mut df, &["s1".to_string()], &mut r)
            .unwrap();

        assert!(df.height() < 10);
        assert!(r.outlier_rows_removed > 0);
        let max = df.column("s1").unwrap().f64().unwrap().max().unwrap();
        assert!(max < 100.0);
    }

    #[test]
    fn test_keep_policy_is_noop() {
        let mut df = df![
            "s1" => [1.0, 2.0, 3.0, 1000.0],
        ]
        .unwrap();
        let handler = OutlierHandler::new(1.5, OutlierPolicy::Keep);
        let mut r = report();

        handler
            .handle(&mut df, &["s1".to_string()], &mut r)
            .unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(df.column("s1").unwrap().null_count(), 0);
        assert!(r.outliers_nulled.is_empty());
    }

    #[test]
    fn test_nulls_survive_remove_policy() {
        let mut df = df![
            "s1" => [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)],
        ]
        .unwrap();
        let handler = OutlierHandler::new(1.5, OutlierPolicy::Remove);
        let mut r = report();

        handler
            .handle(&mut df, &["s1".to_string()], &mut r)
            .unwrap();

        assert_eq!(df.height(), 5);
        assert_eq!(df.column("s1").unwrap().null_count(), 1);
    }

    #[test]
    fn test_wider_multiplier_keeps_more() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 20.0];
        let mut df_tight = df!["s1" => values.clone()].unwrap();
        let mut df_wide = df!["s1" => values].unwrap();
        let mut r1 = report();
        let mut r2 = report();

        OutlierHandler::new(1.5, OutlierPolicy::Null)
            .handle(&mut df_tight, &["s1".to_string()], &mut r1)
            .unwrap();
        OutlierHandler::new(10.0, OutlierPolicy::Null)
            .handle(&mut df_wide, &["s1".to_string()], &mut r2)
            .unwrap();

        let tight_nulls = df_tight.column("s1").unwrap().null_count();
        let wide_nulls = df_wide.column("s1").unwrap().null_count();
        assert!(wide_nulls <= tight_nulls);
    }

    #[test]
    fn test_all_null_column_skipped() {
        let mut df = df![
            "s1" => [Option::<f64>::None, None, None],
        ]
        .unwrap();
        let handler = OutlierHandler::new(1.5, OutlierPolicy::Null);
        let mut r = report();

        handler
            .handle(&mut df, &["s1".to_string()], &mut r)
            .unwrap();

        assert_eq!(df.column("s1").unwrap().null_count(), 3);
        assert!(r.outliers_nulled.is_empty());
    }
}
