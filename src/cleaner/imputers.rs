//! Missing-value imputation.
//!
//! One strategy applies to all numeric feature columns in a run: mean,
//! median, or a deterministic k-nearest-neighbour fill. A column with no
//! usable values at all is skipped with `InsufficientData` and reported;
//! the run continues.

use crate::config::ImputationStrategy;
use crate::error::{PipelineError, Result};
use crate::report::RunReport;
use polars::prelude::*;
use tracing::debug;

/// Fills missing numeric values according to the configured strategy.
pub struct Imputer {
    strategy: ImputationStrategy,
    neighbors: usize,
}

impl Imputer {
    pub fn new(strategy: ImputationStrategy, neighbors: usize) -> Self {
        Self {
            strategy,
            neighbors: neighbors.max(1),
        }
    }

    /// Impute missing values in the given numeric columns.
    ///
    /// Never increases the missing count of any column. All-missing
    /// columns are recorded in the report and passed through untouched.
    pub fn impute(
        &self,
        df: &mut DataFrame,
        columns: &[String],
        report: &mut RunReport,
    ) -> Result<()> {
        for col_name in columns {
            let null_count = df.column(col_name)?.null_count();
            if null_count == 0 {
                continue;
            }

            let series = df.column(col_name)?.as_materialized_series().clone();
            if series.drop_nulls().is_empty() {
                let err = PipelineError::InsufficientData {
                    column: col_name.clone(),
                };
                report.skip_column(col_name, "no usable values");
                report.warn(err.to_string());
                debug!(column = %col_name, "Skipping all-missing column");
                continue;
            }

            let filled = match self.strategy {
                ImputationStrategy::Mean => {
                    let mean = series.mean().ok_or_else(|| PipelineError::InsufficientData {
                        column: col_name.clone(),
                    })?;
                    fill_with_value(&series, col_name, mean)?
                }
                ImputationStrategy::Median => {
                    let median = series.median().ok_or_else(|| {
                        PipelineError::InsufficientData {
                            column: col_name.clone(),
                        }
                    })?;
                    fill_with_value(&series, col_name, median)?
                }
                ImputationStrategy::Model => {
                    self.knn_fill(df, col_name, columns)?
                }
            };

            df.replace(col_name, filled)?;
            report.values_imputed.insert(col_name.clone(), null_count);
            debug!(column = %col_name, count = null_count, strategy = ?self.strategy, "Imputed values");
        }

        Ok(())
    }

    /// Deterministic k-nearest-neighbour fill for one column.
    ///
    /// Distances are normalized Euclidean over the other numeric columns,
    /// skipping pairs where either side is null. Ties are broken by row
    /// index so repeated runs produce identical output.
    fn knn_fill(&self, df: &DataFrame, target: &str, columns: &[String]) -> Result<Series> {
        let matrix = data_matrix(df, columns)?;
        let n_rows = df.height();
        let n_cols = columns.len();
        let target_col = columns
            .iter()
            .position(|c| c == target)
            .ok_or_else(|| PipelineError::ColumnNotFound(target.to_string()))?;

        let series = df.column(target)?.as_materialized_series().clone();
        let null_mask = series.is_null();

        let mut values: Vec<Option<f64>> = Vec::with_capacity(n_rows);
        for row_idx in 0..n_rows {
            if null_mask.get(row_idx).unwrap_or(false) {
                values.push(Some(self.impute_one(
                    &matrix, row_idx, target_col, n_rows, n_cols, &null_mask,
                )));
            } else {
                values.push(matrix[row_idx][target_col]);
            }
        }

        Ok(Series::new(target.into(), values))
    }

    fn impute_one(
        &self,
        matrix: &[Vec<Option<f64>>],
        target_row: usize,
        target_col: usize,
        n_rows: usize,
        n_cols: usize,
        null_mask: &BooleanChunked,
    ) -> f64 {
        let candidates: Vec<usize> = (0..n_rows)
            .filter(|&row| row != target_row && !null_mask.get(row).unwrap_or(true))
            .collect();

        if candidates.is_empty() {
            return column_mean(matrix, target_col);
        }

        let mut distances: Vec<(usize, f64)> = candidates
            .iter()
            .map(|&row| {
                (
                    row,
                    row_distance(&matrix[target_row], &matrix[row], target_col, n_cols),
                )
            })
            .collect();

        // Tie-break on row index keeps the fill deterministic.
        distances.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let k = self.neighbors.min(distances.len());
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for &(row, distance) in distances.iter().take(k) {
            if let Some(value) = matrix[row][target_col] {
                let weight = if distance < 1e-10 { 1e10 } else { 1.0 / distance };
                weighted_sum += value * weight;
                weight_sum += weight;
            }
        }

        if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            column_mean(matrix, target_col)
        }
    }
}

/// Fill nulls in a numeric series with a constant.
fn fill_with_value(series: &Series, col_name: &str, fill_value: f64) -> Result<Series> {
    let float_series = series.cast(&DataType::Float64)?;
    let f64_chunked = float_series.f64()?;

    let mut values = Vec::with_capacity(f64_chunked.len());
    for opt_val in f64_chunked.into_iter() {
        values.push(Some(opt_val.unwrap_or(fill_value)));
    }

    Ok(Series::new(col_name.into(), values))
}

/// Convert the numeric columns into an `Option<f64>` matrix for distance
/// computations.
fn data_matrix(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
    let n_rows = df.height();
    let n_cols = columns.len();
    let mut matrix = vec![vec![None; n_cols]; n_rows];

    for (col_idx, col_name) in columns.iter().enumerate() {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let float_series = series.cast(&DataType::Float64)?;
        let f64_chunked = float_series.f64()?;

        for (row_idx, row) in matrix.iter_mut().enumerate().take(n_rows) {
            row[col_idx] = f64_chunked.get(row_idx);
        }
    }

    Ok(matrix)
}

/// Normalized Euclidean distance between two rows, skipping the target
/// column and any pair with a null.
fn row_distance(row1: &[Option<f64>], row2: &[Option<f64>], skip_col: usize, n_cols: usize) -> f64 {
    let mut sum_squared = 0.0;
    let mut count = 0;

    for col_idx in 0..n_cols {
        if col_idx == skip_col {
            continue;
        }
        if let (Some(v1), Some(v2)) = (row1[col_idx], row2[col_idx]) {
            let diff = v1 - v2;
            sum_squared += diff * diff;
            count += 1;
        }
    }

    if count > 0 {
        (sum_squared / count as f64).sqrt()
    } else {
        f64::INFINITY
    }
}

fn column_mean(matrix: &[Vec<Option<f64>>], col: usize) -> f64 {
    let sum: f64 = matrix.iter().filter_map(|row| row[col]).sum();
    let count = matrix.iter().filter(|row| row[col].is_some()).count();
    if count > 0 {
        sum / count as f64
    } else {
        0.0
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
    fn test_mean_imputation() {
        let mut df = df![
            "s1" => [Some(1.0), None, Some(5.0)],
        ]
        .unwrap();
        let mut r = report();

        Imputer::new(ImputationStrategy::Mean, 5)
            .impute(&mut df, &["s1".to_string()], &mut r)
            .unwrap();

        let col = df.column("s1").unwrap();
        assert_eq!(col.null_count(), 0);
        assert_eq!(col.get(1).unwrap().try_extract::<f64>().unwrap(), 3.0);
        assert_eq!(r.values_imputed["s1"], 1);
    }

    #[test]
    fn test_median_imputation() {
        let mut df = df![
            "s1" => [Some(1.0), None, Some(3.0), None, Some(100.0)],
        ]
        .unwrap();
        let mut r = report();

        Imputer::new(ImputationStrategy::Median, 5)
            .impute(&mut df, &["s1".to_string()], &mut r)
            .unwrap();

        let col = df.column("s1").unwrap();
        assert_eq!(col.null_count(), 0);
        // Median of [1, 3, 100] is 3.
        assert_eq!(col.get(1).unwrap().try_extract::<f64>().unwrap(), 3.0);
        assert_eq!(r.values_imputed["s1"], 2);
    }

    #[test]
    fn test_all_missing_column_skipped_not_fatal() {
        let mut df = df![
            "s1" => [Option::<f64>::None, None, None],
            "s2" => [Some(1.0), None, Some(3.0)],
        ]
        .unwrap();
        let mut r = report();

        Imputer::new(ImputationStrategy::Median, 5)
            .impute(&mut df, &["s1".to_string(), "s2".to_string()], &mut r)
            .unwrap();

        // s1 untouched, s2 filled, warning recorded.
        assert_eq!(df.column("s1").unwrap().null_count(), 3);
        assert_eq!(df.column("s2").unwrap().null_count(), 0);
        assert!(r.columns_skipped.contains_key("s1"));
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn test_imputation_never_increases_missing() {
        let mut df = df![
            "a" => [Some(1.0), None, Some(3.0), Some(4.0)],
            "b" => [Some(10.0), Some(20.0), None, Some(40.0)],
        ]
        .unwrap();
        let before: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
        let mut r = report();

        Imputer::new(ImputationStrategy::Model, 2)
            .impute(&mut df, &["a".to_string(), "b".to_string()], &mut r)
            .unwrap();

        let after: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
        assert!(after <= before);
        assert_eq!(after, 0);
    }

    #[test]
    fn test_knn_weighted_average_between_neighbors() {
        // Rows 0 and 2 are equidistant from row 1, so the fill is their mean.
        let mut df = df![
            "feature" => [1.0, 2.0, 3.0],
            "target" => [Some(10.0), None, Some(30.0)],
        ]
        .unwrap();
        let mut r = report();

        Imputer::new(ImputationStrategy::Model, 2)
            .impute(
                &mut df,
                &["feature".to_string(), "target".to_string()],
                &mut r,
            )
            .unwrap();

        let imputed = df
            .column("target")
            .unwrap()
            .get(1)
            .unwrap()
            .try_extract::<f64>()
            .unwrap();
        assert!((imputed - 20.0).abs() < 0.1);
    }

    #[test]
    fn test_knn_closer_neighbor_dominates() {
        let mut df = df![
            "feature" => [1.0, 1.1, 10.0],
            "target" => [Some(10.0), None, Some(100.0)],
        ]
        .unwrap();
        let mut r = report();

        Imputer::new(ImputationStrategy::Model, 2)
            .impute(
                &mut df,
                &["feature".to_string(), "target".to_string()],
                &mut r,
            )
            .unwrap();

        let imputed = df
            .column("target")
            .unwrap()
            .get(1)
            .unwrap()
            .try_extract::<f64>()
            .unwrap();
        assert!(imputed < 30.0);
    }

    #[test]
    fn test_knn_deterministic_across_runs() {
        let build = || {
            df![
                "a" => [Some(1.0), None, Some(3.0), Some(4.0), Some(2.0)],
                "b" => [Some(5.0), Some(6.0), None, Some(8.0), Some(7.0)],
            ]
            .unwrap()
        };
        let imputer = Imputer::new(ImputationStrategy::Model, 3);
        let cols = vec!["a".to_string(), "b".to_string()];

        let mut df1 = build();
        let mut df2 = build();
        imputer.impute(&mut df1, &cols, &mut report()).unwrap();
        imputer.impute(&mut df2, &cols, &mut report()).unwrap();

        assert!(df1.equals(&df2));
    }

    #[test]
    fn test_untouched_values_preserved() {
        let mut df = df![
            "s1" => [Some(10.0), None, Some(20.0)],
        ]
        .unwrap();
        let mut r = report();

        Imputer::new(ImputationStrategy::Mean, 5)
            .impute(&mut df, &["s1".to_string()], &mut r)
            .unwrap();

        let col = df.column("s1").unwrap();
        assert_eq!(col.get(0).unwrap().try_extract::<f64>().unwrap(), 10.0);
        assert_eq!(col.get(2).unwrap().try_extract::<f64>().unwrap(), 20.0);
    }
}
