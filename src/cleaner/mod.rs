//! Data cleaning stage: outlier handling followed by imputation.
//!
//! Only numeric feature columns are touched. The join key and any text
//! columns pass through the cleaner unchanged.

mod imputers;
mod outliers;

pub use imputers::Imputer;
pub use outliers::OutlierHandler;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::report::RunReport;
use polars::prelude::*;
use tracing::info;

/// Runs the cleaning stage over a table.
pub struct Cleaner<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Cleaner<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Handle outliers, then impute what is missing.
    pub fn clean(&self, df: &mut DataFrame, report: &mut RunReport) -> Result<()> {
        let columns = numeric_feature_columns(df, &self.config.join_key);
        info!(
            columns = columns.len(),
            policy = ?self.config.outlier_policy,
            strategy = ?self.config.imputation,
            "Cleaning numeric feature columns"
        );

        OutlierHandler::new(self.config.outlier_multiplier, self.config.outlier_policy)
            .handle(df, &columns, report)?;

        Imputer::new(self.config.imputation, self.config.model_neighbors)
            .impute(df, &columns, report)?;

        Ok(())
    }
}

/// Numeric columns eligible for cleaning and normalization.
///
/// The join key is an identifier, not a measurement, so it is excluded
/// even when its dtype is numeric.
pub fn numeric_feature_columns(df: &DataFrame, join_key: &str) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| col.name() != join_key && is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

/// Check if a DataType is numeric.
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}
