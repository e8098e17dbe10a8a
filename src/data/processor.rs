//! Data Processor Module
//! Handles data cleaning (duplicates, missing values) and column selection.

use polars::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

/// Cleaning steps requested for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleaningOptions {
    pub remove_duplicates: bool,
    pub fill_missing: bool,
}

/// Value-returning cleaning and selection operations.
pub struct DataProcessor;

impl DataProcessor {
    /// Whether a dtype counts as numeric for filling and charting.
    pub fn is_numeric(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    /// Names of numeric columns, in column order.
    pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|col| Self::is_numeric(col.dtype()))
            .map(|col| col.name().to_string())
            .collect()
    }

    /// All column names, in column order.
    pub fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Drop rows that repeat an earlier row across all columns.
    ///
    /// The first occurrence is kept and row order is preserved.
    pub fn remove_duplicates(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        if df.width() == 0 {
            return Ok(df.clone());
        }
        Ok(df.unique_stable(None, UniqueKeepStrategy::First, None)?)
    }

    /// Replace missing values in numeric columns with the column mean.
    ///
    /// Filled columns become Float64. Columns without missing values and
    /// non-numeric columns are returned untouched.
    pub fn fill_missing_numeric(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let fills: Vec<Expr> = df
            .get_columns()
            .iter()
            .filter(|c| Self::is_numeric(c.dtype()) && c.null_count() > 0)
            .map(|c| {
                let name = c.name().as_str();
                col(name)
                    .cast(DataType::Float64)
                    .fill_null(col(name).cast(DataType::Float64).mean())
            })
            .collect();

        if fills.is_empty() {
            return Ok(df.clone());
        }

        let filled = df.clone().lazy().with_columns(fills).collect()?;
        Ok(filled)
    }

    /// Apply the requested cleaning steps: duplicates first, then fill.
    pub fn apply_cleaning(
        df: &DataFrame,
        options: CleaningOptions,
    ) -> Result<DataFrame, ProcessorError> {
        let mut current = df.clone();
        if options.remove_duplicates {
            current = Self::remove_duplicates(&current)?;
        }
        if options.fill_missing {
            current = Self::fill_missing_numeric(&current)?;
        }
        Ok(current)
    }

    /// Keep exactly the chosen columns, in the chosen order.
    ///
    /// Repeated names keep their first position. An empty selection yields a
    /// table with no columns.
    pub fn select_columns(df: &DataFrame, columns: &[String]) -> Result<DataFrame, ProcessorError> {
        let mut chosen: Vec<&str> = Vec::with_capacity(columns.len());
        for name in columns {
            if chosen.contains(&name.as_str()) {
                continue;
            }
            if df.column(name).is_err() {
                return Err(ProcessorError::UnknownColumn(name.clone()));
            }
            chosen.push(name.as_str());
        }

        if chosen.is_empty() {
            return Ok(DataFrame::empty());
        }
        Ok(df.select(chosen)?)
    }
}
