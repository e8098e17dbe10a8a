//! Table Loader Module
//! Parses uploaded CSV and XLSX bytes into Polars DataFrames.

use super::format::TableFormat;
use calamine::{Data, DataType as _, Range, Reader, Xlsx};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Largest float that still maps to an exact integer.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to parse table: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to open workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),
    #[error("Workbook contains no worksheets")]
    NoSheet,
}

/// Column type inferred from the non-empty cells of a worksheet column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Bool,
    DateTime,
    Text,
}

/// Parses raw file bytes into DataFrames.
pub struct DataLoader;

impl DataLoader {
    /// Load a table from raw bytes in the given format.
    pub fn load(
        bytes: &[u8],
        format: TableFormat,
        infer_schema_length: usize,
    ) -> Result<DataFrame, LoaderError> {
        let df = match format {
            TableFormat::Csv => Self::load_csv(bytes, infer_schema_length)?,
            TableFormat::Xlsx => Self::load_xlsx(bytes)?,
        };
        debug!(
            rows = df.height(),
            columns = df.width(),
            "parsed {} table",
            format.label()
        );
        Ok(df)
    }

    /// Load CSV bytes: comma delimiter, first row is the header.
    pub fn load_csv(bytes: &[u8], infer_schema_length: usize) -> Result<DataFrame, LoaderError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(infer_schema_length))
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()?;
        Ok(df)
    }

    /// Load the first worksheet of an XLSX workbook.
    pub fn load_xlsx(bytes: &[u8]) -> Result<DataFrame, LoaderError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;
        let range = workbook.worksheet_range_at(0).ok_or(LoaderError::NoSheet)??;
        Self::range_to_dataframe(&range)
    }

    /// Convert a worksheet range (header row first) into a DataFrame.
    fn range_to_dataframe(range: &Range<Data>) -> Result<DataFrame, LoaderError> {
        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(DataFrame::empty());
        };
        let body: Vec<&[Data]> = rows.collect();
        let names = Self::header_names(header);

        let columns: Vec<Column> = names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let cells: Vec<&Data> = body
                    .iter()
                    .map(|row| row.get(j).unwrap_or(&Data::Empty))
                    .collect();
                Self::build_column(name, &cells)
            })
            .collect();

        Ok(DataFrame::new(columns)?)
    }

    /// Header cells as unique column names.
    fn header_names(header: &[Data]) -> Vec<String> {
        let mut used: HashSet<String> = HashSet::new();
        header
            .iter()
            .enumerate()
            .map(|(j, cell)| {
                let base = match cell {
                    Data::Empty => format!("Unnamed: {}", j),
                    other => other.to_string(),
                };
                let mut name = base.clone();
                let mut n = 0;
                while used.contains(&name) {
                    name = format!("{}_duplicated_{}", base, n);
                    n += 1;
                }
                used.insert(name.clone());
                name
            })
            .collect()
    }

    fn classify(cell: &Data) -> Option<CellKind> {
        match cell {
            Data::Empty => None,
            Data::Int(_) => Some(CellKind::Int),
            Data::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
                Some(CellKind::Int)
            }
            Data::Float(_) => Some(CellKind::Float),
            Data::Bool(_) => Some(CellKind::Bool),
            Data::DateTime(_) | Data::DateTimeIso(_) => Some(CellKind::DateTime),
            _ => Some(CellKind::Text),
        }
    }

    /// Infer one kind for the whole column.
    fn infer_kind(cells: &[&Data]) -> CellKind {
        let mut kind: Option<CellKind> = None;
        for cell_kind in cells.iter().filter_map(|c| Self::classify(c)) {
            kind = Some(match (kind, cell_kind) {
                (None, k) => k,
                (Some(a), b) if a == b => a,
                (Some(CellKind::Int), CellKind::Float) | (Some(CellKind::Float), CellKind::Int) => {
                    CellKind::Float
                }
                _ => return CellKind::Text,
            });
        }
        // An all-empty column is treated as numeric, like an all-NaN column
        kind.unwrap_or(CellKind::Float)
    }

    fn build_column(name: &str, cells: &[&Data]) -> Column {
        match Self::infer_kind(cells) {
            CellKind::Int => {
                let values: Vec<Option<i64>> = cells
                    .iter()
                    .map(|c| match c {
                        Data::Int(i) => Some(*i),
                        Data::Float(f) => Some(*f as i64),
                        _ => None,
                    })
                    .collect();
                Column::new(name.into(), values)
            }
            CellKind::Float => {
                let values: Vec<Option<f64>> = cells.iter().map(|c| c.as_f64()).collect();
                Column::new(name.into(), values)
            }
            CellKind::Bool => {
                let values: Vec<Option<bool>> = cells.iter().map(|c| c.get_bool()).collect();
                Column::new(name.into(), values)
            }
            CellKind::DateTime => {
                let values: Vec<Option<NaiveDateTime>> =
                    cells.iter().map(|c| c.as_datetime()).collect();
                Column::new(name.into(), values)
            }
            CellKind::Text => {
                let values: Vec<Option<String>> = cells
                    .iter()
                    .map(|c| match c {
                        Data::Empty => None,
                        Data::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect();
                Column::new(name.into(), values)
            }
        }
    }
}
