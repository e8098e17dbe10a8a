//! File Format Module
//! Maps file names to the two supported tabular formats.

use super::pipeline::PipelineError;
use std::path::Path;

/// MIME type for exported spreadsheets.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Supported tabular file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    /// Comma-separated text
    #[default]
    Csv,
    /// Office Open XML workbook
    Xlsx,
}

impl TableFormat {
    pub const ALL: [TableFormat; 2] = [TableFormat::Csv, TableFormat::Xlsx];

    /// Detect the format from a file name suffix (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, PipelineError> {
        let extension = file_extension(name);
        match extension.as_str() {
            ".csv" => Ok(TableFormat::Csv),
            ".xlsx" => Ok(TableFormat::Xlsx),
            _ => Err(PipelineError::UnsupportedFormat { extension }),
        }
    }

    /// Canonical suffix, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => ".csv",
            TableFormat::Xlsx => ".xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TableFormat::Csv => "text/csv",
            TableFormat::Xlsx => XLSX_MIME,
        }
    }

    /// Label shown in the conversion radio buttons.
    pub fn label(&self) -> &'static str {
        match self {
            TableFormat::Csv => "CSV",
            TableFormat::Xlsx => "Excel",
        }
    }
}

/// Lowercased suffix of a file name with its leading dot, or an empty string.
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_supported_suffixes_case_insensitively() {
        assert_eq!(TableFormat::from_file_name("data.csv").unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_file_name("DATA.CSV").unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_file_name("report.Xlsx").unwrap(), TableFormat::Xlsx);
        assert_eq!(
            TableFormat::from_file_name("archive.2024.xlsx").unwrap(),
            TableFormat::Xlsx
        );
    }

    #[test]
    fn rejects_legacy_excel_and_missing_suffix() {
        match TableFormat::from_file_name("data.xls") {
            Err(PipelineError::UnsupportedFormat { extension }) => assert_eq!(extension, ".xls"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
        match TableFormat::from_file_name("README") {
            Err(PipelineError::UnsupportedFormat { extension }) => assert_eq!(extension, ""),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn formats_know_their_suffix_and_mime_type() {
        assert_eq!(TableFormat::Csv.extension(), ".csv");
        assert_eq!(TableFormat::Csv.mime_type(), "text/csv");
        assert_eq!(TableFormat::Xlsx.extension(), ".xlsx");
        assert_eq!(TableFormat::Xlsx.mime_type(), XLSX_MIME);
    }
}
