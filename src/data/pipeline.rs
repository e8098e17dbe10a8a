//! Conversion Pipeline Module
//! Per-file flow: detect -> load -> clean -> select columns -> convert.
//!
//! Every stage is a plain function over the uploaded file and an explicit
//! request, so the UI can call it again whenever a widget changes.

use super::exporter::{ExportError, TableExporter};
use super::format::TableFormat;
use super::loader::{DataLoader, LoaderError};
use super::processor::{CleaningOptions, DataProcessor, ProcessorError};
use crate::config::AppConfig;
use polars::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported file type: {extension}")]
    UnsupportedFormat { extension: String },
    #[error("Could not read {file_name}: {source}")]
    LoadFailure {
        file_name: String,
        #[source]
        source: LoaderError,
    },
    #[error("Could not prepare {file_name}: {source}")]
    Processing {
        file_name: String,
        #[source]
        source: ProcessorError,
    },
    #[error("Could not convert {file_name}: {source}")]
    ExportFailure {
        file_name: String,
        #[source]
        source: ExportError,
    },
}

/// A file handed over by the file picker.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    /// Size in kilobytes, for the file details card.
    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }
}

/// A successfully parsed upload.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub name: String,
    pub format: TableFormat,
    pub table: DataFrame,
}

/// Everything the user chose for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionRequest {
    pub cleaning: CleaningOptions,
    /// Columns to keep, in output order; `None` keeps all columns.
    pub columns: Option<Vec<String>>,
    pub target: TableFormat,
}

/// Bytes ready to download.
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Result of running one file through the whole pipeline.
#[derive(Debug)]
pub struct FileOutcome {
    pub name: String,
    pub result: Result<ConvertedFile, PipelineError>,
}

/// Detect the format and parse the file.
pub fn load_file(file: &UploadedFile, config: &AppConfig) -> Result<LoadedFile, PipelineError> {
    let format = TableFormat::from_file_name(&file.name)?;
    let table = DataLoader::load(&file.bytes, format, config.infer_schema_length).map_err(
        |source| PipelineError::LoadFailure {
            file_name: file.name.clone(),
            source,
        },
    )?;

    info!(
        file = %file.name,
        rows = table.height(),
        columns = table.width(),
        "loaded file"
    );

    Ok(LoadedFile {
        name: file.name.clone(),
        format,
        table,
    })
}

/// Apply cleaning then column selection to a loaded table.
pub fn working_table(
    loaded: &LoadedFile,
    cleaning: CleaningOptions,
    columns: Option<&[String]>,
) -> Result<DataFrame, PipelineError> {
    let processing = |source: ProcessorError| PipelineError::Processing {
        file_name: loaded.name.clone(),
        source,
    };

    let cleaned = DataProcessor::apply_cleaning(&loaded.table, cleaning).map_err(processing)?;
    let selected = match columns {
        Some(columns) => DataProcessor::select_columns(&cleaned, columns).map_err(processing)?,
        None => cleaned,
    };
    Ok(selected)
}

/// Serialize a working table to the requested format.
pub fn export_working(
    source_name: &str,
    table: &DataFrame,
    target: TableFormat,
    config: &AppConfig,
) -> Result<ConvertedFile, PipelineError> {
    let bytes = TableExporter::export(table, target, &config.sheet_name).map_err(|source| {
        PipelineError::ExportFailure {
            file_name: source_name.to_string(),
            source,
        }
    })?;

    let converted = ConvertedFile {
        file_name: TableExporter::output_file_name(source_name, target),
        mime_type: target.mime_type(),
        bytes,
    };
    info!(
        file = %source_name,
        output = %converted.file_name,
        bytes = converted.bytes.len(),
        "converted file"
    );
    Ok(converted)
}

/// Run the post-load stages of the pipeline for one file.
pub fn convert(
    loaded: &LoadedFile,
    request: &ConversionRequest,
    config: &AppConfig,
) -> Result<ConvertedFile, PipelineError> {
    let table = working_table(loaded, request.cleaning, request.columns.as_deref())?;
    export_working(&loaded.name, &table, request.target, config)
}

/// Process files in upload order; a failing file never stops the others.
///
/// Files without a matching request use the default request (all columns,
/// no cleaning, CSV output).
pub fn process_batch(
    files: &[UploadedFile],
    requests: &[ConversionRequest],
    config: &AppConfig,
) -> Vec<FileOutcome> {
    files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            let request = requests.get(i).cloned().unwrap_or_default();
            let result =
                load_file(file, config).and_then(|loaded| convert(&loaded, &request, config));
            if let Err(e) = &result {
                warn!(file = %file.name, "skipping file: {}", e);
            }
            FileOutcome {
                name: file.name.clone(),
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::format::XLSX_MIME;

    fn csv_file(name: &str, text: &str) -> UploadedFile {
        UploadedFile::new(name, text.as_bytes().to_vec())
    }

    #[test]
    fn csv_round_trips_without_changes() {
        let text = "name,score,active\nann,1.5,true\nbob,,false\ncy,2.25,true\n";
        let config = AppConfig::default();
        let loaded = load_file(&csv_file("people.csv", text), &config).unwrap();

        let out = convert(&loaded, &ConversionRequest::default(), &config).unwrap();
        assert_eq!(out.file_name, "people.csv");
        assert_eq!(out.mime_type, "text/csv");
        assert_eq!(String::from_utf8(out.bytes).unwrap(), text);
    }

    #[test]
    fn clean_select_and_export_scenario() {
        let config = AppConfig::default();
        let loaded = load_file(&csv_file("input.csv", "a,b\n1,\n1,3\n2,4"), &config).unwrap();

        let deduped = working_table(
            &loaded,
            CleaningOptions {
                remove_duplicates: true,
                fill_missing: false,
            },
            None,
        )
        .unwrap();
        assert_eq!(deduped.height(), 3);

        let request = ConversionRequest {
            cleaning: CleaningOptions {
                remove_duplicates: true,
                fill_missing: true,
            },
            columns: Some(vec!["b".to_string()]),
            target: TableFormat::Csv,
        };
        let out = convert(&loaded, &request, &config).unwrap();
        assert_eq!(String::from_utf8(out.bytes).unwrap(), "b\n3.5\n3.0\n4.0\n");
    }

    #[test]
    fn zero_columns_export_without_failure() {
        let config = AppConfig::default();
        let loaded = load_file(&csv_file("input.csv", "a,b\n1,2\n"), &config).unwrap();
        let request = ConversionRequest {
            columns: Some(Vec::new()),
            ..Default::default()
        };
        let out = convert(&loaded, &request, &config).unwrap();
        assert!(out.bytes.is_empty());

        let request = ConversionRequest {
            columns: Some(Vec::new()),
            target: TableFormat::Xlsx,
            ..Default::default()
        };
        assert!(convert(&loaded, &request, &config).is_ok());
    }

    #[test]
    fn spreadsheet_converted_to_csv_gets_csv_name_and_mime() {
        let config = AppConfig::default();
        let df = df! {
            "x" => [1i64, 2],
            "y" => ["p", "q"],
        }
        .unwrap();
        let xlsx = TableExporter::to_xlsx(&df, &config.sheet_name).unwrap();
        let loaded = load_file(&UploadedFile::new("data.xlsx", xlsx), &config).unwrap();
        assert_eq!(loaded.format, TableFormat::Xlsx);

        let out = convert(&loaded, &ConversionRequest::default(), &config).unwrap();
        assert_eq!(out.file_name, "data.csv");
        assert_eq!(out.mime_type, "text/csv");
        assert_eq!(String::from_utf8(out.bytes).unwrap(), "x,y\n1,p\n2,q\n");
    }

    #[test]
    fn csv_converted_to_spreadsheet_gets_xlsx_name_and_mime() {
        let config = AppConfig::default();
        let loaded = load_file(&csv_file("Data.CSV", "x\n1\n"), &config).unwrap();
        let request = ConversionRequest {
            target: TableFormat::Xlsx,
            ..Default::default()
        };
        let out = convert(&loaded, &request, &config).unwrap();
        assert_eq!(out.file_name, "Data.xlsx");
        assert_eq!(out.mime_type, XLSX_MIME);
        assert!(out.bytes.starts_with(b"PK"));
    }

    #[test]
    fn unsupported_file_does_not_stop_the_batch() {
        let config = AppConfig::default();
        let files = vec![
            UploadedFile::new("data.xls", vec![0xD0, 0xCF, 0x11, 0xE0]),
            csv_file("next.csv", "v\n1\n"),
        ];

        let outcomes = process_batch(&files, &[], &config);
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            &outcomes[0].result,
            Err(PipelineError::UnsupportedFormat { extension }) if extension == ".xls"
        ));
        let converted = outcomes[1].result.as_ref().unwrap();
        assert_eq!(converted.file_name, "next.csv");
    }

    #[test]
    fn corrupt_spreadsheet_is_a_load_failure() {
        let config = AppConfig::default();
        let file = UploadedFile::new("broken.xlsx", b"not a workbook".to_vec());
        assert!(matches!(
            load_file(&file, &config),
            Err(PipelineError::LoadFailure { .. })
        ));
    }

    #[test]
    fn unknown_column_is_reported_per_file() {
        let config = AppConfig::default();
        let loaded = load_file(&csv_file("input.csv", "a\n1\n"), &config).unwrap();
        let request = ConversionRequest {
            columns: Some(vec!["missing".to_string()]),
            ..Default::default()
        };
        assert!(matches!(
            convert(&loaded, &request, &config),
            Err(PipelineError::Processing { .. })
        ));
    }

    #[test]
    fn size_is_reported_in_kilobytes() {
        let file = UploadedFile::new("a.csv", vec![b'x'; 2048]);
        assert_eq!(file.size, 2048);
        assert!((file.size_kb() - 2.0).abs() < f64::EPSILON);
    }
}
