//! Table Exporter Module
//! Serializes DataFrames to CSV (Polars writer) or XLSX (direct ZIP/XML).
//!
//! The XLSX package is the minimal SpreadsheetML set: content types,
//! relationships, workbook, styles and a single worksheet using inline
//! strings, so no shared-string table is needed.

use super::format::TableFormat;
use super::processor::DataProcessor;
use polars::prelude::*;
use std::io::{Cursor, Write};
use std::path::Path;
use thiserror::Error;
use ::zip::write::FileOptions;
use ::zip::{CompressionMethod, ZipWriter};

/// Days between the Excel epoch (1899-12-30) and the Unix epoch.
const EXCEL_EPOCH_OFFSET: f64 = 25569.0;

/// Style indices into `cellXfs` in styles.xml.
const DATE_STYLE: u32 = 1;
const DATETIME_STYLE: u32 = 2;

/// Worksheet limits, header row included.
const MAX_SHEET_ROWS: usize = 1_048_576;
const MAX_SHEET_COLUMNS: usize = 16_384;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize table: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to write workbook: {0}")]
    Zip(#[from] ::zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Column '{column}' row {row} contains a character not allowed in a worksheet")]
    IllegalCharacter { column: String, row: usize },
    #[error("Table of {rows} rows x {columns} columns is too large for a worksheet")]
    SheetTooLarge { rows: usize, columns: usize },
}

/// One worksheet column, already converted to cell values.
enum CellColumn {
    Number(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Date { serials: Vec<Option<f64>>, style: u32 },
    Text(Vec<Option<String>>),
}

/// Serializes tables into downloadable bytes.
pub struct TableExporter;

impl TableExporter {
    /// Serialize a table in the target format, without an index column.
    pub fn export(
        df: &DataFrame,
        format: TableFormat,
        sheet_name: &str,
    ) -> Result<Vec<u8>, ExportError> {
        match format {
            TableFormat::Csv => Self::to_csv(df),
            TableFormat::Xlsx => Self::to_xlsx(df, sheet_name),
        }
    }

    /// Suggested download name: the original suffix swapped for the target's.
    pub fn output_file_name(original: &str, format: TableFormat) -> String {
        let stem = Path::new(original)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| original.to_string());
        format!("{}{}", stem, format.extension())
    }

    pub fn to_csv(df: &DataFrame) -> Result<Vec<u8>, ExportError> {
        if df.width() == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = Vec::new();
        let mut df = df.clone();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut df)?;
        Ok(buffer)
    }

    pub fn to_xlsx(df: &DataFrame, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
        Self::check_sheet_size(df.height(), df.width())?;
        let sheet = Self::sheet_xml(df)?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(Self::content_types_xml().as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(Self::rels_xml().as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(Self::workbook_xml(sheet_name).as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(Self::workbook_rels_xml().as_bytes())?;

        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(Self::styles_xml().as_bytes())?;

        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        zip.write_all(sheet.as_bytes())?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Data rows plus the header row must fit in one worksheet.
    fn check_sheet_size(rows: usize, columns: usize) -> Result<(), ExportError> {
        if rows + 1 > MAX_SHEET_ROWS || columns > MAX_SHEET_COLUMNS {
            return Err(ExportError::SheetTooLarge { rows, columns });
        }
        Ok(())
    }

    /// Convert a column into worksheet cell values.
    fn cell_column(column: &Column) -> Result<CellColumn, ExportError> {
        let dtype = column.dtype();
        if DataProcessor::is_numeric(dtype) {
            let floats = column.cast(&DataType::Float64)?;
            let values = floats
                .f64()?
                .into_iter()
                .map(|v| v.filter(|f| f.is_finite()))
                .collect();
            return Ok(CellColumn::Number(values));
        }

        match dtype {
            DataType::Boolean => Ok(CellColumn::Bool(column.bool()?.into_iter().collect())),
            DataType::Date => {
                let days = column.cast(&DataType::Int32)?;
                let serials = days
                    .i32()?
                    .into_iter()
                    .map(|d| d.map(|d| d as f64 + EXCEL_EPOCH_OFFSET))
                    .collect();
                Ok(CellColumn::Date {
                    serials,
                    style: DATE_STYLE,
                })
            }
            DataType::Datetime(unit, _) => {
                let per_day = match unit {
                    TimeUnit::Nanoseconds => 86_400_000_000_000.0,
                    TimeUnit::Microseconds => 86_400_000_000.0,
                    TimeUnit::Milliseconds => 86_400_000.0,
                };
                let raw = column.cast(&DataType::Int64)?;
                let serials = raw
                    .i64()?
                    .into_iter()
                    .map(|v| v.map(|v| v as f64 / per_day + EXCEL_EPOCH_OFFSET))
                    .collect();
                Ok(CellColumn::Date {
                    serials,
                    style: DATETIME_STYLE,
                })
            }
            _ => {
                let text = column.cast(&DataType::String)?;
                let values = text
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect();
                Ok(CellColumn::Text(values))
            }
        }
    }

    fn sheet_xml(df: &DataFrame) -> Result<String, ExportError> {
        let names = DataProcessor::column_names(df);
        let columns = df
            .get_columns()
            .iter()
            .map(Self::cell_column)
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = String::new();

        if !names.is_empty() {
            rows.push_str(r#"<row r="1">"#);
            for (j, name) in names.iter().enumerate() {
                Self::check_text(name, name, 1)?;
                Self::push_text_cell(&mut rows, j, 1, name);
            }
            rows.push_str("</row>");
        }

        for i in 0..df.height() {
            let r = i + 2;
            rows.push_str(&format!(r#"<row r="{}">"#, r));
            for (j, column) in columns.iter().enumerate() {
                let cell_ref = format!("{}{}", Self::column_letter(j), r);
                match column {
                    CellColumn::Number(values) => {
                        if let Some(v) = values[i] {
                            rows.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, cell_ref, v));
                        }
                    }
                    CellColumn::Bool(values) => {
                        if let Some(b) = values[i] {
                            rows.push_str(&format!(
                                r#"<c r="{}" t="b"><v>{}</v></c>"#,
                                cell_ref,
                                u8::from(b)
                            ));
                        }
                    }
                    CellColumn::Date { serials, style } => {
                        if let Some(v) = serials[i] {
                            rows.push_str(&format!(
                                r#"<c r="{}" s="{}"><v>{}</v></c>"#,
                                cell_ref, style, v
                            ));
                        }
                    }
                    CellColumn::Text(values) => {
                        if let Some(s) = &values[i] {
                            Self::check_text(s, &names[j], r)?;
                            Self::push_text_cell(&mut rows, j, r, s);
                        }
                    }
                }
            }
            rows.push_str("</row>");
        }

        Ok(format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheetData>{}</sheetData>
</worksheet>"#,
            rows
        ))
    }

    fn push_text_cell(out: &mut String, col: usize, row: usize, text: &str) {
        out.push_str(&format!(
            r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            Self::column_letter(col),
            row,
            Self::escape_xml(text)
        ));
    }

    /// Reject characters XML 1.0 cannot carry.
    fn check_text(text: &str, column: &str, row: usize) -> Result<(), ExportError> {
        let illegal = text.chars().any(|c| {
            matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
        });
        if illegal {
            return Err(ExportError::IllegalCharacter {
                column: column.to_string(),
                row,
            });
        }
        Ok(())
    }

    fn escape_xml(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;")
    }

    /// Zero-based column index to a spreadsheet column name (0 -> A, 26 -> AA).
    fn column_letter(index: usize) -> String {
        let mut n = index + 1;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        letters.iter().rev().collect()
    }

    fn content_types_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#
    }

    fn rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
    }

    fn workbook_xml(sheet_name: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
            Self::escape_xml(sheet_name)
        )
    }

    fn workbook_rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#
    }

    /// Default style plus date (numFmt 14) and date-time (numFmt 22) styles.
    fn styles_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="3">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
</cellXfs>
<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::DataLoader;
    use chrono::NaiveDate;

    #[test]
    fn csv_export_has_header_and_no_index() {
        let df = df! {
            "b" => [3.5f64, 3.0, 4.0],
        }
        .unwrap();
        let bytes = TableExporter::export(&df, TableFormat::Csv, "Sheet1").unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "b\n3.5\n3.0\n4.0\n");
    }

    #[test]
    fn csv_export_of_zero_columns_is_empty() {
        let bytes = TableExporter::to_csv(&DataFrame::empty()).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn xlsx_export_loads_back() {
        let df = df! {
            "city" => [Some("Oslo"), None, Some("R&D <lab>")],
            "count" => [Some(3i64), Some(5), None],
            "ratio" => [0.5f64, 1.25, 2.0],
            "active" => [true, false, true],
        }
        .unwrap();

        let bytes = TableExporter::to_xlsx(&df, "Sheet1").unwrap();
        let back = DataLoader::load_xlsx(&bytes).unwrap();

        assert_eq!(
            DataProcessor::column_names(&back),
            vec!["city", "count", "ratio", "active"]
        );
        assert_eq!(back.height(), 3);

        let city: Vec<Option<&str>> = back.column("city").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(city, vec![Some("Oslo"), None, Some("R&D <lab>")]);

        assert_eq!(back.column("count").unwrap().dtype(), &DataType::Int64);
        assert_eq!(back.column("count").unwrap().null_count(), 1);

        let ratio: Vec<Option<f64>> = back.column("ratio").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(ratio, vec![Some(0.5), Some(1.25), Some(2.0)]);

        assert_eq!(back.column("active").unwrap().dtype(), &DataType::Boolean);
    }

    #[test]
    fn xlsx_dates_export_as_serials_and_load_back() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let noon = day.and_hms_opt(12, 0, 0).unwrap();
        let df = df! {
            "day" => [day],
            "at" => [noon],
        }
        .unwrap();
        assert_eq!(df.column("day").unwrap().dtype(), &DataType::Date);
        assert!(matches!(df.column("at").unwrap().dtype(), DataType::Datetime(_, _)));

        let bytes = TableExporter::to_xlsx(&df, "Sheet1").unwrap();
        let back = DataLoader::load_xlsx(&bytes).unwrap();

        let millis = |name: &str| -> Option<i64> {
            back.column(name)
                .unwrap()
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .unwrap()
                .cast(&DataType::Int64)
                .unwrap()
                .i64()
                .unwrap()
                .get(0)
        };
        assert!(matches!(back.column("day").unwrap().dtype(), DataType::Datetime(_, _)));
        assert!(matches!(back.column("at").unwrap().dtype(), DataType::Datetime(_, _)));
        assert_eq!(millis("day"), Some(day.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp_millis()));
        assert_eq!(millis("at"), Some(noon.and_utc().timestamp_millis()));
    }

    #[test]
    fn too_many_columns_fail_xlsx_export() {
        let columns: Vec<Column> = (0..16_385)
            .map(|i| Column::new(format!("c{}", i).into(), vec![1i64]))
            .collect();
        let df = DataFrame::new(columns).unwrap();

        match TableExporter::to_xlsx(&df, "Sheet1") {
            Err(ExportError::SheetTooLarge { rows, columns }) => {
                assert_eq!(rows, 1);
                assert_eq!(columns, 16_385);
            }
            other => panic!("expected SheetTooLarge, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn sheet_limits_count_the_header_row() {
        assert!(TableExporter::check_sheet_size(1_048_575, 16_384).is_ok());
        assert!(matches!(
            TableExporter::check_sheet_size(1_048_576, 1),
            Err(ExportError::SheetTooLarge { .. })
        ));
    }

    #[test]
    fn xlsx_export_of_zero_columns_is_a_valid_empty_workbook() {
        let bytes = TableExporter::to_xlsx(&DataFrame::empty(), "Sheet1").unwrap();
        let back = DataLoader::load_xlsx(&bytes).unwrap();
        assert_eq!(back.width(), 0);
    }

    #[test]
    fn control_characters_fail_xlsx_export() {
        let df = df! {
            "note" => ["fine", "bell\u{7}"],
        }
        .unwrap();

        match TableExporter::to_xlsx(&df, "Sheet1") {
            Err(ExportError::IllegalCharacter { column, row }) => {
                assert_eq!(column, "note");
                assert_eq!(row, 3);
            }
            other => panic!("expected IllegalCharacter, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn output_name_swaps_suffix() {
        assert_eq!(
            TableExporter::output_file_name("data.xlsx", TableFormat::Csv),
            "data.csv"
        );
        assert_eq!(
            TableExporter::output_file_name("Sales.2024.CSV", TableFormat::Xlsx),
            "Sales.2024.xlsx"
        );
        assert_eq!(
            TableExporter::output_file_name("notes", TableFormat::Csv),
            "notes.csv"
        );
    }

    #[test]
    fn column_letters_roll_over() {
        assert_eq!(TableExporter::column_letter(0), "A");
        assert_eq!(TableExporter::column_letter(25), "Z");
        assert_eq!(TableExporter::column_letter(26), "AA");
        assert_eq!(TableExporter::column_letter(701), "ZZ");
        assert_eq!(TableExporter::column_letter(702), "AAA");
    }
}
