//! Application configuration
//! Window geometry and pipeline tunables, built once at startup.

/// Settings shared by the window and the conversion pipeline.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub title: String,
    pub window_size: [f32; 2],
    pub min_window_size: [f32; 2],
    /// Rows shown in each file's preview grid.
    pub preview_rows: usize,
    /// Rows scanned when inferring CSV column types.
    pub infer_schema_length: usize,
    /// Worksheet name used for exported spreadsheets.
    pub sheet_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Data Sweeper".to_string(),
            window_size: [1200.0, 850.0],
            min_window_size: [900.0, 600.0],
            preview_rows: 5,
            infer_schema_length: 10000,
            sheet_name: "Sheet1".to_string(),
        }
    }
}
