//! Data module - format detection, loading, cleaning and export

mod exporter;
mod format;
mod loader;
mod pipeline;
mod processor;

pub use format::TableFormat;
pub use pipeline::{
    export_working, load_file, process_batch, working_table, ConversionRequest, ConvertedFile,
    LoadedFile, UploadedFile,
};
pub use processor::{CleaningOptions, DataProcessor};
