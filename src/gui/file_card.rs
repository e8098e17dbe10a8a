//! File Card Widget
//! Per-file panel: details, preview, cleaning, column choice, chart, conversion.

use crate::charts::{BarSeries, ChartPlotter};
use crate::config::AppConfig;
use crate::data::{
    export_working, load_file, working_table, CleaningOptions, ConversionRequest, ConvertedFile,
    DataProcessor, LoadedFile, TableFormat, UploadedFile,
};
use egui::{Color32, RichText, ScrollArea};
use polars::prelude::*;
use tracing::{error, info};

const ERROR_COLOR: Color32 = Color32::from_rgb(220, 53, 69);
const SUCCESS_COLOR: Color32 = Color32::from_rgb(40, 167, 69);

/// Message shown under a card's controls.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// Working table cached together with the options it was built from.
struct Working {
    cleaning: CleaningOptions,
    columns: Vec<String>,
    table: DataFrame,
    series: Vec<BarSeries>,
}

/// Actions a card asks the main window to perform
#[derive(Debug, Clone, PartialEq)]
pub enum CardAction {
    None,
    Download,
    Remove,
}

/// One uploaded file and the user's choices for it.
pub struct FileCard {
    pub id: usize,
    pub upload: UploadedFile,
    loaded: Result<LoadedFile, String>,
    pub clean_enabled: bool,
    pub cleaning: CleaningOptions,
    /// Chosen columns, in output order.
    pub selected: Vec<String>,
    pub show_chart: bool,
    pub target: TableFormat,
    working: Option<Working>,
    pub converted: Option<ConvertedFile>,
    pub notice: Option<Notice>,
}

impl FileCard {
    /// Load the upload; a failure is kept and shown on the card.
    pub fn new(id: usize, upload: UploadedFile, config: &AppConfig) -> Self {
        let loaded = load_file(&upload, config).map_err(|e| {
            error!(file = %upload.name, "{}", e);
            e.to_string()
        });
        let selected = loaded
            .as_ref()
            .map(|l| DataProcessor::column_names(&l.table))
            .unwrap_or_default();

        Self {
            id,
            upload,
            loaded,
            clean_enabled: false,
            cleaning: CleaningOptions::default(),
            selected,
            show_chart: false,
            target: TableFormat::default(),
            working: None,
            converted: None,
            notice: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_ok()
    }

    pub fn detected_format(&self) -> Option<TableFormat> {
        self.loaded.as_ref().ok().map(|l| l.format)
    }

    /// Cleaning actually in effect: nothing unless "Clean Data" is ticked.
    fn effective_cleaning(&self) -> CleaningOptions {
        if self.clean_enabled {
            self.cleaning
        } else {
            CleaningOptions::default()
        }
    }

    /// The request described by the current widget values.
    pub fn request(&self) -> ConversionRequest {
        ConversionRequest {
            cleaning: self.effective_cleaning(),
            columns: Some(self.selected.clone()),
            target: self.target,
        }
    }

    /// Rebuild the working table if the cleaning or column choice changed.
    fn refresh_working(&mut self) {
        let Ok(loaded) = &self.loaded else {
            return;
        };
        let cleaning = self.effective_cleaning();
        let up_to_date = self
            .working
            .as_ref()
            .is_some_and(|w| w.cleaning == cleaning && w.columns == self.selected);
        if up_to_date {
            return;
        }

        self.converted = None;
        match working_table(loaded, cleaning, Some(&self.selected)) {
            Ok(table) => {
                let series = ChartPlotter::bar_series(&table);
                if matches!(self.notice, Some(Notice::Error(_))) {
                    self.notice = None;
                }
                self.working = Some(Working {
                    cleaning,
                    columns: self.selected.clone(),
                    table,
                    series,
                });
            }
            Err(e) => {
                error!(file = %self.upload.name, "{}", e);
                self.working = None;
                self.notice = Some(Notice::Error(e.to_string()));
            }
        }
    }

    fn convert(&mut self, config: &AppConfig) {
        let Some(working) = &self.working else {
            return;
        };
        match export_working(&self.upload.name, &working.table, self.target, config) {
            Ok(converted) => {
                self.notice = Some(Notice::Success(format!(
                    "Converted to {} ({})",
                    converted.file_name, converted.mime_type
                )));
                self.converted = Some(converted);
            }
            Err(e) => {
                error!(file = %self.upload.name, "{}", e);
                self.converted = None;
                self.notice = Some(Notice::Error(e.to_string()));
            }
        }
    }

    /// Draw the card
    pub fn show(&mut self, ui: &mut egui::Ui, config: &AppConfig) -> CardAction {
        let mut action = CardAction::None;
        self.refresh_working();

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(10.0)
            .inner_margin(16.0)
            .show(ui, |ui| {
                ui.push_id(self.id, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(RichText::new("File Details").size(16.0).strong());
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.small_button("✖ Remove").clicked() {
                                action = CardAction::Remove;
                            }
                        });
                    });
                    ui.label(format!("File Name: {}", self.upload.name));
                    ui.label(format!("File Size: {:.2} KB", self.upload.size_kb()));
                    if let Some(format) = self.detected_format() {
                        ui.label(format!("Detected Format: {}", format.label()));
                    }
                    ui.add_space(8.0);

                    match &self.loaded {
                        Err(message) => {
                            ui.label(RichText::new(message).color(ERROR_COLOR));
                        }
                        Ok(loaded) => {
                            Self::section(ui, "Preview the Head of the Dataframe");
                            Self::draw_preview(ui, &loaded.table, config.preview_rows);
                            if self.show_controls(ui, config) {
                                action = CardAction::Download;
                            }
                        }
                    }
                });
            });

        action
    }

    /// Cleaning, columns, chart and conversion controls. Returns true when
    /// the download button was clicked.
    fn show_controls(&mut self, ui: &mut egui::Ui, config: &AppConfig) -> bool {
        let name = self.upload.name.clone();
        let mut download = false;

        // ===== Cleaning =====
        Self::section(ui, "Data Cleaning Options");
        ui.checkbox(&mut self.clean_enabled, format!("Clean Data for {}", name));
        if self.clean_enabled {
            ui.horizontal(|ui| {
                if ui
                    .button(format!("Remove Duplicates from {}", name))
                    .clicked()
                {
                    self.cleaning.remove_duplicates = true;
                    self.notice = Some(Notice::Success("Duplicates Removed!".to_string()));
                    info!(file = %name, "duplicate removal enabled");
                }
                if ui
                    .button(format!("Fill Missing Values for {}", name))
                    .clicked()
                {
                    self.cleaning.fill_missing = true;
                    self.notice = Some(Notice::Success(
                        "Missing Values have been Filled!".to_string(),
                    ));
                    info!(file = %name, "missing value fill enabled");
                }
            });
        }

        // ===== Columns =====
        Self::section(ui, "Select Columns to Convert");
        self.draw_column_picker(ui, &name);

        // ===== Visualization =====
        Self::section(ui, "Data Visualization");
        ui.checkbox(&mut self.show_chart, format!("Show Visualization for {}", name));
        if self.show_chart {
            if let Some(working) = &self.working {
                ChartPlotter::draw_bar_chart(ui, &name, &working.series);
            }
        }

        // ===== Conversion =====
        Self::section(ui, "Conversion Options");
        ui.horizontal(|ui| {
            ui.label(format!("Convert {} to:", name));
            for format in TableFormat::ALL {
                if ui
                    .radio_value(&mut self.target, format, format.label())
                    .changed()
                {
                    self.converted = None;
                }
            }
        });

        ui.add_space(5.0);
        ui.horizontal(|ui| {
            let ready = self.working.is_some();
            ui.add_enabled_ui(ready, |ui| {
                if ui.button(format!("Convert {}", name)).clicked() {
                    self.convert(config);
                }
            });

            if let Some(converted) = &self.converted {
                let label = format!("Download {} as {}", name, self.target.label());
                if ui.button(RichText::new(label).strong()).clicked() {
                    download = true;
                }
                ui.label(RichText::new(converted.mime_type).size(11.0).color(Color32::GRAY));
            }
        });

        if let Some(notice) = &self.notice {
            ui.add_space(5.0);
            match notice {
                Notice::Success(text) => ui.colored_label(SUCCESS_COLOR, text),
                Notice::Error(text) => ui.colored_label(ERROR_COLOR, text),
            };
        }

        download
    }

    /// Checkbox per column; ticking appends the column to the output order.
    fn draw_column_picker(&mut self, ui: &mut egui::Ui, name: &str) {
        let Ok(loaded) = &self.loaded else {
            return;
        };
        let all_columns = DataProcessor::column_names(&loaded.table);

        ui.label(format!("Choose Columns for {}", name));
        egui::Frame::none()
            .fill(ui.visuals().extreme_bg_color)
            .rounding(5.0)
            .inner_margin(5.0)
            .show(ui, |ui| {
                ScrollArea::vertical()
                    .id_salt("columns")
                    .max_height(120.0)
                    .show(ui, |ui| {
                        for column in &all_columns {
                            let mut checked = self.selected.contains(column);
                            if ui.checkbox(&mut checked, column).changed() {
                                if checked {
                                    self.selected.push(column.clone());
                                } else {
                                    self.selected.retain(|c| c != column);
                                }
                            }
                        }
                    });
            });

        ui.horizontal(|ui| {
            if ui.small_button("Select All").clicked() {
                self.selected = all_columns.clone();
            }
            if ui.small_button("Clear All").clicked() {
                self.selected.clear();
            }
        });

        let order = if self.selected.is_empty() {
            "(no columns)".to_string()
        } else {
            self.selected.join(", ")
        };
        ui.label(RichText::new(format!("Output order: {}", order)).size(11.0).color(Color32::GRAY));
    }

    /// First rows of the loaded table as a striped grid.
    fn draw_preview(ui: &mut egui::Ui, df: &DataFrame, rows: usize) {
        if df.width() == 0 {
            ui.label("No columns.");
            return;
        }
        let head = df.head(Some(rows));

        ScrollArea::horizontal().id_salt("preview").show(ui, |ui| {
            egui::Grid::new("preview_grid")
                .striped(true)
                .min_col_width(60.0)
                .spacing([12.0, 4.0])
                .show(ui, |ui| {
                    for column in head.get_columns() {
                        ui.label(RichText::new(column.name().as_str()).strong().size(12.0));
                    }
                    ui.end_row();

                    for i in 0..head.height() {
                        for column in head.get_columns() {
                            let text = match column.get(i) {
                                Ok(AnyValue::Null) | Err(_) => String::new(),
                                Ok(value) => value.to_string().trim_matches('"').to_string(),
                            };
                            ui.label(RichText::new(text).size(12.0));
                        }
                        ui.end_row();
                    }
                });
        });
        ui.label(
            RichText::new(format!("{} rows × {} columns", df.height(), df.width()))
                .size(11.0)
                .color(Color32::GRAY),
        );
    }

    fn section(ui: &mut egui::Ui, title: &str) {
        ui.add_space(10.0);
        ui.label(
            RichText::new(title)
                .size(15.0)
                .strong()
                .color(Color32::from_rgb(46, 134, 193)),
        );
        ui.add_space(4.0);
    }
}
