//! Data Sweeper Main Application
//! Upload area, one card per file in upload order, batch conversion.

use crate::config::AppConfig;
use crate::data::{process_batch, ConvertedFile, UploadedFile};
use crate::gui::{CardAction, FileCard, Notice};
use anyhow::{Context, Result};
use egui::{Color32, RichText};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main application window.
pub struct SweeperApp {
    config: AppConfig,
    cards: Vec<FileCard>,
    next_id: usize,
    status: String,
}

impl SweeperApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        Self {
            config,
            cards: Vec::new(),
            next_id: 0,
            status: "Ready".to_string(),
        }
    }

    /// Parse a new upload and append its card.
    fn add_upload(&mut self, upload: UploadedFile) {
        info!(file = %upload.name, size = upload.size, "file uploaded");
        let card = FileCard::new(self.next_id, upload, &self.config);
        self.next_id += 1;
        self.cards.push(card);
    }

    /// Handle the upload dialog
    fn handle_browse(&mut self) {
        let Some(paths) = rfd::FileDialog::new()
            .add_filter("CSV or Excel", &["csv", "xlsx"])
            .pick_files()
        else {
            return;
        };

        for path in paths {
            match read_upload(&path) {
                Ok(upload) => self.add_upload(upload),
                Err(e) => {
                    warn!("{:#}", e);
                    self.status = format!("Error: {:#}", e);
                }
            }
        }
    }

    /// Pick up files dropped onto the window.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        for file in dropped {
            let upload = if let Some(bytes) = &file.bytes {
                Ok(UploadedFile::new(file.name.clone(), bytes.to_vec()))
            } else if let Some(path) = &file.path {
                read_upload(path)
            } else {
                continue;
            };

            match upload {
                Ok(upload) => self.add_upload(upload),
                Err(e) => {
                    warn!("{:#}", e);
                    self.status = format!("Error: {:#}", e);
                }
            }
        }
    }

    /// Save one converted file through a save dialog.
    fn handle_download(&mut self, index: usize) {
        let Some(card) = self.cards.get_mut(index) else {
            return;
        };
        let Some(converted) = card.converted.clone() else {
            return;
        };

        let extension = card.target.extension().trim_start_matches('.');
        let Some(path) = rfd::FileDialog::new()
            .add_filter(card.target.label(), &[extension])
            .set_file_name(&converted.file_name)
            .save_file()
        else {
            return; // User cancelled
        };

        card.notice = Some(match save_converted(&converted, &path) {
            Ok(()) => Notice::Success(format!("Saved {}", path.display())),
            Err(e) => {
                warn!("{:#}", e);
                Notice::Error(format!("{:#}", e))
            }
        });
    }

    /// Convert every loaded file with its current options into one folder.
    fn handle_convert_all(&mut self) {
        let Some(folder) = rfd::FileDialog::new().pick_folder() else {
            return;
        };

        let cards: Vec<&mut FileCard> = self.cards.iter_mut().filter(|c| c.is_loaded()).collect();
        let uploads: Vec<UploadedFile> = cards.iter().map(|c| c.upload.clone()).collect();
        let requests: Vec<_> = cards.iter().map(|c| c.request()).collect();
        let outcomes = process_batch(&uploads, &requests, &self.config);

        let mut saved = 0;
        let mut failed = 0;
        let mut taken = HashSet::new();
        for (card, outcome) in cards.into_iter().zip(outcomes) {
            let written = outcome.result.map_err(anyhow::Error::from).and_then(|converted| {
                let path = unique_output_path(&folder, &converted.file_name, &mut taken);
                save_converted(&converted, &path).map(|()| path)
            });
            card.notice = Some(match written {
                Ok(path) => {
                    saved += 1;
                    Notice::Success(format!("Saved {}", path.display()))
                }
                Err(e) => {
                    failed += 1;
                    warn!(file = %outcome.name, "{:#}", e);
                    Notice::Error(format!("{:#}", e))
                }
            });
        }

        self.status = format!("Converted {} file(s), {} failed", saved, failed);
    }

    fn show_header(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(10.0);
            ui.label(
                RichText::new("Data Sweeper")
                    .size(34.0)
                    .strong()
                    .color(Color32::from_rgb(79, 139, 249)),
            );
            ui.label(
                RichText::new(
                    "Transform your files between CSV and Excel formats with built-in data cleaning and visualization!",
                )
                .size(14.0)
                .color(Color32::GRAY),
            );
            ui.add_space(12.0);

            ui.horizontal(|ui| {
                if ui.button("📂 Upload your files (CSV or Excel)").clicked() {
                    self.handle_browse();
                }
                let any_loaded = self.cards.iter().any(|c| c.is_loaded());
                ui.add_enabled_ui(any_loaded, |ui| {
                    if ui.button("⬇ Convert All").clicked() {
                        self.handle_convert_all();
                    }
                });
            });
            ui.label(RichText::new("…or drop files onto this window").size(11.0).color(Color32::GRAY));
            ui.label(RichText::new(&self.status).size(11.0).color(if self.status.starts_with("Error") {
                Color32::from_rgb(220, 53, 69)
            } else {
                Color32::GRAY
            }));
        });
        ui.add_space(10.0);
        ui.separator();
    }
}

/// Read a file from disk as an upload.
fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile::new(name, bytes))
}

/// Path in `folder` for `file_name` not yet used in this batch.
/// Repeats become `name (1).ext`, `name (2).ext`, ...
fn unique_output_path(folder: &Path, file_name: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let mut path = folder.join(file_name);
    let original = Path::new(file_name);
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let extension = original.extension().map(|e| e.to_string_lossy().to_string());

    let mut n = 1;
    while taken.contains(&path) {
        let candidate = match &extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        path = folder.join(candidate);
        n += 1;
    }
    taken.insert(path.clone());
    path
}

/// Write converted bytes to disk.
fn save_converted(converted: &ConvertedFile, path: &Path) -> Result<()> {
    std::fs::write(path, &converted.bytes)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = converted.bytes.len(), "saved converted file");
    Ok(())
}

impl eframe::App for SweeperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.set_max_width(1100.0);
                    self.show_header(ui);

                    let mut download = None;
                    let mut remove = None;

                    // Files are handled strictly in upload order
                    for (index, card) in self.cards.iter_mut().enumerate() {
                        ui.add_space(12.0);
                        match card.show(ui, &self.config) {
                            CardAction::Download => download = Some(index),
                            CardAction::Remove => remove = Some(index),
                            CardAction::None => {}
                        }
                    }

                    if let Some(index) = download {
                        self.handle_download(index);
                    }
                    if let Some(index) = remove {
                        let card = self.cards.remove(index);
                        info!(file = %card.upload.name, "file removed");
                    }

                    if !self.cards.is_empty() {
                        ui.add_space(16.0);
                        egui::Frame::none()
                            .fill(Color32::from_rgb(213, 245, 227))
                            .rounding(5.0)
                            .inner_margin(10.0)
                            .show(ui, |ui| {
                                ui.label(
                                    RichText::new("All files processed! 🎉")
                                        .color(Color32::from_rgb(20, 90, 50)),
                                );
                            });
                    }
                    ui.add_space(20.0);
                });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_outputs_with_the_same_name_get_numbered() {
        let folder = Path::new("/out");
        let mut taken = HashSet::new();

        let paths: Vec<PathBuf> = ["data.csv", "data.csv", "data.csv", "other.csv"]
            .iter()
            .map(|name| unique_output_path(folder, name, &mut taken))
            .collect();

        assert_eq!(
            paths,
            vec![
                folder.join("data.csv"),
                folder.join("data (1).csv"),
                folder.join("data (2).csv"),
                folder.join("other.csv"),
            ]
        );
    }

    #[test]
    fn numbered_name_skips_a_real_file_of_that_name() {
        let folder = Path::new("/out");
        let mut taken = HashSet::new();

        let first = unique_output_path(folder, "data (1).xlsx", &mut taken);
        let second = unique_output_path(folder, "data.xlsx", &mut taken);
        let third = unique_output_path(folder, "data.xlsx", &mut taken);

        assert_eq!(first, folder.join("data (1).xlsx"));
        assert_eq!(second, folder.join("data.xlsx"));
        assert_eq!(third, folder.join("data (2).xlsx"));
    }
}
