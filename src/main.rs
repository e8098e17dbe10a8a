//! Data Sweeper - CSV / Excel converter
//!
//! Load CSV or XLSX files, preview and clean them, pick columns, chart the
//! numeric ones and export the result to either format.

mod charts;
mod config;
mod data;
mod gui;

use config::AppConfig;
use eframe::egui;
use gui::SweeperApp;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> eframe::Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env).init();

    let config = AppConfig::default();
    info!(title = %config.title, "startup");

    // Configure native options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(config.window_size)
            .with_min_inner_size(config.min_window_size)
            .with_title(&config.title)
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let title = config.title.clone();
    eframe::run_native(
        &title,
        options,
        Box::new(|cc| Ok(Box::new(SweeperApp::new(cc, config)))),
    )
}
