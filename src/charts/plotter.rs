//! Chart Plotter Module
//! Bar chart of the first two numeric columns using egui_plot.

use crate::data::DataProcessor;
use egui::Color32;
use egui_plot::{Bar, BarChart, Legend, Plot};
use polars::prelude::*;

/// Number of numeric columns charted.
pub const MAX_SERIES: usize = 2;

pub const PALETTE: [Color32; MAX_SERIES] = [
    Color32::from_rgb(79, 139, 249), // Blue
    Color32::from_rgb(231, 76, 60),  // Red
];

/// One numeric column as (row index, value) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

/// Builds and draws the visualization for a working table.
pub struct ChartPlotter;

impl ChartPlotter {
    /// First two numeric columns by column order; missing values are skipped.
    pub fn bar_series(df: &DataFrame) -> Vec<BarSeries> {
        DataProcessor::numeric_columns(df)
            .into_iter()
            .take(MAX_SERIES)
            .filter_map(|name| {
                let values = df.column(&name).ok()?.cast(&DataType::Float64).ok()?;
                let points = values
                    .f64()
                    .ok()?
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.filter(|v| v.is_finite()).map(|v| (i as f64, v)))
                    .collect();
                Some(BarSeries { name, points })
            })
            .collect()
    }

    /// Draw grouped bars, one group per row.
    pub fn draw_bar_chart(ui: &mut egui::Ui, id: &str, series: &[BarSeries]) {
        if series.is_empty() {
            ui.label("No numeric columns to visualize.");
            return;
        }

        let slot = 0.8 / series.len() as f64;

        Plot::new(format!("bar_chart_{}", id))
            .height(260.0)
            .legend(Legend::default())
            .allow_scroll(false)
            .x_axis_label("Row")
            .y_axis_label("Value")
            .show(ui, |plot_ui| {
                for (idx, s) in series.iter().enumerate() {
                    let offset = -0.4 + slot * (idx as f64 + 0.5);
                    let color = PALETTE[idx % PALETTE.len()];
                    let bars: Vec<Bar> = s
                        .points
                        .iter()
                        .map(|&(x, y)| Bar::new(x + offset, y).width(slot * 0.95))
                        .collect();
                    plot_ui.bar_chart(BarChart::new(bars).color(color).name(&s.name));
                }
            });
    }
}
