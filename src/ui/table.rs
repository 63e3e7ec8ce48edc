use eframe::egui::{self, Color32, RichText, Ui};
use egui_extras::{Column as TableColumn, TableBuilder};

use rusty_lens::data::model::Dataset;
use rusty_lens::state::Extremes;

const MAX_HIGHLIGHT: Color32 = Color32::from_rgb(46, 160, 67);
const MIN_HIGHLIGHT: Color32 = Color32::from_rgb(200, 60, 60);

/// Scrollable preview of the first `max_rows` filtered rows. The largest
/// value of each numeric column is shaded green, the smallest red; tied
/// cells are all shaded.
pub fn preview(ui: &mut Ui, data: &Dataset, extremes: &[Option<Extremes>], max_rows: usize) {
    let rows = data.len().min(max_rows);
    if data.columns().is_empty() {
        ui.label("No columns to show.");
        return;
    }
    ui.label(format!("Showing {rows} of {} rows", data.len()));

    let row_height = egui::TextStyle::Body.resolve(ui.style()).size * 1.5;
    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .max_scroll_height(300.0)
        .column(TableColumn::initial(50.0).at_least(40.0))
        .columns(
            TableColumn::initial(120.0).at_least(60.0).clip(true),
            data.columns().len(),
        )
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("#");
            });
            for name in data.column_names() {
                header.col(|ui| {
                    ui.strong(name);
                });
            }
        })
        .body(|body| {
            body.rows(row_height, rows, |mut row| {
                let r = row.index();
                row.col(|ui| {
                    ui.label(r.to_string());
                });
                for (c, column) in data.columns().iter().enumerate() {
                    let text = column.values[r].to_string();
                    let highlight = extremes.get(c).and_then(Option::as_ref).and_then(|e| {
                        if e.max_rows.contains(&r) {
                            Some(MAX_HIGHLIGHT)
                        } else if e.min_rows.contains(&r) {
                            Some(MIN_HIGHLIGHT)
                        } else {
                            None
                        }
                    });
                    row.col(|ui| match highlight {
                        Some(bg) => {
                            ui.label(RichText::new(text).background_color(bg).color(Color32::WHITE));
                        }
                        None => {
                            ui.label(text);
                        }
                    });
                }
            });
        });
}
