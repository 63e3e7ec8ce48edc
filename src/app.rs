use eframe::egui::{self, ScrollArea, Ui};

use rusty_lens::settings::Settings;
use rusty_lens::state::{AppState, Theme};

use crate::ui::{panels, plot, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RustyLensApp {
    pub state: AppState,
}

impl RustyLensApp {
    pub fn new(settings: Settings) -> Self {
        Self {
            state: AppState::new(settings),
        }
    }
}

impl eframe::App for RustyLensApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(match self.state.config.theme {
            Theme::Light => egui::Visuals::light(),
            Theme::Dark => egui::Visuals::dark(),
        });

        // ---- Top panel: menu bar and metrics ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: theme, filters, chart options ----
        egui::SidePanel::left("options_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: preview and chart ----
        egui::CentralPanel::default().show(ctx, |ui| {
            ScrollArea::both().show(ui, |ui: &mut Ui| central(ui, &mut self.state));
        });
    }
}

fn central(ui: &mut Ui, state: &mut AppState) {
    let Some(eval) = &state.evaluation else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to explore it  (File → Open…)");
        });
        return;
    };

    for (i, e) in &eval.filter_errors {
        ui.colored_label(egui::Color32::YELLOW, format!("Filter #{i} ignored: {e}"));
    }

    ui.heading("Data preview");
    table::preview(ui, &eval.filtered, &eval.extremes, state.settings.preview_rows);
    ui.separator();

    plot::chart_area(ui, &eval.chart, &state.config.title, state.config.size);
    ui.separator();

    if ui.button("Download filtered data as CSV").clicked() {
        panels::save_file_dialog(state);
    }
}
