use std::collections::BTreeSet;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use rusty_lens::chart::{ChartKind, Role, RoleSpec, MAX_BINS, MIN_BINS};
use rusty_lens::data::loader::{load_file, SUPPORTED_EXTENSIONS};
use rusty_lens::data::model::CellValue;
use rusty_lens::data::schema::ColumnKind;
use rusty_lens::state::{AppState, ChartSize, FilterControls, Theme};

// ---------------------------------------------------------------------------
// Left side panel – theme, filters, chart options
// ---------------------------------------------------------------------------

/// Render the left panel. Recomputes the evaluation when anything changed.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Options");
    ui.separator();

    let mut changed = false;
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            theme_picker(ui, state);
            ui.separator();

            if state.session.is_none() {
                ui.label("No dataset loaded.");
                if ui.button("Open…").clicked() {
                    open_file_dialog(state);
                }
                return;
            }

            ui.heading("Filters");
            changed |= text_filter(ui, state);
            changed |= membership_filters(ui, state);
            changed |= date_filter(ui, state);
            changed |= range_filters(ui, state);
            if ui.button("Reset filters").clicked() {
                state.reset_filters();
            }
            ui.separator();

            ui.heading("Chart");
            changed |= chart_options(ui, state);
        });

    if changed {
        state.refresh();
    }
}

fn theme_picker(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Theme");
        ui.radio_value(&mut state.config.theme, Theme::Light, "Light");
        ui.radio_value(&mut state.config.theme, Theme::Dark, "Dark");
    });
}

/// Names of the session's columns whose kind passes `pred`.
fn columns_where(state: &AppState, pred: impl Fn(ColumnKind) -> bool) -> Vec<String> {
    state
        .session
        .as_ref()
        .map(|s| s.columns_where(pred))
        .unwrap_or_default()
}

fn text_filter(ui: &mut Ui, state: &mut AppState) -> bool {
    let columns = columns_where(state, ColumnKind::is_string_valued);
    let filters = &mut state.config.filters;
    let before = (filters.text_column.clone(), filters.text_query.clone());

    ui.strong("Search text");
    egui::ComboBox::from_id_salt("text_column")
        .selected_text(filters.text_column.as_deref().unwrap_or("None"))
        .show_ui(ui, |ui: &mut Ui| {
            ui.selectable_value(&mut filters.text_column, None, "None");
            for col in &columns {
                ui.selectable_value(&mut filters.text_column, Some(col.clone()), col);
            }
        });
    if filters.text_column.is_some() {
        ui.text_edit_singleline(&mut filters.text_query);
    }

    before != (filters.text_column.clone(), filters.text_query.clone())
}

fn membership_filters(ui: &mut Ui, state: &mut AppState) -> bool {
    let mut changed = false;
    for control in &mut state.config.filters.memberships {
        let header = format!(
            "{}  ({}/{})",
            control.column,
            control.selected.len(),
            control.options.len()
        );
        egui::CollapsingHeader::new(RichText::new(header).strong())
            .id_salt(&control.column)
            .default_open(false)
            .show(ui, |ui: &mut Ui| {
                ui.horizontal(|ui: &mut Ui| {
                    if ui.small_button("All").clicked() {
                        control.selected = control.options.clone();
                        changed = true;
                    }
                    if ui.small_button("None").clicked() {
                        control.selected.clear();
                        changed = true;
                    }
                });
                for value in &control.options {
                    let mut checked = control.selected.contains(value);
                    if ui.checkbox(&mut checked, value.to_string()).changed() {
                        toggle(&mut control.selected, value, checked);
                        changed = true;
                    }
                }
            });
    }
    changed
}

fn toggle(set: &mut BTreeSet<CellValue>, value: &CellValue, on: bool) {
    if on {
        set.insert(value.clone());
    } else {
        set.remove(value);
    }
}

fn date_filter(ui: &mut Ui, state: &mut AppState) -> bool {
    let columns = columns_where(state, |k| k == ColumnKind::Temporal);
    if columns.is_empty() {
        return false;
    }
    let mut changed = false;

    ui.strong("Date range");
    let current = state.config.filters.date.as_ref().map(|d| d.column.clone());
    let mut picked = current.clone();
    egui::ComboBox::from_id_salt("date_column")
        .selected_text(picked.as_deref().unwrap_or("None"))
        .show_ui(ui, |ui: &mut Ui| {
            for col in &columns {
                ui.selectable_value(&mut picked, Some(col.clone()), col);
            }
        });
    if picked != current {
        if let (Some(column), Some(session)) = (picked, &state.session) {
            state.config.filters.date = FilterControls::date_control(session, column);
            changed = true;
        }
    }

    if let Some(date) = &mut state.config.filters.date {
        let before = date.selected;
        ui.horizontal(|ui: &mut Ui| {
            ui.label("from");
            ui.add(DatePickerButton::new(&mut date.selected.0).id_salt("date_from"));
        });
        ui.horizontal(|ui: &mut Ui| {
            ui.label("to");
            ui.add(DatePickerButton::new(&mut date.selected.1).id_salt("date_to"));
        });
        if date.selected.0 > date.selected.1 {
            date.selected.1 = date.selected.0;
        }
        changed |= before != date.selected;
    }
    changed
}

fn range_filters(ui: &mut Ui, state: &mut AppState) -> bool {
    let mut changed = false;
    for range in &mut state.config.filters.ranges {
        let before = range.selected;
        let (lo, hi) = range.bounds;
        ui.strong(&range.column);
        ui.add(egui::Slider::new(&mut range.selected.0, lo..=hi).text("min"));
        ui.add(egui::Slider::new(&mut range.selected.1, lo..=hi).text("max"));
        if range.selected.0 > range.selected.1 {
            range.selected.1 = range.selected.0;
        }
        changed |= before != range.selected;
    }
    changed
}

// ---------------------------------------------------------------------------
// Chart options
// ---------------------------------------------------------------------------

fn chart_options(ui: &mut Ui, state: &mut AppState) -> bool {
    let before = state.config.chart.clone();

    let mut kind = state.config.chart.kind;
    egui::ComboBox::from_id_salt("chart_kind")
        .selected_text(kind.to_string())
        .show_ui(ui, |ui: &mut Ui| {
            for k in ChartKind::ALL {
                ui.selectable_value(&mut kind, k, k.to_string());
            }
        });
    // Switching kind rebinds and refreshes on its own.
    state.set_chart_kind(kind);

    if kind == ChartKind::Heatmap {
        ui.label("Correlation of every numeric column.");
    }
    for spec in kind.roles() {
        let options = columns_where(state, |k| spec.accepts.accepts(k));
        if spec.role.takes_many() {
            path_picker(ui, state, spec, &options);
        } else {
            role_picker(ui, state, spec, &options);
        }
    }

    if kind == ChartKind::Histogram {
        let mut bins = state.config.chart.bins.unwrap_or(state.settings.default_bins);
        ui.add(egui::Slider::new(&mut bins, MIN_BINS..=MAX_BINS).text("bins"));
        state.config.chart.bins = Some(bins);
    }

    ui.separator();
    ui.strong("Title");
    ui.text_edit_singleline(&mut state.config.title);
    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Size");
        for size in ChartSize::ALL {
            ui.radio_value(&mut state.config.size, size, format!("{size:?}"));
        }
    });

    before != state.config.chart
}

fn role_picker(ui: &mut Ui, state: &mut AppState, spec: &RoleSpec, options: &[String]) {
    let current = state.config.chart.column(spec.role).map(str::to_string);
    let mut picked = current.clone();
    egui::ComboBox::from_label(spec.role.as_str())
        .selected_text(picked.as_deref().unwrap_or("None"))
        .show_ui(ui, |ui: &mut Ui| {
            if !spec.required {
                ui.selectable_value(&mut picked, None, "None");
            }
            for col in options {
                ui.selectable_value(&mut picked, Some(col.clone()), col);
            }
        });
    if picked != current {
        match picked {
            Some(col) => {
                state.config.chart.bindings.insert(spec.role, vec![col]);
            }
            None => {
                state.config.chart.bindings.remove(&spec.role);
            }
        }
    }
}

/// Ordered multi-select: ticking appends, unticking removes.
fn path_picker(ui: &mut Ui, state: &mut AppState, spec: &RoleSpec, options: &[String]) {
    ui.strong(format!("{} (in order)", spec.role));
    let path = state.config.chart.bindings.entry(Role::Path).or_default();
    for col in options {
        let mut checked = path.contains(col);
        if ui.checkbox(&mut checked, col).changed() {
            if checked {
                path.push(col.clone());
            } else {
                path.retain(|c| c != col);
            }
        }
    }
    if !path.is_empty() {
        ui.label(path.join(" › "));
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Menu, dataset metrics and status line.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let can_export = state.evaluation.is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Download filtered CSV…"))
                .clicked()
            {
                save_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(session) = &state.session {
            let summary = session.summary();
            ui.label(&session.source);
            ui.separator();
            ui.label(format!("Numeric columns: {}", summary.numeric_columns));
            ui.label(format!("Categorical columns: {}", summary.categorical_columns));
            ui.label(format!("Total rows: {}", summary.rows));
            if let Some(eval) = &state.evaluation {
                ui.label(format!("Filtered rows: {}", eval.filtered.len()));
            }
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open dataset")
        .add_filter("Supported files", SUPPORTED_EXTENSIONS)
        .add_filter("CSV / text", &["csv", "txt", "tsv"])
        .add_filter("JSON", &["json"])
        .add_filter("Excel", &["xlsx", "xls"])
        .add_filter("Parquet", &["parquet"])
        .pick_file();

    let Some(path) = file else {
        return;
    };
    state.loading = true;
    match load_file(&path) {
        Ok(dataset) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            state.set_dataset(name, dataset);
        }
        Err(e) => {
            log::error!("Failed to load file: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
            state.loading = false;
        }
    }
}

pub fn save_file_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Download filtered data")
        .set_file_name("filtered_data.csv")
        .add_filter("CSV", &["csv"])
        .save_file()
    else {
        return;
    };
    state.status_message = match state.export_filtered(&path) {
        Ok(()) => None,
        Err(e) => {
            log::error!("Failed to export: {e}");
            Some(format!("Error: {e}"))
        }
    };
}
