mod app;
mod ui;

use app::RustyLensApp;
use eframe::egui;
use rusty_lens::settings::Settings;

fn main() -> eframe::Result {
    env_logger::init();
    let settings = Settings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1300.0, 900.0])
            .with_min_inner_size([700.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Lens – Interactive Data Dashboard",
        options,
        Box::new(|_cc| Ok(Box::new(RustyLensApp::new(settings)))),
    )
}
