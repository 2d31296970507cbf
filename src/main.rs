mod core;
mod download;
mod gui;
mod player;

use eframe::egui;
use gui::MusicPlayerApp;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = core::AppConfig::load()?;
    // A folder given on the command line wins over the remembered one.
    let initial_directory = std::env::args_os().nth(1).map(PathBuf::from);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 600.0])
            .with_title(gui::DEFAULT_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        "Music Player",
        options,
        Box::new(move |cc| {
            match MusicPlayerApp::new(cc, config, initial_directory) {
                Ok(app) => Ok(Box::new(app)),
                Err(e) => {
                    log::error!("Failed to initialize app: {}", e);
                    std::process::exit(1);
                }
            }
        }),
    ).map_err(|e| anyhow::anyhow!("Failed to run app: {}", e))?;

    Ok(())
}
