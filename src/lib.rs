mod app;
mod audio;
mod commands;
mod hub;
mod persistence;
mod quiz;
mod state;
mod ui;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use app::App;
use audio::AudioPlayback;
use hub::GeminiGateway;
use ui::TerminalUi;

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Bible Quiz v{}", env!("CARGO_PKG_VERSION"));

    let settings = match persistence::settings_path() {
        Ok(path) => persistence::load_settings(&path),
        Err(e) => {
            tracing::warn!("{:#}. Using default settings.", e);
            state::Settings::default()
        }
    };
    tracing::info!("Settings loaded");
    if settings.resolved_api_key().is_none() {
        tracing::warn!("No API key configured; set {} to generate quizzes", state::API_KEY_ENV);
    }

    let images_dir = if settings.general.save_images {
        persistence::images_dir()
            .map_err(|e| tracing::warn!("Images will not be saved: {:#}", e))
            .ok()
    } else {
        None
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    let result = runtime.block_on(async {
        let gateway = Arc::new(GeminiGateway::new(&settings));
        let audio = Arc::new(AudioPlayback::new());
        let app = App::new(&settings, gateway, audio, TerminalUi::stdout(images_dir));
        app.run().await
    });

    // The stdin reader may still be parked on a blocking read
    runtime.shutdown_background();
    result
}
