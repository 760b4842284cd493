use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use crate::state::Settings;

const APP_DIR: &str = "BibleQuiz";
const SETTINGS_FILE: &str = "settings.json";

pub fn settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot find config directory"))?;
    Ok(config_dir.join(APP_DIR).join(SETTINGS_FILE))
}

pub fn images_dir() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot find cache directory"))?;
    Ok(cache_dir.join(APP_DIR).join("images"))
}

/// Loads settings, falling back to defaults on any failure. A missing file is
/// created with the defaults.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        tracing::info!("No stored settings found at {}. Using defaults.", path.display());
        let settings = Settings::default();
        if let Err(e) = save_settings(path, &settings) {
            tracing::warn!("Failed to write default settings: {:#}", e);
        }
        return settings;
    }

    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("Failed to read settings file: {}. Using defaults.", e);
            return Settings::default();
        }
    };

    match serde_json::from_str::<Settings>(&data) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to deserialize stored settings: {}. Using defaults.", e);
            Settings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let data = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, data)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
