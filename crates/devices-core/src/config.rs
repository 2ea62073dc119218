//! Configuration resolution for devices-api.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Settings file (~/.config/devices-api/settings.json or an explicit path)
//! 3. Environment variables (`DEVICES_API_*`)
//! 4. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete devices-api configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub autopi: AutoPiSettings,
    #[serde(default)]
    pub services: ServiceSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/// Record store location.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseSettings {
    pub path: Option<PathBuf>,
}

/// AutoPi cloud API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPiSettings {
    pub api_url: String,
    pub api_token: String,
}

impl Default for AutoPiSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.dimo.autopi.io".to_string(),
            api_token: String::new(),
        }
    }
}

/// Sibling services reached over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub device_definitions_url: String,
    pub ingest_registrar_url: String,
    pub events_sink_url: String,
    pub dd_registrar_url: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            device_definitions_url: "http://localhost:8086".to_string(),
            ingest_registrar_url: "http://localhost:8087".to_string(),
            events_sink_url: "http://localhost:8088/events".to_string(),
            dd_registrar_url: "http://localhost:8089/registrations".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration with hierarchical resolution.
///
/// An explicit `path` must exist; the default global path is optional.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(p) => load_settings_file(p)?,
        None => match global_settings_path() {
            Some(global) if global.exists() => load_settings_file(&global)?,
            _ => Settings::default(),
        },
    };

    apply_env_overrides(&mut settings);

    Ok(settings)
}

/// Get the global settings file path.
pub fn global_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("devices-api").join("settings.json"))
}

/// Default database path when none is configured.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("devices-api").join("devices.db"))
}

fn load_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

fn apply_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("DEVICES_API_DB_PATH") {
        settings.database.path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("DEVICES_API_AUTOPI_URL") {
        settings.autopi.api_url = val;
    }
    if let Some(val) = var("DEVICES_API_AUTOPI_TOKEN") {
        settings.autopi.api_token = val;
    }
    if let Some(val) = var("DEVICES_API_DEFINITIONS_URL") {
        settings.services.device_definitions_url = val;
    }
    if let Some(val) = var("DEVICES_API_INGEST_URL") {
        settings.services.ingest_registrar_url = val;
    }
    if let Some(val) = var("DEVICES_API_EVENTS_URL") {
        settings.services.events_sink_url = val;
    }
    if let Some(val) = var("DEVICES_API_DD_REGISTRAR_URL") {
        settings.services.dd_registrar_url = val;
    }
    if let Some(val) = var("DEVICES_API_LOG_LEVEL") {
        settings.log.level = val;
    }
}
