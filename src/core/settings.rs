/*
 * Per-user application settings: the last opened project and the default folder
 * new projects are created in (which also decides where the project registry is
 * kept). Stored as `settings.json` in the platform's local config directory for
 * the application, resolved through `path_utils`.
 *
 * As with the other stores, access goes through a trait
 * (`SettingsManagerOperations`) so callers and tests can substitute the backend.
 */
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

pub const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_project_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoConfigDirectory,
}

impl From<io::Error> for SettingsError {
    fn from(err: io::Error) -> Self {
        SettingsError::Io(err)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Serde(err)
    }
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "Settings I/O error: {e}"),
            SettingsError::Serde(e) => write!(f, "Settings file is malformed: {e}"),
            SettingsError::NoConfigDirectory => {
                write!(f, "Could not determine a configuration directory for settings")
            }
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(e) => Some(e),
            SettingsError::Serde(e) => Some(e),
            SettingsError::NoConfigDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;

pub trait SettingsManagerOperations {
    /* A missing settings file yields `AppSettings::default()`. */
    fn load_settings(&self, app_name: &str) -> Result<AppSettings>;
    fn save_settings(&self, app_name: &str, settings: &AppSettings) -> Result<()>;
}

pub struct CoreSettingsManager {
    config_dir_override: Option<PathBuf>,
}

impl CoreSettingsManager {
    pub fn new() -> Self {
        CoreSettingsManager {
            config_dir_override: None,
        }
    }

    /* Pins the settings directory instead of asking the platform for one. */
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        CoreSettingsManager {
            config_dir_override: Some(config_dir),
        }
    }

    fn settings_file(&self, app_name: &str) -> Result<PathBuf> {
        let dir = match &self.config_dir_override {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => path_utils::app_config_dir(app_name).ok_or(SettingsError::NoConfigDirectory)?,
        };
        Ok(dir.join(SETTINGS_FILENAME))
    }
}

impl Default for CoreSettingsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsManagerOperations for CoreSettingsManager {
    fn load_settings(&self, app_name: &str) -> Result<AppSettings> {
        let file_path = self.settings_file(app_name)?;
        if !file_path.exists() {
            log::debug!("CoreSettingsManager: No settings file at {file_path:?}, using defaults.");
            return Ok(AppSettings::default());
        }
        let reader = BufReader::new(File::open(&file_path)?);
        let settings: AppSettings = serde_json::from_reader(reader)?;
        log::debug!("CoreSettingsManager: Loaded settings from {file_path:?}: {settings:?}");
        Ok(settings)
    }

    fn save_settings(&self, app_name: &str, settings: &AppSettings) -> Result<()> {
        let file_path = self.settings_file(app_name)?;
        let mut writer = BufWriter::new(File::create(&file_path)?);
        serde_json::to_writer_pretty(&mut writer, settings)?;
        writer.flush()?;
        log::debug!("CoreSettingsManager: Saved settings to {file_path:?}.");
        Ok(())
    }
}
