/*
 * Persistence of the project configuration sidecar (`project_config.json` at the
 * project root). The file is read fully into memory on open and written fully,
 * pretty-printed, after every mutation. Older files stored reuse groups under
 * `reuse_cards`; that key is folded into `reuse_cuts` before typed decoding and
 * the caller is told a migration happened so it can persist the new shape.
 *
 * A trait (`ProjectConfigStoreOperations`) fronts the concrete store so project
 * operations can be exercised against in-memory or failing stores in tests.
 */
use crate::core::models::ProjectConfig;
use crate::core::project_layout::PROJECT_CONFIG_FILENAME;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const LEGACY_REUSE_KEY: &str = "reuse_cards";
pub const REUSE_KEY: &str = "reuse_cuts";

#[derive(Debug)]
pub enum ConfigStoreError {
    Io(io::Error),
    Serde(serde_json::Error),
    ConfigNotFound(PathBuf),
    NotAnObject(PathBuf),
}

impl From<io::Error> for ConfigStoreError {
    fn from(err: io::Error) -> Self {
        ConfigStoreError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigStoreError {
    fn from(err: serde_json::Error) -> Self {
        ConfigStoreError::Serde(err)
    }
}

impl std::fmt::Display for ConfigStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigStoreError::Io(e) => write!(f, "Project config I/O error: {e}"),
            ConfigStoreError::Serde(e) => write!(f, "Project config is malformed: {e}"),
            ConfigStoreError::ConfigNotFound(p) => {
                write!(f, "No {PROJECT_CONFIG_FILENAME} found at {p:?}")
            }
            ConfigStoreError::NotAnObject(p) => {
                write!(f, "Project config at {p:?} is not a JSON object")
            }
        }
    }
}

impl std::error::Error for ConfigStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigStoreError::Io(e) => Some(e),
            ConfigStoreError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigStoreError>;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: ProjectConfig,
    pub migrated: bool,
}

pub trait ProjectConfigStoreOperations {
    fn load_config(&self, project_root: &Path) -> Result<LoadedConfig>;
    /* Stamps `last_modified` and writes the whole configuration. */
    fn save_config(&self, project_root: &Path, config: &mut ProjectConfig) -> Result<()>;
    fn config_exists(&self, project_root: &Path) -> bool;
}

pub struct CoreProjectConfigStore {}

impl CoreProjectConfigStore {
    pub fn new() -> Self {
        CoreProjectConfigStore {}
    }

    fn config_path(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_CONFIG_FILENAME)
    }
}

impl Default for CoreProjectConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

/*
 * Moves a legacy `reuse_cards` array into `reuse_cuts`. When both keys exist the
 * current key wins and the legacy one is discarded. Returns whether the document
 * changed.
 */
pub fn migrate_legacy_keys(document: &mut Value) -> bool {
    let Some(object) = document.as_object_mut() else {
        return false;
    };
    let Some(legacy) = object.remove(LEGACY_REUSE_KEY) else {
        return false;
    };
    if !object.contains_key(REUSE_KEY) {
        object.insert(REUSE_KEY.to_string(), legacy);
    }
    true
}

impl ProjectConfigStoreOperations for CoreProjectConfigStore {
    fn load_config(&self, project_root: &Path) -> Result<LoadedConfig> {
        let path = Self::config_path(project_root);
        log::trace!("CoreProjectConfigStore: Loading {path:?}");
        if !path.is_file() {
            return Err(ConfigStoreError::ConfigNotFound(path));
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut document: Value = serde_json::from_reader(reader)?;
        if !document.is_object() {
            return Err(ConfigStoreError::NotAnObject(path));
        }
        let migrated = migrate_legacy_keys(&mut document);
        if migrated {
            log::info!(
                "CoreProjectConfigStore: Migrated legacy '{LEGACY_REUSE_KEY}' key in {path:?}"
            );
        }
        let config: ProjectConfig = serde_json::from_value(document)?;
        log::debug!(
            "CoreProjectConfigStore: Loaded project '{}' ({} episodes, {} root cuts, {} reuse groups)",
            config.project_name,
            config.episodes.len(),
            config.cuts.len(),
            config.reuse_cuts.len()
        );
        Ok(LoadedConfig { config, migrated })
    }

    fn save_config(&self, project_root: &Path, config: &mut ProjectConfig) -> Result<()> {
        config.touch();
        let path = Self::config_path(project_root);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, config)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        log::debug!(
            "CoreProjectConfigStore: Saved project '{}' to {path:?}",
            config.project_name
        );
        Ok(())
    }

    fn config_exists(&self, project_root: &Path) -> bool {
        Self::config_path(project_root).is_file()
    }
}
