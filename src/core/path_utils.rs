/*
 * Locations of per-user application files: the settings file and the fallback
 * home of the project registry. Project-local layout lives in `project_layout`.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const REGISTRY_FILENAME: &str = "project_registry.json";
pub const REGISTRY_SETTINGS_DIR: &str = "_proj_settings";

/*
 * Resolves (and creates) the platform's local configuration directory for
 * `app_name`, e.g. `~/.config/<app_name>` on Linux. Returns `None` when the
 * platform offers no such directory or it cannot be created.
 */
pub fn app_config_dir(app_name: &str) -> Option<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", app_name)?;
    let config_path = proj_dirs.config_local_dir();
    if !config_path.exists() {
        if let Err(e) = fs::create_dir_all(config_path) {
            log::error!("PathUtils: Failed to create app config directory {config_path:?}: {e}");
            return None;
        }
        log::debug!("PathUtils: Created app config directory {config_path:?}");
    }
    Some(config_path.to_path_buf())
}

/*
 * Where the project registry lives. With a configured default project folder
 * that still exists, the registry sits beside the projects in
 * `<default>/_proj_settings/`; otherwise it falls back to the app config dir.
 */
pub fn registry_file_path(app_name: &str, default_project_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(base) = default_project_path.filter(|p| p.is_dir()) {
        let settings_dir = base.join(REGISTRY_SETTINGS_DIR);
        match fs::create_dir_all(&settings_dir) {
            Ok(()) => return Some(settings_dir.join(REGISTRY_FILENAME)),
            Err(e) => log::warn!(
                "PathUtils: Cannot use {settings_dir:?} for the registry ({e}); falling back to the app config dir"
            ),
        }
    }
    app_config_dir(app_name).map(|dir| dir.join(REGISTRY_FILENAME))
}
