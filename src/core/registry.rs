/*
 * The project registry: a JSON map keyed by project name summarizing every known
 * project (location, creation time, episode list, last access). It is a secondary
 * index only. Project operations call into it after their own config save has
 * succeeded and treat any registry failure as non-fatal.
 */
use crate::core::models::{ProjectConfig, timestamp_now};
use crate::core::project_layout::PROJECT_CONFIG_FILENAME;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_name: String,
    pub project_path: String,
    pub config_path: String,
    pub created_time: String,
    #[serde(default)]
    pub episode_count: usize,
    #[serde(default)]
    pub episode_list: Vec<String>,
    #[serde(default)]
    pub no_episode: bool,
    #[serde(default)]
    pub last_accessed: String,
}

impl ProjectInfo {
    pub fn from_config(config: &ProjectConfig, project_root: &Path) -> Self {
        let episode_list: Vec<String> = config.episodes.keys().cloned().collect();
        ProjectInfo {
            project_name: config.project_name.clone(),
            project_path: project_root.to_string_lossy().into_owned(),
            config_path: project_root
                .join(PROJECT_CONFIG_FILENAME)
                .to_string_lossy()
                .into_owned(),
            created_time: config.created_time.clone(),
            episode_count: episode_list.len(),
            episode_list,
            no_episode: config.no_episode,
            last_accessed: timestamp_now(),
        }
    }
}

#[derive(Debug)]
pub enum RegistryError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoRegistryDirectory,
}

impl From<io::Error> for RegistryError {
    fn from(err: io::Error) -> Self {
        RegistryError::Io(err)
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serde(err)
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Io(e) => write!(f, "Registry I/O error: {e}"),
            RegistryError::Serde(e) => write!(f, "Registry file is malformed: {e}"),
            RegistryError::NoRegistryDirectory => {
                write!(f, "Could not determine a directory for the project registry")
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Io(e) => Some(e),
            RegistryError::Serde(e) => Some(e),
            RegistryError::NoRegistryDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

pub trait ProjectRegistryOperations {
    /* Inserts or replaces the record for `config.project_name`. */
    fn register_project(&self, config: &ProjectConfig, project_root: &Path) -> Result<()>;
    fn unregister_project(&self, project_name: &str) -> Result<bool>;
    fn update_access_time(&self, project_name: &str) -> Result<bool>;
    /* Most recently accessed first. */
    fn list_projects(&self) -> Result<Vec<ProjectInfo>>;
    fn project_exists(&self, project_name: &str) -> Result<bool>;
}

/*
 * File-backed registry. The map is re-read before every mutation so that two
 * tools sharing one registry file lose at most a concurrent write, never the
 * whole index. The mutex only serializes callers within this process.
 */
pub struct CoreProjectRegistry {
    registry_path: PathBuf,
    write_guard: Mutex<()>,
}

impl CoreProjectRegistry {
    pub fn new(registry_path: PathBuf) -> Self {
        CoreProjectRegistry {
            registry_path,
            write_guard: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<BTreeMap<String, ProjectInfo>> {
        if !self.registry_path.is_file() {
            return Ok(BTreeMap::new());
        }
        let reader = BufReader::new(File::open(&self.registry_path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    fn write_map(&self, map: &BTreeMap<String, ProjectInfo>) -> Result<()> {
        if let Some(parent) = self.registry_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&self.registry_path)?);
        serde_json::to_writer_pretty(&mut writer, map)?;
        writer.flush()?;
        log::trace!(
            "CoreProjectRegistry: Wrote {} records to {:?}",
            map.len(),
            self.registry_path
        );
        Ok(())
    }

    fn mutate<F, T>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut BTreeMap<String, ProjectInfo>) -> (T, bool),
    {
        let _guard = self
            .write_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut map = self.read_map()?;
        let (result, changed) = change(&mut map);
        if changed {
            self.write_map(&map)?;
        }
        Ok(result)
    }
}

impl ProjectRegistryOperations for CoreProjectRegistry {
    fn register_project(&self, config: &ProjectConfig, project_root: &Path) -> Result<()> {
        let info = ProjectInfo::from_config(config, project_root);
        log::debug!(
            "CoreProjectRegistry: Registering '{}' at {:?}",
            info.project_name,
            info.project_path
        );
        self.mutate(|map| {
            map.insert(info.project_name.clone(), info);
            ((), true)
        })
    }

    fn unregister_project(&self, project_name: &str) -> Result<bool> {
        self.mutate(|map| {
            let removed = map.remove(project_name).is_some();
            (removed, removed)
        })
    }

    fn update_access_time(&self, project_name: &str) -> Result<bool> {
        self.mutate(|map| match map.get_mut(project_name) {
            Some(info) => {
                info.last_accessed = timestamp_now();
                (true, true)
            }
            None => (false, false),
        })
    }

    fn list_projects(&self) -> Result<Vec<ProjectInfo>> {
        let mut projects: Vec<ProjectInfo> = self.read_map()?.into_values().collect();
        projects.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
        Ok(projects)
    }

    fn project_exists(&self, project_name: &str) -> Result<bool> {
        Ok(self.read_map()?.contains_key(project_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_register_list_and_unregister() -> Result<()> {
        let dir = tempdir()?;
        let registry = CoreProjectRegistry::new(dir.path().join("nested/project_registry.json"));
        let mut config = ProjectConfig::new("Demo", "", None, false);
        config.episodes.insert("ep02".to_string(), Vec::new());
        config.episodes.insert("ep01".to_string(), Vec::new());

        registry.register_project(&config, &dir.path().join("Demo"))?;

        let projects = registry.list_projects()?;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].episode_count, 2);
        assert_eq!(projects[0].episode_list, vec!["ep01", "ep02"]);
        assert!(projects[0].config_path.ends_with(PROJECT_CONFIG_FILENAME));
        assert!(registry.project_exists("Demo")?);

        assert!(registry.unregister_project("Demo")?);
        assert!(!registry.unregister_project("Demo")?);
        assert!(!registry.project_exists("Demo")?);
        Ok(())
    }

    #[test]
    fn test_list_orders_by_last_access() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("project_registry.json");
        let registry = CoreProjectRegistry::new(path.clone());
        let older = ProjectConfig::new("Older", "", None, false);
        let newer = ProjectConfig::new("Newer", "", None, false);
        registry.register_project(&older, &dir.path().join("Older"))?;
        registry.register_project(&newer, &dir.path().join("Newer"))?;

        // Pin the timestamps so the ordering does not depend on clock resolution.
        let mut map = registry.read_map()?;
        map.get_mut("Older").unwrap().last_accessed = "2024-01-01T00:00:00Z".to_string();
        map.get_mut("Newer").unwrap().last_accessed = "2024-06-01T00:00:00Z".to_string();
        registry.write_map(&map)?;

        let names: Vec<String> = registry
            .list_projects()?
            .into_iter()
            .map(|p| p.project_name)
            .collect();
        assert_eq!(names, vec!["Newer", "Older"]);

        assert!(registry.update_access_time("Older")?);
        assert!(!registry.update_access_time("Missing")?);
        assert_eq!(registry.list_projects()?[0].project_name, "Older");
        Ok(())
    }

    #[test]
    fn test_missing_file_lists_empty() -> Result<()> {
        let dir = tempdir()?;
        let registry = CoreProjectRegistry::new(dir.path().join("none.json"));
        assert!(registry.list_projects()?.is_empty());
        Ok(())
    }
}
