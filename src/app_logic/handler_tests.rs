use super::cli::Cli;
use super::handler::{AppError, ProjectManagerLogic, format_statistics};
use crate::core::version_ledger::{
    DeletionOutcome, Families, LockReport, Result as LedgerResult, UnlockReport,
};
use crate::core::{
    AppSettings, CoreVersionLedger, ProjectError, SettingsError, SettingsManagerOperations,
    VersionLedgerOperations, VersionStatistics,
};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/*
 * Tests for `ProjectManagerLogic`. Settings are held in memory by
 * `MockSettingsManager`; a default project folder inside a temp dir is always
 * configured so the registry lands there rather than in the user's config dir.
 */

struct MockSettingsManager {
    settings: Mutex<AppSettings>,
    fail_saves: bool,
}

impl MockSettingsManager {
    fn with_default(default_project_path: &Path) -> Self {
        MockSettingsManager {
            settings: Mutex::new(AppSettings {
                last_project_path: None,
                default_project_path: Some(default_project_path.to_path_buf()),
            }),
            fail_saves: false,
        }
    }

    fn current(&self) -> AppSettings {
        self.settings.lock().unwrap().clone()
    }
}

impl SettingsManagerOperations for MockSettingsManager {
    fn load_settings(&self, _app_name: &str) -> Result<AppSettings, SettingsError> {
        Ok(self.current())
    }

    fn save_settings(&self, _app_name: &str, settings: &AppSettings) -> Result<(), SettingsError> {
        if self.fail_saves {
            return Err(SettingsError::NoConfigDirectory);
        }
        *self.settings.lock().unwrap() = settings.clone();
        Ok(())
    }
}

/* Records lock requests instead of touching the filesystem. */
#[derive(Default)]
struct MockVersionLedger {
    locked: Mutex<Vec<PathBuf>>,
}

impl VersionLedgerOperations for MockVersionLedger {
    fn group_families(&self, _dir: &Path, _pattern: &str) -> LedgerResult<Families> {
        Ok(Families::new())
    }

    fn next_version(&self, _dir: &Path, _base: &str) -> LedgerResult<u32> {
        Ok(1)
    }

    fn is_locked(&self, path: &Path) -> bool {
        self.locked.lock().unwrap().iter().any(|p| p == path)
    }

    fn lock(&self, path: &Path) -> LedgerResult<bool> {
        if self.is_locked(path) {
            return Ok(false);
        }
        self.locked.lock().unwrap().push(path.to_path_buf());
        Ok(true)
    }

    fn unlock(&self, path: &Path) -> LedgerResult<bool> {
        let mut locked = self.locked.lock().unwrap();
        let before = locked.len();
        locked.retain(|p| p != path);
        Ok(locked.len() != before)
    }

    fn lock_all_latest(&self, _project_root: &Path) -> LockReport {
        LockReport::default()
    }

    fn unlock_all(&self, _project_root: &Path) -> UnlockReport {
        UnlockReport::default()
    }

    fn delete_all_old_versions(
        &self,
        _project_root: &Path,
        _cancel_flag: &AtomicBool,
    ) -> DeletionOutcome {
        DeletionOutcome::default()
    }

    fn aggregate_statistics(&self, _project_root: &Path) -> VersionStatistics {
        VersionStatistics::default()
    }
}

fn cli(args: &[&str]) -> Cli {
    let mut full = vec!["anim_project_manager"];
    full.extend_from_slice(args);
    Cli::try_parse_from(full).expect("test arguments should parse")
}

fn setup(base: &Path) -> (ProjectManagerLogic, Arc<MockSettingsManager>) {
    let settings = Arc::new(MockSettingsManager::with_default(base));
    let logic = ProjectManagerLogic::new(settings.clone(), Arc::new(CoreVersionLedger::new()));
    (logic, settings)
}

#[test]
fn test_new_project_becomes_current_project() {
    // Arrange
    let dir = tempdir().unwrap();
    let (logic, settings) = setup(dir.path());

    // Act
    let created = logic.run(&cli(&["new", "Demo"])).unwrap();
    logic.run(&cli(&["episode", "ep", "1"])).unwrap();
    let cut = logic.run(&cli(&["cut", "10", "--episode", "ep01"])).unwrap();
    let listed = logic.run(&cli(&["list", "--episode", "ep01"])).unwrap();

    // Assert
    assert!(created[0].starts_with("Created project 'Demo'"));
    assert_eq!(
        settings.current().last_project_path,
        Some(dir.path().join("Demo"))
    );
    assert_eq!(cut, vec!["Created cut 010"]);
    assert_eq!(listed, vec!["010"]);
    assert!(dir.path().join("Demo/ep01/01_vfx/010/cell").is_dir());
}

#[test]
fn test_commands_without_project_fail() {
    let dir = tempdir().unwrap();
    let (logic, _settings) = setup(dir.path());

    let result = logic.run(&cli(&["list"]));

    assert!(matches!(result, Err(AppError::NoProjectSelected)));
}

#[test]
fn test_project_flag_overrides_last_project() {
    let dir = tempdir().unwrap();
    let (logic, _settings) = setup(dir.path());
    logic.run(&cli(&["new", "First"])).unwrap();
    logic.run(&cli(&["new", "Second", "--no-episode"])).unwrap();

    let first = dir.path().join("First");
    let result = logic.run(&cli(&["cut", "5", "--project", first.to_str().unwrap()]));

    assert!(matches!(
        result,
        Err(AppError::Project(ProjectError::EpisodeRequired))
    ));
    assert_eq!(logic.run(&cli(&["cut", "5"])).unwrap(), vec!["Created cut 005"]);
}

#[test]
fn test_registry_lists_created_projects_and_forgets() {
    let dir = tempdir().unwrap();
    let (logic, _settings) = setup(dir.path());
    logic.run(&cli(&["new", "Demo"])).unwrap();

    let projects = logic.run(&cli(&["projects"])).unwrap();
    assert_eq!(projects.len(), 1);
    assert!(projects[0].starts_with("Demo"));
    assert!(dir.path().join("_proj_settings/project_registry.json").is_file());

    let forgot = logic.run(&cli(&["forget", "Demo"])).unwrap();
    assert_eq!(forgot, vec!["Removed 'Demo' from the registry"]);
    assert!(logic.run(&cli(&["projects"])).unwrap().is_empty());
}

#[test]
fn test_import_and_families_report_latest() {
    // Arrange
    let dir = tempdir().unwrap();
    let (logic, _settings) = setup(dir.path());
    let source = dir.path().join("paint.png");
    fs::write(&source, "px").unwrap();
    logic.run(&cli(&["new", "Demo", "--no-episode"])).unwrap();
    logic.run(&cli(&["cut", "1"])).unwrap();
    let source_arg = source.to_str().unwrap();

    // Act
    logic.run(&cli(&["import", "bg", source_arg, "1"])).unwrap();
    logic.run(&cli(&["import", "bg", source_arg, "1"])).unwrap();
    let bg_dir: PathBuf = dir.path().join("Demo/01_vfx/001/bg");
    let lines = logic
        .run(&cli(&["families", bg_dir.to_str().unwrap(), "--pattern", "*.png"]))
        .unwrap();

    // Assert
    assert_eq!(
        lines,
        vec![
            "Demo_001 (2 versions)".to_string(),
            "    Demo_001_T1.png  timing-shot T1".to_string(),
            "  * Demo_001_T2.png  timing-shot T2".to_string(),
        ]
    );
}

#[test]
fn test_import_many_counts_missing_sources() {
    let dir = tempdir().unwrap();
    let (logic, _settings) = setup(dir.path());
    let present = dir.path().join("sheet.csv");
    fs::write(&present, "1,2").unwrap();
    let missing = dir.path().join("missing.csv");
    logic.run(&cli(&["new", "Demo", "--no-episode"])).unwrap();
    logic.run(&cli(&["cut", "3"])).unwrap();

    let lines = logic
        .run(&cli(&[
            "import-many",
            "timesheet",
            "3",
            present.to_str().unwrap(),
            missing.to_str().unwrap(),
        ]))
        .unwrap();

    assert_eq!(lines, vec!["Imported 1 of 2 (1 failures)".to_string()]);
    assert!(dir.path().join("Demo/01_vfx/timesheets/003.csv").is_file());
}

#[test]
fn test_lock_commands_go_through_the_ledger() {
    // Arrange
    let dir = tempdir().unwrap();
    let settings = Arc::new(MockSettingsManager::with_default(dir.path()));
    let ledger = Arc::new(MockVersionLedger::default());
    let logic = ProjectManagerLogic::new(settings, ledger.clone());
    let asset = dir.path().join("shot_v2.aep");

    // Act
    let first = logic.run(&cli(&["lock", asset.to_str().unwrap()])).unwrap();
    let second = logic.run(&cli(&["lock", asset.to_str().unwrap()])).unwrap();
    let released = logic.run(&cli(&["unlock", asset.to_str().unwrap()])).unwrap();

    // Assert
    assert_eq!(first, vec!["Locked"]);
    assert_eq!(second, vec!["Already locked"]);
    assert_eq!(released, vec!["Unlocked"]);
    assert!(ledger.locked.lock().unwrap().is_empty());
    assert!(!dir.path().join(".shot_v2.aep.lock").exists());
}

#[test]
fn test_set_default_persists() {
    let dir = tempdir().unwrap();
    let (logic, settings) = setup(dir.path());
    let other = dir.path().join("projects");

    logic
        .run(&cli(&["set-default", other.to_str().unwrap()]))
        .unwrap();

    assert_eq!(settings.current().default_project_path, Some(other));
}

#[test]
fn test_failed_settings_save_does_not_fail_project_creation() {
    let dir = tempdir().unwrap();
    let settings = Arc::new(MockSettingsManager {
        settings: Mutex::new(AppSettings {
            last_project_path: None,
            default_project_path: Some(dir.path().to_path_buf()),
        }),
        fail_saves: true,
    });
    let logic = ProjectManagerLogic::new(settings, Arc::new(CoreVersionLedger::new()));

    assert!(logic.run(&cli(&["new", "Demo"])).is_ok());
    assert!(dir.path().join("Demo/project_config.json").is_file());
}

#[test]
fn test_format_statistics_lists_categories() {
    let stats = VersionStatistics {
        total_files: 3,
        versioned_files: 2,
        total_size: 2 * 1024 * 1024,
        ..VersionStatistics::default()
    };
    let lines = format_statistics(&stats);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "files: 3 (2 versioned), total 2.0 MiB");
}
