use crate::app_logic::cli::{Cli, Command};
use crate::core::{
    self, AppSettings, BatchAepScope, BatchAepSettings, CoreProjectRegistry, FileKind,
    ImportRequest, LabelsError, LedgerError, ProjectError, ProjectRegistryOperations,
    ProjectServices, ProjectTree, RegistryError, SettingsError, SettingsManagerOperations,
    VersionLabels, VersionLedgerOperations, VersionStatistics,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub(crate) const APP_NAME: &str = "AnimProjectManager";

#[derive(Debug)]
pub enum AppError {
    Project(ProjectError),
    Settings(SettingsError),
    Registry(RegistryError),
    Ledger(LedgerError),
    Labels(LabelsError),
    NoProjectSelected,
    NoRegistry,
}

impl From<ProjectError> for AppError {
    fn from(err: ProjectError) -> Self {
        AppError::Project(err)
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        AppError::Settings(err)
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::Registry(err)
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::Ledger(err)
    }
}

impl From<LabelsError> for AppError {
    fn from(err: LabelsError) -> Self {
        AppError::Labels(err)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Project(e) => write!(f, "{e}"),
            AppError::Settings(e) => write!(f, "{e}"),
            AppError::Registry(e) => write!(f, "{e}"),
            AppError::Ledger(e) => write!(f, "{e}"),
            AppError::Labels(e) => write!(f, "{e}"),
            AppError::NoProjectSelected => write!(
                f,
                "No project selected; pass --project or open one with `open <path>`"
            ),
            AppError::NoRegistry => write!(f, "The project registry location is unavailable"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Project(e) => Some(e),
            AppError::Settings(e) => Some(e),
            AppError::Registry(e) => Some(e),
            AppError::Ledger(e) => Some(e),
            AppError::Labels(e) => Some(e),
            AppError::NoProjectSelected | AppError::NoRegistry => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/*
 * Carries out parsed commands against the core. Settings (last project, default
 * project folder) are read and written through `SettingsManagerOperations`; the
 * project registry is located from those settings on each run. Version commands
 * on loose paths go through the injected `VersionLedgerOperations`. Output is
 * returned as lines so callers decide how to print it.
 */
pub struct ProjectManagerLogic {
    pub(crate) settings_manager: Arc<dyn SettingsManagerOperations>,
    pub(crate) ledger: Arc<dyn VersionLedgerOperations>,
    pub(crate) app_name: String,
    pub(crate) cancel_flag: Arc<AtomicBool>,
}

impl ProjectManagerLogic {
    pub fn new(
        settings_manager: Arc<dyn SettingsManagerOperations>,
        ledger: Arc<dyn VersionLedgerOperations>,
    ) -> Self {
        ProjectManagerLogic {
            settings_manager,
            ledger,
            app_name: APP_NAME.to_string(),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    fn load_settings(&self) -> AppSettings {
        match self.settings_manager.load_settings(&self.app_name) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ProjectManagerLogic: Could not load settings, using defaults: {e}");
                AppSettings::default()
            }
        }
    }

    fn open_registry(&self, settings: &AppSettings) -> Option<CoreProjectRegistry> {
        let path = core::path_utils::registry_file_path(
            &self.app_name,
            settings.default_project_path.as_deref(),
        )?;
        log::debug!("ProjectManagerLogic: Using project registry at {path:?}");
        Some(CoreProjectRegistry::new(path))
    }

    fn services(&self, settings: &AppSettings) -> ProjectServices {
        let registry = self
            .open_registry(settings)
            .map(|r| Box::new(r) as Box<dyn ProjectRegistryOperations>);
        if registry.is_none() {
            log::warn!(
                "ProjectManagerLogic: No registry location, project index will not be updated"
            );
        }
        ProjectServices::new(registry)
    }

    fn remember_project(&self, settings: &mut AppSettings, root: &Path) {
        settings.last_project_path = Some(root.to_path_buf());
        if let Err(e) = self.settings_manager.save_settings(&self.app_name, settings) {
            log::warn!("ProjectManagerLogic: Could not remember last project: {e}");
        }
    }

    fn project_root(cli: &Cli, settings: &AppSettings) -> Result<PathBuf> {
        cli.project
            .clone()
            .or_else(|| settings.last_project_path.clone())
            .ok_or(AppError::NoProjectSelected)
    }

    fn open_current(&self, cli: &Cli, settings: &AppSettings) -> Result<ProjectTree> {
        let root = Self::project_root(cli, settings)?;
        Ok(ProjectTree::open_project(&root, self.services(settings))?)
    }

    /* Installs the label override table given with `--labels`, if any. */
    pub fn apply_label_overrides(&self, cli: &Cli) -> Result<()> {
        if let Some(path) = &cli.labels {
            VersionLabels::install_global(VersionLabels::load_overrides(path)?);
        }
        Ok(())
    }

    pub fn run(&self, cli: &Cli) -> Result<Vec<String>> {
        let mut settings = self.load_settings();
        let mut out = Vec::new();
        log::debug!("ProjectManagerLogic: Running {:?}", cli.command);

        match &cli.command {
            Command::New {
                name,
                display_name,
                base,
                no_episode,
            } => {
                let base = base
                    .clone()
                    .or_else(|| settings.default_project_path.clone())
                    .unwrap_or_else(|| PathBuf::from("."));
                let tree = ProjectTree::create_project(
                    name,
                    display_name,
                    &base,
                    *no_episode,
                    self.services(&settings),
                )?;
                out.push(format!("Created project '{}' at {}", name, tree.root().display()));
                self.remember_project(&mut settings, tree.root());
            }
            Command::Open { path } => {
                let tree = ProjectTree::open_project(path, self.services(&settings))?;
                let config = tree.config();
                out.push(format!(
                    "Opened '{}' ({} episodes, {} root cuts, {} reuse groups)",
                    config.project_display_name,
                    config.episodes.len(),
                    config.cuts.len(),
                    tree.reuse_groups().len()
                ));
                self.remember_project(&mut settings, tree.root());
            }
            Command::Episode {
                type_tag,
                identifier,
            } => {
                let mut tree = self.open_current(cli, &settings)?;
                let id = tree.create_episode(type_tag, identifier.as_deref())?;
                out.push(format!("Created episode {id}"));
            }
            Command::Episodes { from, to } => {
                let mut tree = self.open_current(cli, &settings)?;
                let created = tree.batch_create_episodes(*from, *to)?;
                out.push(format!("Created {created} episodes"));
            }
            Command::Cut { cut, episode } => {
                let mut tree = self.open_current(cli, &settings)?;
                let cut = tree.create_cut(cut, episode.as_deref())?;
                out.push(format!("Created cut {cut}"));
            }
            Command::Cuts { from, to, episode } => {
                let mut tree = self.open_current(cli, &settings)?;
                let created = tree.batch_create_cuts(*from, *to, episode.as_deref())?;
                out.push(format!("Created {created} cuts"));
            }
            Command::List { episode } => {
                let tree = self.open_current(cli, &settings)?;
                if episode.is_none() && !tree.config().no_episode {
                    out.extend(tree.list_episodes());
                } else {
                    let scope = episode.as_deref();
                    for cut in tree.list_cuts(scope)? {
                        match tree.config().reuse_group_for(&cut, scope) {
                            Some(group) => {
                                out.push(format!("{cut}  (reuse {})", group.display_name()))
                            }
                            None => out.push(cut.to_string()),
                        }
                    }
                }
            }
            Command::Reuse { cuts, episode } => {
                let mut tree = self.open_current(cli, &settings)?;
                let raw: Vec<&str> = cuts.iter().map(String::as_str).collect();
                let (group, report) = tree.create_reuse_group(&raw, episode.as_deref())?;
                out.push(format!(
                    "Created reuse group {} (main cut {})",
                    group.display_name(),
                    group.main_cut
                ));
                out.push(format!(
                    "moved {}, collisions kept {}, renamed AEPs {}, failures {}",
                    report.moved, report.skipped_collisions, report.renamed_aeps, report.failed
                ));
            }
            Command::Import {
                kind,
                source,
                cut,
                episode,
            } => {
                let tree = self.open_current(cli, &settings)?;
                let outcome = tree.import_material(*kind, source, episode.as_deref(), cut)?;
                out.push(format!("Imported {kind} -> {}", outcome.destination.display()));
                if outcome.failed_items > 0 {
                    out.push(format!("{} items could not be copied", outcome.failed_items));
                }
            }
            Command::ImportMany {
                kind,
                cut,
                sources,
                episode,
            } => {
                let tree = self.open_current(cli, &settings)?;
                let requests: Vec<ImportRequest> = sources
                    .iter()
                    .map(|source| ImportRequest {
                        kind: *kind,
                        source: source.clone(),
                        episode_id: episode.clone(),
                        cut: cut.clone(),
                    })
                    .collect();
                let report = tree.import_batch(&requests, &self.cancel_flag);
                out.push(format!(
                    "Imported {} of {} ({} failures){}",
                    report.imported,
                    requests.len(),
                    report.failed,
                    if report.cancelled { " (cancelled)" } else { "" }
                ));
            }
            Command::Templates { cut, episode } => {
                let tree = self.open_current(cli, &settings)?;
                let copied = tree.copy_aep_templates(episode.as_deref(), cut)?;
                out.push(format!(
                    "Copied {copied} templates from {}",
                    tree.layout().templates_dir().display()
                ));
            }
            Command::BatchTemplates {
                episode,
                from,
                to,
                include_existing,
                overwrite,
                skip_reuse,
            } => {
                let tree = self.open_current(cli, &settings)?;
                let scope = match (episode, from, to) {
                    (Some(ep), Some(from), Some(to)) => BatchAepScope::EpisodeRange {
                        episode_id: ep.clone(),
                        from: *from,
                        to: *to,
                    },
                    (Some(ep), _, _) => BatchAepScope::Episode(ep.clone()),
                    (None, _, _) => BatchAepScope::All,
                };
                let batch_settings = BatchAepSettings {
                    scope,
                    skip_existing: !include_existing,
                    overwrite: *overwrite,
                    skip_reuse: *skip_reuse,
                };
                let report = tree.batch_copy_aep_templates(&batch_settings, &self.cancel_flag)?;
                out.push(format!("Templates copied into {} cuts", report.cuts_succeeded));
                out.push(format!(
                    "files copied {}, overwritten {}, skipped {}, reuse groups skipped {}, failures {}{}",
                    report.files_copied,
                    report.files_overwritten,
                    report.files_skipped,
                    report.reuse_skipped,
                    report.failed,
                    if report.cancelled { " (cancelled)" } else { "" }
                ));
            }
            Command::CollectRenders => {
                let tree = self.open_current(cli, &settings)?;
                let report = tree.collect_latest_renders(&self.cancel_flag);
                out.push(format!(
                    "Renders copied {}, skipped {}, failures {}{}",
                    report.copied,
                    report.skipped,
                    report.failed,
                    if report.cancelled { " (cancelled)" } else { "" }
                ));
            }
            Command::Families { dir, pattern } => {
                let labels = VersionLabels::global();
                for (base, family) in self.ledger.group_families(dir, pattern)? {
                    let latest = core::version_ledger::latest_of(&family).map(|e| e.path.clone());
                    out.push(format!("{base} ({} versions)", family.len()));
                    for entry in &family {
                        let marker = if Some(&entry.path) == latest.as_ref() { "*" } else { " " };
                        let lock = if self.ledger.is_locked(&entry.path) {
                            " [locked]"
                        } else {
                            ""
                        };
                        let name =
                            core::file_system::file_name_string(&entry.path).unwrap_or_default();
                        out.push(format!(
                            "  {marker} {name}  {}{lock}",
                            labels.label(&entry.token, FileKind::from_path(&entry.path))
                        ));
                    }
                }
            }
            Command::Lock { path } => {
                let changed = self.ledger.lock(path)?;
                out.push(if changed { "Locked" } else { "Already locked" }.to_string());
            }
            Command::Unlock { path } => {
                let changed = self.ledger.unlock(path)?;
                out.push(if changed { "Unlocked" } else { "Was not locked" }.to_string());
            }
            Command::LockAll => {
                let tree = self.open_current(cli, &settings)?;
                let report = tree.ledger().lock_all_latest(tree.root());
                out.push(format!(
                    "Locked {} latest versions ({} already locked, {} failures)",
                    report.newly_locked, report.already_locked, report.failed
                ));
            }
            Command::UnlockAll => {
                let tree = self.open_current(cli, &settings)?;
                let report = tree.ledger().unlock_all(tree.root());
                out.push(format!(
                    "Removed {} lock markers ({} failures)",
                    report.removed, report.failed
                ));
            }
            Command::PurgeOld => {
                let tree = self.open_current(cli, &settings)?;
                let outcome = tree
                    .ledger()
                    .delete_all_old_versions(tree.root(), &self.cancel_flag);
                out.push(format!(
                    "Deleted {} old versions ({} failures){}",
                    outcome.deleted,
                    outcome.failed,
                    if outcome.cancelled { " (cancelled)" } else { "" }
                ));
            }
            Command::Stats => {
                let tree = self.open_current(cli, &settings)?;
                out.extend(format_statistics(
                    &tree.ledger().aggregate_statistics(tree.root()),
                ));
            }
            Command::Projects => {
                let registry = self.open_registry(&settings).ok_or(AppError::NoRegistry)?;
                for info in registry.list_projects()? {
                    out.push(format!(
                        "{}  {}  episodes: {}  last used: {}",
                        info.project_name, info.project_path, info.episode_count, info.last_accessed
                    ));
                }
            }
            Command::Forget { name } => {
                let registry = self.open_registry(&settings).ok_or(AppError::NoRegistry)?;
                let removed = registry.unregister_project(name)?;
                out.push(if removed {
                    format!("Removed '{name}' from the registry")
                } else {
                    format!("'{name}' is not registered")
                });
            }
            Command::SetDefault { path } => {
                settings.default_project_path = Some(path.clone());
                self.settings_manager.save_settings(&self.app_name, &settings)?;
                out.push(format!("Default project folder set to {}", path.display()));
            }
        }
        Ok(out)
    }
}

fn mib(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
}

pub(crate) fn format_statistics(stats: &VersionStatistics) -> Vec<String> {
    let mut lines = vec![
        format!(
            "files: {} ({} versioned), total {}",
            stats.total_files,
            stats.versioned_files,
            mib(stats.total_size)
        ),
        format!(
            "latest: {} ({}), old: {} ({})",
            stats.latest_versions,
            mib(stats.latest_size),
            stats.old_versions,
            mib(stats.old_size)
        ),
        format!(
            "locked: {} (latest {}, old {})",
            stats.locked_files, stats.locked_latest, stats.locked_old
        ),
        format!(
            "deletable old: {} ({})",
            stats.deletable_old,
            mib(stats.deletable_size)
        ),
    ];
    for (category, numbers) in &stats.per_category {
        lines.push(format!(
            "  {category:?}: {} ({})",
            numbers.count,
            mib(numbers.size)
        ));
    }
    lines
}
