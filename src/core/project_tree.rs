/*
 * The project tree: the operations that create and populate a project on disk
 * and keep `project_config.json` in step with it. A `ProjectTree` holds the
 * in-memory configuration of one open project together with its collaborators
 * (config store, optional registry, version ledger) and saves the full config
 * after every mutating call.
 *
 * Every path that addresses a cut's working folder first goes through the reuse
 * indirection (`ProjectConfig::main_cut_for`). Config-level problems come back as
 * `ProjectError`; per-item filesystem failures inside bulk operations are logged
 * and counted in the returned report instead.
 */
use crate::core::cut_id::{CutId, CutIdError};
use crate::core::episode::{self, NUMBERED_EPISODE_TYPE};
use crate::core::file_system::{self, FileSystemError};
use crate::core::models::ProjectConfig;
use crate::core::project_config::{
    ConfigStoreError, CoreProjectConfigStore, ProjectConfigStoreOperations,
};
use crate::core::project_layout::{
    BG_SUBDIR, CELL_SUBDIR, CUT_SUBDIRS, EPISODE_SCAFFOLD, PROJECT_SCAFFOLD, ProjectLayout,
    RENDER_SUBDIRS,
};
use crate::core::registry::ProjectRegistryOperations;
use crate::core::reuse_group::{self, MergeReport, ReuseGroup, ReuseGroupError};
use crate::core::version_ledger::{
    self, CoreVersionLedger, EntryKind, FamilyFilter, LedgerError, VersionLedgerOperations,
};
use crate::core::version_token;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::macros::format_description;

const DEFAULT_TEMPLATE_SUFFIX: &str = "_v0";
const RENDER_COLLECT_SUBDIR: &str = "prores";
const TIMESHEET_EXTENSION: &str = "csv";

#[derive(Debug)]
pub enum ProjectError {
    InvalidCutIdentifier(String),
    DuplicateEpisode(String),
    DuplicateCut { cut: String, scope: String },
    UnknownEpisode(String),
    UnknownCut(String),
    AlreadyInGroup { cut: String, group: String },
    InsufficientGroupSize(usize),
    MissingSourceFile(PathBuf),
    PermissionOrIo(FileSystemError),
    EpisodeRequired,
    EpisodeTypeNotAllowed(String),
    InvalidEpisodeIdentifier(String),
    InvalidProjectName(String),
    ProjectAlreadyExists(PathBuf),
    ConfigStore(ConfigStoreError),
    Ledger(LedgerError),
}

impl From<CutIdError> for ProjectError {
    fn from(err: CutIdError) -> Self {
        match err {
            CutIdError::InvalidCutIdentifier(text) => ProjectError::InvalidCutIdentifier(text),
        }
    }
}

impl From<ReuseGroupError> for ProjectError {
    fn from(err: ReuseGroupError) -> Self {
        match err {
            ReuseGroupError::InsufficientGroupSize(n) => ProjectError::InsufficientGroupSize(n),
            ReuseGroupError::UnknownCut(cut) => ProjectError::UnknownCut(cut),
            ReuseGroupError::AlreadyInGroup { cut, group } => {
                ProjectError::AlreadyInGroup { cut, group }
            }
        }
    }
}

impl From<FileSystemError> for ProjectError {
    fn from(err: FileSystemError) -> Self {
        ProjectError::PermissionOrIo(err)
    }
}

impl From<std::io::Error> for ProjectError {
    fn from(err: std::io::Error) -> Self {
        ProjectError::PermissionOrIo(FileSystemError::Io(err))
    }
}

impl From<ConfigStoreError> for ProjectError {
    fn from(err: ConfigStoreError) -> Self {
        ProjectError::ConfigStore(err)
    }
}

impl From<LedgerError> for ProjectError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::FileSystem(e) => ProjectError::PermissionOrIo(e),
            other => ProjectError::Ledger(other),
        }
    }
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::InvalidCutIdentifier(text) => {
                write!(f, "Invalid cut identifier: '{text}'")
            }
            ProjectError::DuplicateEpisode(id) => write!(f, "Episode '{id}' already exists"),
            ProjectError::DuplicateCut { cut, scope } => {
                write!(f, "Cut {cut} already exists in {scope}")
            }
            ProjectError::UnknownEpisode(id) => write!(f, "Episode '{id}' does not exist"),
            ProjectError::UnknownCut(cut) => write!(f, "Cut {cut} does not exist"),
            ProjectError::AlreadyInGroup { cut, group } => {
                write!(f, "Cut {cut} already belongs to reuse group {group}")
            }
            ProjectError::InsufficientGroupSize(n) => {
                write!(f, "A reuse group needs at least 2 distinct cuts, got {n}")
            }
            ProjectError::MissingSourceFile(p) => write!(f, "Source {p:?} does not exist"),
            ProjectError::PermissionOrIo(e) => write!(f, "{e}"),
            ProjectError::EpisodeRequired => {
                write!(f, "This project uses episodes; choose an episode first")
            }
            ProjectError::EpisodeTypeNotAllowed(tag) => write!(
                f,
                "Episode type '{tag}' is not allowed in a project without episodes"
            ),
            ProjectError::InvalidEpisodeIdentifier(text) => {
                write!(f, "Invalid episode identifier: '{text}'")
            }
            ProjectError::InvalidProjectName(name) => write!(f, "Invalid project name: '{name}'"),
            ProjectError::ProjectAlreadyExists(p) => {
                write!(f, "A project already exists at {p:?}")
            }
            ProjectError::ConfigStore(e) => write!(f, "{e}"),
            ProjectError::Ledger(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectError::PermissionOrIo(e) => Some(e),
            ProjectError::ConfigStore(e) => Some(e),
            ProjectError::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/* The collaborators a project tree talks to. */
pub struct ProjectServices {
    pub store: Box<dyn ProjectConfigStoreOperations>,
    pub registry: Option<Box<dyn ProjectRegistryOperations>>,
    pub ledger: Box<dyn VersionLedgerOperations>,
}

impl ProjectServices {
    pub fn new(registry: Option<Box<dyn ProjectRegistryOperations>>) -> Self {
        ProjectServices {
            store: Box::new(CoreProjectConfigStore::new()),
            registry,
            ledger: Box::new(CoreVersionLedger::new()),
        }
    }
}

impl Default for ProjectServices {
    fn default() -> Self {
        Self::new(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Bg,
    Cell,
    Cg3d,
    Timesheet,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Bg => "bg",
            MaterialKind::Cell => "cell",
            MaterialKind::Cg3d => "3dcg",
            MaterialKind::Timesheet => "timesheet",
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bg" => Ok(MaterialKind::Bg),
            "cell" => Ok(MaterialKind::Cell),
            "3dcg" | "cg" => Ok(MaterialKind::Cg3d),
            "timesheet" | "ts" => Ok(MaterialKind::Timesheet),
            other => Err(format!(
                "unknown material kind '{other}' (expected bg, cell, 3dcg or timesheet)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub destination: PathBuf,
    /* Version embedded in the destination name, for versioned kinds. */
    pub version: Option<u32>,
    pub failed_items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub kind: MaterialKind,
    pub source: PathBuf,
    pub episode_id: Option<String>,
    pub cut: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchImportReport {
    pub imported: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAepScope {
    All,
    Episode(String),
    /* Inclusive range on the numeric part of the cut id. */
    EpisodeRange { episode_id: String, from: u32, to: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAepSettings {
    pub scope: BatchAepScope,
    pub skip_existing: bool,
    pub overwrite: bool,
    pub skip_reuse: bool,
}

impl Default for BatchAepSettings {
    fn default() -> Self {
        BatchAepSettings {
            scope: BatchAepScope::All,
            skip_existing: true,
            overwrite: false,
            skip_reuse: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchAepReport {
    pub cuts_succeeded: usize,
    pub files_copied: usize,
    pub files_overwritten: usize,
    pub files_skipped: usize,
    pub reuse_skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderCollectReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct TemplateTally {
    copied: usize,
    overwritten: usize,
    skipped: usize,
    failed: usize,
}

pub struct ProjectTree {
    layout: ProjectLayout,
    config: ProjectConfig,
    services: ProjectServices,
}

fn validate_project_name(name: &str) -> Result<()> {
    const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed != name
        || name == "."
        || name == ".."
        || name.chars().any(|c| FORBIDDEN.contains(&c) || c.is_control())
    {
        return Err(ProjectError::InvalidProjectName(name.to_string()));
    }
    Ok(())
}

fn readme_text(layout: &ProjectLayout, config: &ProjectConfig) -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let created = now
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default();
    let mode = if config.no_episode {
        "Single / PV mode (cuts live directly under 01_vfx; special episodes allowed)"
    } else {
        "Episode mode"
    };
    format!(
        "# {name}\n\
         \n\
         Created: {created}\n\
         \n\
         ## Folder layout\n\
         \n\
         - `00_reference_project/` - reference material shared by the whole project\n\
         - `01_vfx/` - VFX / AE working files\n\
         - `02_3dcg/` - 3DCG working files (created on demand)\n\
         - `05_stills/` - preview stills\n\
         - `06_render/` - final render output\n\
         - `07_master_assets/` - shared assets and AEP templates\n\
         - `08_tools/` - automation scripts and tools\n\
         - `09_edit/` - editorial projects and collected footage\n\
         - `98_tmp/` - scratch files\n\
         - `99_other/` - everything else\n\
         \n\
         ## Project mode\n\
         \n\
         {mode}\n",
        name = layout.dir_name(),
    )
}

fn is_aep(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("aep"))
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/*
 * The newest `.mov` of each family in `dir`. Unversioned files count as `v0` of
 * the family named by their whole stem.
 */
fn latest_movies(dir: &Path) -> std::result::Result<Vec<PathBuf>, LedgerError> {
    let filter = FamilyFilter::new(&["*.mov"], EntryKind::Files)?;
    let families = version_ledger::group_families_with_unversioned(dir, &filter)?;
    Ok(families
        .values()
        .filter_map(|family| version_ledger::latest_of(family))
        .map(|entry| entry.path.clone())
        .collect())
}

/* First free `<stem>_<n>.<ext>` in `dir`, counting from 1. */
fn numbered_target(dir: &Path, file_name: &str) -> PathBuf {
    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{counter}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

impl ProjectTree {
    /*
     * Creates `<base_dir>/<name>` with the fixed scaffold, a fresh configuration
     * and the README. Fails if a project config already sits at that location.
     */
    pub fn create_project(
        name: &str,
        display_name: &str,
        base_dir: &Path,
        no_episode: bool,
        services: ProjectServices,
    ) -> Result<Self> {
        validate_project_name(name)?;
        let layout = ProjectLayout::new(base_dir.join(name));
        if services.store.config_exists(layout.root()) {
            return Err(ProjectError::ProjectAlreadyExists(layout.root().to_path_buf()));
        }
        log::info!("ProjectTree: Creating project '{name}' at {:?}", layout.root());

        for relative in PROJECT_SCAFFOLD {
            file_system::ensure_dir(&layout.root().join(relative))?;
        }

        let config = ProjectConfig::new(
            name,
            display_name,
            Some(layout.root().to_string_lossy().into_owned()),
            no_episode,
        );
        let mut tree = ProjectTree {
            layout,
            config,
            services,
        };
        tree.save()?;
        fs::write(tree.layout.readme_file(), readme_text(&tree.layout, &tree.config))?;
        Ok(tree)
    }

    /*
     * Loads an existing project. A config carrying legacy keys is re-saved in
     * the current shape straight away.
     */
    pub fn open_project(project_root: &Path, services: ProjectServices) -> Result<Self> {
        let loaded = services.store.load_config(project_root)?;
        let mut tree = ProjectTree {
            layout: ProjectLayout::new(project_root.to_path_buf()),
            config: loaded.config,
            services,
        };
        log::info!(
            "ProjectTree: Opened project '{}' at {project_root:?}",
            tree.config.project_name
        );
        if loaded.migrated {
            log::info!("ProjectTree: Re-saving migrated configuration");
            tree.save()?;
        }
        tree.touch_registry();
        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn ledger(&self) -> &dyn VersionLedgerOperations {
        self.services.ledger.as_ref()
    }

    /*
     * Writes the configuration, then upserts the registry record. A registry
     * failure is logged and never turns a successful save into an error.
     */
    fn save(&mut self) -> Result<()> {
        self.services
            .store
            .save_config(self.layout.root(), &mut self.config)?;
        if let Some(registry) = &self.services.registry {
            if let Err(e) = registry.register_project(&self.config, self.layout.root()) {
                log::warn!(
                    "ProjectTree: Registry update for '{}' failed: {e}",
                    self.config.project_name
                );
            }
        }
        Ok(())
    }

    fn touch_registry(&self) {
        let Some(registry) = &self.services.registry else {
            return;
        };
        match registry.update_access_time(&self.config.project_name) {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = registry.register_project(&self.config, self.layout.root()) {
                    log::warn!("ProjectTree: Registry registration failed: {e}");
                }
            }
            Err(e) => log::warn!("ProjectTree: Registry access-time update failed: {e}"),
        }
    }

    /*
     * Maps a caller-supplied episode to the scope cuts live in: an existing
     * episode, or the project root for projects without episodes.
     */
    fn resolve_scope<'a>(&self, episode_id: Option<&'a str>) -> Result<Option<&'a str>> {
        match episode_id.map(str::trim).filter(|ep| !ep.is_empty()) {
            Some(ep) if self.config.has_episode(ep) => Ok(Some(ep)),
            Some(ep) => Err(ProjectError::UnknownEpisode(ep.to_string())),
            None if self.config.no_episode => Ok(None),
            None => Err(ProjectError::EpisodeRequired),
        }
    }

    fn scope_label(scope: Option<&str>) -> String {
        scope.unwrap_or("project root").to_string()
    }

    fn existing_cut(&self, raw_cut: &str, scope: Option<&str>) -> Result<CutId> {
        let cut = CutId::parse(raw_cut)?;
        let known = self
            .config
            .cuts_in(scope)
            .is_some_and(|cuts| cuts.contains(&cut));
        if !known {
            return Err(ProjectError::UnknownCut(cut.to_string()));
        }
        Ok(cut)
    }

    /* Cut text used in generated names: the reuse group's members or the cut itself. */
    fn cut_name_part(&self, cut: &CutId, scope: Option<&str>) -> String {
        self.config
            .reuse_group_for(cut, scope)
            .map_or_else(|| cut.to_string(), ReuseGroup::display_name)
    }

    fn asset_base(&self, cut: &CutId, scope: Option<&str>) -> String {
        ProjectLayout::asset_base_name(
            &self.config.project_name,
            scope,
            &self.cut_name_part(cut, scope),
        )
    }

    /*
     * Builds the episode id and checks it names a single folder under the
     * project root. Every episode creation path goes through here.
     */
    fn episode_id_for(type_tag: &str, identifier: Option<&str>) -> Result<String> {
        let invalid = || {
            ProjectError::InvalidEpisodeIdentifier(format!(
                "{type_tag}{}",
                identifier.unwrap_or_default()
            ))
        };
        let episode_id = episode::build_episode_id(type_tag, identifier).ok_or_else(invalid)?;
        if !episode::is_valid_episode_id(&episode_id) {
            log::warn!("ProjectTree: Rejected episode id {episode_id:?}");
            return Err(invalid());
        }
        Ok(episode_id)
    }

    fn add_episode(&mut self, episode_id: String) -> Result<String> {
        if self.config.has_episode(&episode_id) {
            return Err(ProjectError::DuplicateEpisode(episode_id));
        }

        let episode_dir = self.layout.episode_dir(&episode_id);
        for relative in EPISODE_SCAFFOLD {
            file_system::ensure_dir(&episode_dir.join(relative))?;
        }
        file_system::ensure_dir(&self.layout.episode_render_dir(&episode_id))?;

        self.config.episodes.insert(episode_id.clone(), Vec::new());
        self.save()?;
        log::info!("ProjectTree: Created episode '{episode_id}'");
        Ok(episode_id)
    }

    pub fn create_episode(&mut self, type_tag: &str, identifier: Option<&str>) -> Result<String> {
        if self.config.no_episode && episode::is_numbered_type(type_tag) {
            return Err(ProjectError::EpisodeTypeNotAllowed(type_tag.trim().to_string()));
        }
        let episode_id = Self::episode_id_for(type_tag, identifier)?;
        self.add_episode(episode_id)
    }

    /* Creates `ep<from>` through `ep<to>`, skipping ids that already exist. */
    pub fn batch_create_episodes(&mut self, from: u32, to: u32) -> Result<usize> {
        if self.config.no_episode {
            return Err(ProjectError::EpisodeTypeNotAllowed(
                NUMBERED_EPISODE_TYPE.to_string(),
            ));
        }
        let mut created = 0;
        for number in from..=to {
            let identifier = number.to_string();
            let episode_id = Self::episode_id_for(NUMBERED_EPISODE_TYPE, Some(&identifier))?;
            match self.add_episode(episode_id) {
                Ok(_) => created += 1,
                Err(ProjectError::DuplicateEpisode(id)) => {
                    log::debug!("ProjectTree: Episode '{id}' exists, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    pub fn create_cut(&mut self, raw_cut: &str, episode_id: Option<&str>) -> Result<CutId> {
        let cut = CutId::parse(raw_cut)?;
        let scope = self.resolve_scope(episode_id)?;
        if self
            .config
            .cuts_in(scope)
            .is_some_and(|cuts| cuts.contains(&cut))
        {
            return Err(ProjectError::DuplicateCut {
                cut: cut.to_string(),
                scope: Self::scope_label(scope),
            });
        }

        let cut_dir = self.layout.cut_dir(scope, &cut);
        for sub in CUT_SUBDIRS {
            file_system::ensure_dir(&cut_dir.join(sub))?;
        }
        let render_dir = self.layout.cut_render_dir(scope, &cut);
        for sub in RENDER_SUBDIRS {
            file_system::ensure_dir(&render_dir.join(sub))?;
        }

        let base =
            ProjectLayout::asset_base_name(&self.config.project_name, scope, &cut.to_string());
        let tally = self.copy_templates_into(&cut_dir, &base, true);
        if tally.failed > 0 {
            log::warn!(
                "ProjectTree: {} AEP templates could not be copied into {cut_dir:?}",
                tally.failed
            );
        }

        if let Some(cuts) = self.config.cuts_in_mut(scope) {
            cuts.push(cut);
        }
        self.save()?;
        log::info!(
            "ProjectTree: Created cut {cut} in {} ({} templates)",
            Self::scope_label(scope),
            tally.copied
        );
        Ok(cut)
    }

    /* Creates cuts `from` through `to` (plain numbers), skipping existing ones. */
    pub fn batch_create_cuts(
        &mut self,
        from: u32,
        to: u32,
        episode_id: Option<&str>,
    ) -> Result<usize> {
        let scope = self.resolve_scope(episode_id)?;
        let mut created = 0;
        for number in from..=to {
            match self.create_cut(&number.to_string(), scope) {
                Ok(_) => created += 1,
                Err(ProjectError::DuplicateCut { cut, .. }) => {
                    log::debug!("ProjectTree: Cut {cut} exists, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    pub fn list_episodes(&self) -> Vec<String> {
        self.config.episode_ids()
    }

    pub fn list_cuts(&self, episode_id: Option<&str>) -> Result<Vec<CutId>> {
        let scope = self.resolve_scope(episode_id)?;
        let mut cuts = self.config.cuts_in(scope).cloned().unwrap_or_default();
        cuts.sort_by_key(CutId::compare_key);
        Ok(cuts)
    }

    pub fn reuse_groups(&self) -> &[ReuseGroup] {
        &self.config.reuse_cuts
    }

    /*
     * Forms a reuse group from existing cuts of one scope and folds the member
     * folders into the main cut's folder. Merge problems are reported in the
     * returned `MergeReport`; the group record is stored regardless.
     */
    pub fn create_reuse_group(
        &mut self,
        raw_cuts: &[&str],
        episode_id: Option<&str>,
    ) -> Result<(ReuseGroup, MergeReport)> {
        let scope = self.resolve_scope(episode_id)?;
        let cuts = raw_cuts
            .iter()
            .map(|raw| CutId::parse(raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let group = ReuseGroup::new(&cuts, scope)?;
        let scope_cuts = self.config.cuts_in(scope).cloned().unwrap_or_default();
        reuse_group::validate_membership(&self.config.reuse_cuts, &scope_cuts, &group)?;

        let main_dir = self.layout.cut_dir(scope, &group.main_cut);
        let member_dirs: Vec<PathBuf> = group
            .cuts
            .iter()
            .filter(|cut| **cut != group.main_cut)
            .map(|cut| self.layout.cut_dir(scope, cut))
            .filter(|dir| dir.is_dir())
            .collect();
        let member_refs: Vec<&Path> = member_dirs.iter().map(PathBuf::as_path).collect();

        let mut report = MergeReport::default();
        reuse_group::merge_member_dirs(&main_dir, &member_refs, &mut report);
        reuse_group::rename_merged_aeps(&main_dir, &self.config.project_name, &group, &mut report);

        self.config.reuse_cuts.push(group.clone());
        self.save()?;
        log::info!(
            "ProjectTree: Created reuse group {} (main {}): {report:?}",
            group.display_name(),
            group.main_cut
        );
        Ok((group, report))
    }

    /*
     * Copies material into a cut, redirected to the reuse group's main cut when
     * the cut is a member. `bg` files and `cell` folders get the next version
     * number of their family; `3dcg` content is merged without versioning; a
     * timesheet lands in the scope's `timesheets` folder named after the cut.
     */
    pub fn import_material(
        &self,
        kind: MaterialKind,
        source: &Path,
        episode_id: Option<&str>,
        raw_cut: &str,
    ) -> Result<ImportOutcome> {
        let scope = self.resolve_scope(episode_id)?;
        let cut = self.existing_cut(raw_cut, scope)?;
        if !source.exists() {
            return Err(ProjectError::MissingSourceFile(source.to_path_buf()));
        }
        let main_cut = self.config.main_cut_for(&cut, scope);
        let cut_dir = self.layout.cut_dir(scope, &main_cut);
        let base = self.asset_base(&cut, scope);

        let outcome = match kind {
            MaterialKind::Bg => {
                if !source.is_file() {
                    return Err(ProjectError::MissingSourceFile(source.to_path_buf()));
                }
                let bg_dir = cut_dir.join(BG_SUBDIR);
                file_system::ensure_dir(&bg_dir)?;
                let version = self.services.ledger.next_version(&bg_dir, &base)?;
                let extension = source
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                    .unwrap_or_default();
                let destination = bg_dir.join(format!("{base}_T{version}{extension}"));
                file_system::copy_file(source, &destination)?;
                ImportOutcome {
                    destination,
                    version: Some(version),
                    failed_items: 0,
                }
            }
            MaterialKind::Cell => {
                if !source.is_dir() {
                    return Err(ProjectError::MissingSourceFile(source.to_path_buf()));
                }
                let cell_dir = cut_dir.join(CELL_SUBDIR);
                file_system::ensure_dir(&cell_dir)?;
                let version = self.services.ledger.next_version(&cell_dir, &base)?;
                let destination = cell_dir.join(format!("{base}_T{version}"));
                file_system::replace_dir_with_copy(source, &destination)?;
                ImportOutcome {
                    destination,
                    version: Some(version),
                    failed_items: 0,
                }
            }
            MaterialKind::Cg3d => {
                if !source.is_dir() {
                    return Err(ProjectError::MissingSourceFile(source.to_path_buf()));
                }
                let destination = self.layout.cut_cg_dir(scope, &main_cut);
                file_system::ensure_dir(&destination)?;
                let mut failed_items = 0;
                for item in file_system::list_children(source)? {
                    let Some(name) = item.file_name() else {
                        continue;
                    };
                    let target = destination.join(name);
                    let copied = if item.is_dir() {
                        file_system::replace_dir_with_copy(&item, &target)
                    } else {
                        file_system::copy_file(&item, &target).map(|_| ())
                    };
                    if let Err(e) = copied {
                        log::warn!("ProjectTree: Failed to copy {item:?} -> {target:?}: {e}");
                        failed_items += 1;
                    }
                }
                ImportOutcome {
                    destination,
                    version: None,
                    failed_items,
                }
            }
            MaterialKind::Timesheet => {
                if !source.is_file() {
                    return Err(ProjectError::MissingSourceFile(source.to_path_buf()));
                }
                let destination = self.layout.timesheets_dir(scope).join(format!(
                    "{}.{TIMESHEET_EXTENSION}",
                    self.cut_name_part(&cut, scope)
                ));
                file_system::copy_file(source, &destination)?;
                ImportOutcome {
                    destination,
                    version: None,
                    failed_items: 0,
                }
            }
        };
        log::info!(
            "ProjectTree: Imported {kind} {source:?} -> {:?}",
            outcome.destination
        );
        Ok(outcome)
    }

    /* Runs several imports; each failure is logged and counted. */
    pub fn import_batch(
        &self,
        requests: &[ImportRequest],
        cancel_flag: &AtomicBool,
    ) -> BatchImportReport {
        let mut report = BatchImportReport::default();
        for request in requests {
            if cancel_flag.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }
            match self.import_material(
                request.kind,
                &request.source,
                request.episode_id.as_deref(),
                &request.cut,
            ) {
                Ok(_) => report.imported += 1,
                Err(e) => {
                    log::warn!(
                        "ProjectTree: Import of {:?} into cut {} failed: {e}",
                        request.source,
                        request.cut
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn templates(&self) -> Vec<PathBuf> {
        match file_system::list_children(&self.layout.templates_dir()) {
            Ok(children) => children.into_iter().filter(|p| is_aep(p)).collect(),
            Err(e) => {
                log::warn!("ProjectTree: Cannot list AEP templates: {e}");
                Vec::new()
            }
        }
    }

    /*
     * Copies every template into `target_dir` as `<base><version suffix>.<ext>`,
     * keeping the template's own version token (`_v0` when it has none).
     */
    fn copy_templates_into(&self, target_dir: &Path, base: &str, overwrite: bool) -> TemplateTally {
        let mut tally = TemplateTally::default();
        for template in self.templates() {
            let Some(stem) = template.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let suffix = version_token::extract(&stem)
                .map_or_else(|| DEFAULT_TEMPLATE_SUFFIX.to_string(), |t| t.suffix());
            let extension = template
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "aep".to_string());
            let target = target_dir.join(format!("{base}{suffix}.{extension}"));
            if target.exists() {
                if !overwrite {
                    tally.skipped += 1;
                    continue;
                }
                tally.overwritten += 1;
            }
            match file_system::copy_file(&template, &target) {
                Ok(_) => tally.copied += 1,
                Err(e) => {
                    log::warn!("ProjectTree: Failed to copy template {template:?}: {e}");
                    tally.failed += 1;
                }
            }
        }
        tally
    }

    /* Copies the templates into one cut (its main cut's folder for reuse members). */
    pub fn copy_aep_templates(&self, episode_id: Option<&str>, raw_cut: &str) -> Result<usize> {
        let scope = self.resolve_scope(episode_id)?;
        let cut = self.existing_cut(raw_cut, scope)?;
        let main_cut = self.config.main_cut_for(&cut, scope);
        let target_dir = self.layout.cut_dir(scope, &main_cut);
        file_system::ensure_dir(&target_dir)?;
        let tally = self.copy_templates_into(&target_dir, &self.asset_base(&cut, scope), true);
        log::info!(
            "ProjectTree: Copied {} templates into {target_dir:?} ({} failed)",
            tally.copied,
            tally.failed
        );
        Ok(tally.copied)
    }

    fn batch_targets(&self, scope: &BatchAepScope) -> Result<Vec<(Option<String>, CutId)>> {
        let mut targets = Vec::new();
        match scope {
            BatchAepScope::All => {
                targets.extend(self.config.cuts.iter().map(|cut| (None, *cut)));
                for (episode_id, cuts) in &self.config.episodes {
                    targets.extend(cuts.iter().map(|cut| (Some(episode_id.clone()), *cut)));
                }
            }
            BatchAepScope::Episode(episode_id) => {
                let cuts = self
                    .config
                    .cuts_in(Some(episode_id))
                    .ok_or_else(|| ProjectError::UnknownEpisode(episode_id.clone()))?;
                targets.extend(cuts.iter().map(|cut| (Some(episode_id.clone()), *cut)));
            }
            BatchAepScope::EpisodeRange { episode_id, from, to } => {
                let cuts = self
                    .config
                    .cuts_in(Some(episode_id))
                    .ok_or_else(|| ProjectError::UnknownEpisode(episode_id.clone()))?;
                targets.extend(
                    cuts.iter()
                        .filter(|cut| (*from..=*to).contains(&cut.number()))
                        .map(|cut| (Some(episode_id.clone()), *cut)),
                );
            }
        }
        Ok(targets)
    }

    /*
     * Copies the templates into many cuts. Non-main reuse members are always
     * left out since their main cut's folder is the one that gets the files.
     */
    pub fn batch_copy_aep_templates(
        &self,
        settings: &BatchAepSettings,
        cancel_flag: &AtomicBool,
    ) -> Result<BatchAepReport> {
        let targets = self.batch_targets(&settings.scope)?;
        let mut report = BatchAepReport::default();
        if self.templates().is_empty() {
            log::warn!(
                "ProjectTree: No AEP templates in {:?}",
                self.layout.templates_dir()
            );
            return Ok(report);
        }

        for (episode_id, cut) in targets {
            if cancel_flag.load(Ordering::Relaxed) {
                log::info!("ProjectTree: Batch template copy cancelled");
                report.cancelled = true;
                break;
            }
            let scope = episode_id.as_deref();
            if let Some(group) = self.config.reuse_group_for(&cut, scope) {
                if group.main_cut != cut {
                    continue;
                }
                if settings.skip_reuse {
                    report.reuse_skipped += 1;
                    continue;
                }
            }
            let cut_dir = self.layout.cut_dir(scope, &cut);
            if !cut_dir.is_dir() {
                log::debug!("ProjectTree: {cut_dir:?} is missing, skipping");
                continue;
            }
            if settings.skip_existing {
                let existing = file_system::list_children(&cut_dir)
                    .map(|children| children.iter().filter(|p| is_aep(p)).count())
                    .unwrap_or(0);
                if existing > 0 {
                    report.files_skipped += existing;
                    continue;
                }
            }

            let base = self.asset_base(&cut, scope);
            let tally = self.copy_templates_into(&cut_dir, &base, settings.overwrite);
            report.files_copied += tally.copied;
            report.files_overwritten += tally.overwritten;
            report.files_skipped += tally.skipped;
            report.failed += tally.failed;
            if tally.copied > 0 {
                report.cuts_succeeded += 1;
            }
        }
        log::info!("ProjectTree: Batch template copy finished: {report:?}");
        Ok(report)
    }

    /*
     * Gathers the newest ProRes `.mov` of every family from each cut's render
     * folder into `09_edit/footage` (per episode subfolder for episode cuts).
     * An identical-looking target (same size, not older than the source) is
     * skipped; any other name clash gets a `_<n>` counter.
     */
    pub fn collect_latest_renders(&self, cancel_flag: &AtomicBool) -> RenderCollectReport {
        let mut report = RenderCollectReport::default();
        let mut scopes: Vec<(Option<&str>, &Vec<CutId>)> = vec![(None, &self.config.cuts)];
        scopes.extend(
            self.config
                .episodes
                .iter()
                .map(|(ep, cuts)| (Some(ep.as_str()), cuts)),
        );

        'scopes: for (scope, cuts) in scopes {
            let footage_dir = match scope {
                Some(ep) => self.layout.footage_dir().join(ep),
                None => self.layout.footage_dir(),
            };
            for cut in cuts {
                let prores_dir = self
                    .layout
                    .cut_render_dir(scope, cut)
                    .join(RENDER_COLLECT_SUBDIR);
                let movies = match latest_movies(&prores_dir) {
                    Ok(movies) => movies,
                    Err(e) => {
                        log::warn!("ProjectTree: Cannot scan {prores_dir:?}: {e}");
                        report.failed += 1;
                        continue;
                    }
                };
                for movie in movies {
                    if cancel_flag.load(Ordering::Relaxed) {
                        report.cancelled = true;
                        break 'scopes;
                    }
                    let Some(file_name) = file_system::file_name_string(&movie) else {
                        continue;
                    };
                    let mut target = footage_dir.join(&file_name);
                    if target.exists() {
                        let same_size = fs::metadata(&movie)
                            .and_then(|src| fs::metadata(&target).map(|dst| src.len() == dst.len()))
                            .unwrap_or(false);
                        let not_newer = modified(&movie) <= modified(&target);
                        if same_size && not_newer {
                            report.skipped += 1;
                            continue;
                        }
                        target = numbered_target(&footage_dir, &file_name);
                    }
                    match file_system::copy_file(&movie, &target) {
                        Ok(_) => report.copied += 1,
                        Err(e) => {
                            log::warn!("ProjectTree: Failed to copy {movie:?} -> {target:?}: {e}");
                            report.failed += 1;
                        }
                    }
                }
            }
        }
        log::info!("ProjectTree: Render collection finished: {report:?}");
        report
    }
}
