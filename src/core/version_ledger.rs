/*
 * Bookkeeping over versioned assets. Entries of one directory are grouped into
 * families (same stem once the version suffix is stripped), the latest member of
 * each family is identified, and everything older is split into locked and
 * deletable buckets. Locks are the `.<name>.lock` sibling markers managed here.
 *
 * The project-wide operations (lock everything latest, unlock everything, purge
 * old versions, statistics) are compositions of the per-directory primitives over
 * the asset locations discovered in a project tree.
 */
use crate::core::file_system::{self, FileSystemError};
use crate::core::project_layout::{
    BG_SUBDIR, CELL_SUBDIR, RENDER_DIR, TIMESHEETS_DIR, VFX_DIR, is_lock_marker, lock_marker_path,
};
use crate::core::version_token::{self, IMAGE_EXTENSIONS, VersionToken};
use glob::{MatchOptions, Pattern};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use walkdir::WalkDir;

#[derive(Debug)]
pub enum LedgerError {
    FileSystem(FileSystemError),
    Pattern(glob::PatternError),
}

impl From<FileSystemError> for LedgerError {
    fn from(err: FileSystemError) -> Self {
        LedgerError::FileSystem(err)
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::FileSystem(FileSystemError::Io(err))
    }
}

impl From<glob::PatternError> for LedgerError {
    fn from(err: glob::PatternError) -> Self {
        LedgerError::Pattern(err)
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::FileSystem(e) => write!(f, "{e}"),
            LedgerError::Pattern(e) => write!(f, "Invalid family pattern: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::FileSystem(e) => Some(e),
            LedgerError::Pattern(e) => Some(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedEntry {
    pub path: PathBuf,
    pub token: VersionToken,
    pub is_dir: bool,
}

impl VersionedEntry {
    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

/* Families keyed by base name. Members are sorted by path. */
pub type Families = BTreeMap<String, Vec<VersionedEntry>>;

const UNVERSIONED_PREFIX: char = 'v';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Files,
    Dirs,
    Any,
}

/*
 * Which directory entries take part in grouping: names matching any of the
 * glob patterns (case-insensitively) and of the requested kind. Hidden entries
 * (lock markers among them) never match.
 */
#[derive(Debug, Clone)]
pub struct FamilyFilter {
    patterns: Vec<Pattern>,
    kind: EntryKind,
}

impl FamilyFilter {
    pub fn new(patterns: &[&str], kind: EntryKind) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(FamilyFilter { patterns, kind })
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = file_system::file_name_string(path) else {
            return false;
        };
        if name.starts_with('.') {
            return false;
        }
        let kind_ok = match self.kind {
            EntryKind::Files => path.is_file(),
            EntryKind::Dirs => path.is_dir(),
            EntryKind::Any => true,
        };
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        kind_ok && self.patterns.iter().any(|p| p.matches_with(&name, options))
    }
}

/* Directories keep their whole name as the stem; files drop one extension. */
fn entry_stem(path: &Path) -> Option<String> {
    if path.is_dir() {
        file_system::file_name_string(path)
    } else {
        path.file_stem().map(|s| s.to_string_lossy().into_owned())
    }
}

/*
 * Groups the entries of `dir` accepted by `filter`. Entries without a version
 * token are left out. Also returns how many accepted entries were unversioned,
 * which the statistics need.
 */
fn collect_families(
    dir: &Path,
    filter: &FamilyFilter,
    unversioned_as_zero: bool,
) -> Result<(Families, usize)> {
    let mut families = Families::new();
    let mut unversioned = 0;
    for path in file_system::list_children(dir)? {
        if !filter.matches(&path) {
            continue;
        }
        let Some(stem) = entry_stem(&path) else {
            continue;
        };
        let (base, token) = match (version_token::base_name(&stem), version_token::extract(&stem)) {
            (Some(base), Some(token)) => (base.to_string(), token),
            _ if unversioned_as_zero => (stem.clone(), VersionToken::new(UNVERSIONED_PREFIX, 0)),
            _ => {
                unversioned += 1;
                continue;
            }
        };
        let is_dir = path.is_dir();
        families
            .entry(base)
            .or_default()
            .push(VersionedEntry { path, token, is_dir });
    }
    Ok((families, unversioned))
}

pub fn group_families_filtered(dir: &Path, filter: &FamilyFilter) -> Result<Families> {
    collect_families(dir, filter, false).map(|(families, _)| families)
}

/*
 * Like `group_families_filtered`, but an entry without a token joins the family
 * of its whole stem as `v0` instead of being left out.
 */
pub fn group_families_with_unversioned(dir: &Path, filter: &FamilyFilter) -> Result<Families> {
    collect_families(dir, filter, true).map(|(families, _)| families)
}

/* Groups the entries of `dir` whose names match `pattern` (files or folders). */
pub fn group_families(dir: &Path, pattern: &str) -> Result<Families> {
    group_families_filtered(dir, &FamilyFilter::new(&[pattern], EntryKind::Any)?)
}

/*
 * The newest member: highest number, ties broken by the most recent
 * modification time. `None` only for an empty family.
 */
pub fn latest_of(family: &[VersionedEntry]) -> Option<&VersionedEntry> {
    family
        .iter()
        .max_by_key(|entry| (entry.token.number, entry.modified()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    pub keep: Vec<PathBuf>,
    pub locked_old: Vec<PathBuf>,
    pub deletable_old: Vec<PathBuf>,
}

/*
 * Partitions a family. Every member carrying the maximum number is kept, lock
 * marker or not; the rest is locked-old or deletable-old.
 */
pub fn deletion_plan(family: &[VersionedEntry], locked: &HashSet<PathBuf>) -> DeletionPlan {
    let mut plan = DeletionPlan::default();
    let Some(max) = family.iter().map(|e| e.token.number).max() else {
        return plan;
    };
    for entry in family {
        if entry.token.number == max {
            plan.keep.push(entry.path.clone());
        } else if locked.contains(&entry.path) {
            plan.locked_old.push(entry.path.clone());
        } else {
            plan.deletable_old.push(entry.path.clone());
        }
    }
    plan
}

pub fn is_locked(path: &Path) -> bool {
    lock_marker_path(path).is_some_and(|marker| marker.exists())
}

/* Members of `family` that have a lock marker on disk. */
pub fn locked_paths(family: &[VersionedEntry]) -> HashSet<PathBuf> {
    family
        .iter()
        .filter(|entry| is_locked(&entry.path))
        .map(|entry| entry.path.clone())
        .collect()
}

/* Creates the marker. Returns `false` when the asset was already locked. */
pub fn lock(path: &Path) -> Result<bool> {
    let marker = lock_marker_path(path)
        .ok_or_else(|| FileSystemError::InvalidPath(path.to_path_buf()))?;
    if marker.exists() {
        return Ok(false);
    }
    File::create(&marker)?;
    log::debug!("VersionLedger: Locked {path:?}");
    Ok(true)
}

/* Removes the marker. Returns `false` when the asset was not locked. */
pub fn unlock(path: &Path) -> Result<bool> {
    let marker = lock_marker_path(path)
        .ok_or_else(|| FileSystemError::InvalidPath(path.to_path_buf()))?;
    if !marker.exists() {
        return Ok(false);
    }
    fs::remove_file(&marker)?;
    log::debug!("VersionLedger: Unlocked {path:?}");
    Ok(true)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub deleted: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl DeletionOutcome {
    fn absorb(&mut self, other: DeletionOutcome) {
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.cancelled |= other.cancelled;
    }
}

/*
 * Best-effort removal of each path (folders recursively). The flag is checked
 * before every item; whatever was removed before cancellation stays removed.
 */
pub fn apply_deletion(paths: &[PathBuf], cancel_flag: &AtomicBool) -> DeletionOutcome {
    let mut outcome = DeletionOutcome::default();
    for path in paths {
        if cancel_flag.load(Ordering::Relaxed) {
            log::info!("VersionLedger: Deletion cancelled after {} items", outcome.deleted);
            outcome.cancelled = true;
            break;
        }
        match file_system::remove_entry(path) {
            Ok(()) => outcome.deleted += 1,
            Err(e) => {
                log::warn!("VersionLedger: Failed to delete {path:?}: {e}");
                outcome.failed += 1;
            }
        }
    }
    outcome
}

/*
 * Next free version number for `base` in `dir`: one past the highest existing
 * member, or 1 when the family is empty.
 */
pub fn next_version(dir: &Path, base: &str) -> Result<u32> {
    let families = group_families(dir, "*")?;
    let next = families
        .get(base)
        .and_then(|family| family.iter().map(|e| e.token.number).max())
        .map_or(1, |max| max.saturating_add(1));
    Ok(next)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetCategory {
    Aep,
    Bg,
    Cell,
    Render,
}

impl AssetCategory {
    pub fn filter(&self) -> Result<FamilyFilter> {
        match self {
            AssetCategory::Aep => FamilyFilter::new(&["*.aep"], EntryKind::Files),
            AssetCategory::Bg => {
                let patterns: Vec<String> =
                    IMAGE_EXTENSIONS.iter().map(|ext| format!("*.{ext}")).collect();
                let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
                FamilyFilter::new(&refs, EntryKind::Files)
            }
            AssetCategory::Cell => FamilyFilter::new(&["*"], EntryKind::Dirs),
            AssetCategory::Render => FamilyFilter::new(&["*.mov", "*.mp4"], EntryKind::Files),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocation {
    pub dir: PathBuf,
    pub category: AssetCategory,
}

/* Immediate subdirectories of `dir`, sorted, hidden ones excluded. */
fn child_dirs(dir: &Path) -> Vec<PathBuf> {
    file_system::list_children(dir)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| p.is_dir())
        .filter(|p| file_system::file_name_string(p).is_some_and(|n| !n.starts_with('.')))
        .collect()
}

/*
 * Every directory holding versioned assets: for each `01_vfx` folder (project
 * root and every episode) the cut folders' AEPs, `bg` images and `cell` folders,
 * plus the `prores` and `mp4` folders anywhere under `06_render`.
 */
pub fn asset_locations(project_root: &Path) -> Vec<AssetLocation> {
    let mut vfx_dirs = vec![project_root.join(VFX_DIR)];
    vfx_dirs.extend(
        child_dirs(project_root)
            .into_iter()
            .map(|dir| dir.join(VFX_DIR))
            .filter(|dir| dir.is_dir()),
    );

    let mut locations = Vec::new();
    for vfx_dir in vfx_dirs.iter().filter(|d| d.is_dir()) {
        for cut_dir in child_dirs(vfx_dir) {
            if file_system::file_name_string(&cut_dir).as_deref() == Some(TIMESHEETS_DIR) {
                continue;
            }
            locations.push(AssetLocation {
                dir: cut_dir.clone(),
                category: AssetCategory::Aep,
            });
            let subdirs = [
                (BG_SUBDIR, AssetCategory::Bg),
                (CELL_SUBDIR, AssetCategory::Cell),
            ];
            for (sub, category) in subdirs {
                let dir = cut_dir.join(sub);
                if dir.is_dir() {
                    locations.push(AssetLocation { dir, category });
                }
            }
        }
    }

    let render_root = project_root.join(RENDER_DIR);
    if render_root.is_dir() {
        let mut render_dirs: Vec<PathBuf> = WalkDir::new(&render_root)
            .min_depth(2)
            .max_depth(3)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .filter(|entry| matches!(entry.file_name().to_str(), Some("prores") | Some("mp4")))
            .map(|entry| entry.into_path())
            .collect();
        render_dirs.sort();
        locations.extend(render_dirs.into_iter().map(|dir| AssetLocation {
            dir,
            category: AssetCategory::Render,
        }));
    }
    log::trace!(
        "VersionLedger: Found {} asset locations under {project_root:?}",
        locations.len()
    );
    locations
}

fn location_families(location: &AssetLocation) -> Result<(Families, usize)> {
    collect_families(&location.dir, &location.category.filter()?, false)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockReport {
    pub newly_locked: usize,
    pub already_locked: usize,
    pub failed: usize,
}

pub fn lock_all_latest(project_root: &Path) -> LockReport {
    let mut report = LockReport::default();
    for location in asset_locations(project_root) {
        let families = match location_families(&location) {
            Ok((families, _)) => families,
            Err(e) => {
                log::warn!("VersionLedger: Cannot scan {:?}: {e}", location.dir);
                report.failed += 1;
                continue;
            }
        };
        for family in families.values() {
            let Some(latest) = latest_of(family) else {
                continue;
            };
            match lock(&latest.path) {
                Ok(true) => report.newly_locked += 1,
                Ok(false) => report.already_locked += 1,
                Err(e) => {
                    log::warn!("VersionLedger: Failed to lock {:?}: {e}", latest.path);
                    report.failed += 1;
                }
            }
        }
    }
    log::info!(
        "VersionLedger: Locked {} latest versions ({} already locked, {} failures)",
        report.newly_locked,
        report.already_locked,
        report.failed
    );
    report
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnlockReport {
    pub removed: usize,
    pub failed: usize,
}

/* Removes every lock marker anywhere below the project root. */
pub fn unlock_all(project_root: &Path) -> UnlockReport {
    let mut report = UnlockReport::default();
    let markers: Vec<PathBuf> = WalkDir::new(project_root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_lock_marker(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    for marker in markers {
        match fs::remove_file(&marker) {
            Ok(()) => report.removed += 1,
            Err(e) => {
                log::warn!("VersionLedger: Failed to remove lock marker {marker:?}: {e}");
                report.failed += 1;
            }
        }
    }
    log::info!("VersionLedger: Removed {} lock markers", report.removed);
    report
}

/* Deletes the deletable-old members of every family in every asset location. */
pub fn delete_all_old_versions(project_root: &Path, cancel_flag: &AtomicBool) -> DeletionOutcome {
    let mut outcome = DeletionOutcome::default();
    for location in asset_locations(project_root) {
        if cancel_flag.load(Ordering::Relaxed) {
            outcome.cancelled = true;
            break;
        }
        let families = match location_families(&location) {
            Ok((families, _)) => families,
            Err(e) => {
                log::warn!("VersionLedger: Cannot scan {:?}: {e}", location.dir);
                outcome.failed += 1;
                continue;
            }
        };
        let deletable: Vec<PathBuf> = families
            .values()
            .flat_map(|family| deletion_plan(family, &locked_paths(family)).deletable_old)
            .collect();
        outcome.absorb(apply_deletion(&deletable, cancel_flag));
        if outcome.cancelled {
            break;
        }
    }
    log::info!(
        "VersionLedger: Deleted {} old versions ({} failures{})",
        outcome.deleted,
        outcome.failed,
        if outcome.cancelled { ", cancelled" } else { "" }
    );
    outcome
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryStatistics {
    pub count: usize,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionStatistics {
    pub total_files: usize,
    pub versioned_files: usize,
    pub latest_versions: usize,
    pub old_versions: usize,
    pub locked_files: usize,
    pub locked_latest: usize,
    pub locked_old: usize,
    pub deletable_old: usize,
    pub total_size: u64,
    pub latest_size: u64,
    pub old_size: u64,
    pub deletable_size: u64,
    pub per_category: BTreeMap<AssetCategory, CategoryStatistics>,
}

fn size_of(paths: &[PathBuf]) -> u64 {
    paths.iter().map(|p| file_system::entry_size(p)).sum()
}

/* Read-only rollup of families and deletion plans over every asset location. */
pub fn aggregate_statistics(project_root: &Path) -> VersionStatistics {
    let mut stats = VersionStatistics::default();
    for location in asset_locations(project_root) {
        let (families, unversioned) = match location_families(&location) {
            Ok(scan) => scan,
            Err(e) => {
                log::warn!("VersionLedger: Cannot scan {:?}: {e}", location.dir);
                continue;
            }
        };
        let category = stats.per_category.entry(location.category).or_default();
        category.count += unversioned;
        stats.total_files += unversioned;

        for family in families.values() {
            let locked = locked_paths(family);
            let plan = deletion_plan(family, &locked);
            let family_size = family.iter().map(|e| file_system::entry_size(&e.path)).sum::<u64>();

            stats.total_files += family.len();
            stats.versioned_files += family.len();
            stats.latest_versions += plan.keep.len();
            stats.old_versions += plan.locked_old.len() + plan.deletable_old.len();
            stats.locked_latest += plan.keep.iter().filter(|p| locked.contains(*p)).count();
            stats.locked_old += plan.locked_old.len();
            stats.deletable_old += plan.deletable_old.len();

            let latest_size = size_of(&plan.keep);
            let deletable_size = size_of(&plan.deletable_old);
            stats.total_size += family_size;
            stats.latest_size += latest_size;
            stats.old_size += family_size - latest_size;
            stats.deletable_size += deletable_size;

            category.count += family.len();
            category.size += family_size;
        }
    }
    stats.locked_files = stats.locked_latest + stats.locked_old;
    log::debug!("VersionLedger: Statistics for {project_root:?}: {stats:?}");
    stats
}

pub trait VersionLedgerOperations {
    fn group_families(&self, dir: &Path, pattern: &str) -> Result<Families>;
    fn next_version(&self, dir: &Path, base: &str) -> Result<u32>;
    fn is_locked(&self, path: &Path) -> bool;
    fn lock(&self, path: &Path) -> Result<bool>;
    fn unlock(&self, path: &Path) -> Result<bool>;
    fn lock_all_latest(&self, project_root: &Path) -> LockReport;
    fn unlock_all(&self, project_root: &Path) -> UnlockReport;
    fn delete_all_old_versions(
        &self,
        project_root: &Path,
        cancel_flag: &AtomicBool,
    ) -> DeletionOutcome;
    fn aggregate_statistics(&self, project_root: &Path) -> VersionStatistics;
}

pub struct CoreVersionLedger {}

impl CoreVersionLedger {
    pub fn new() -> Self {
        CoreVersionLedger {}
    }
}

impl Default for CoreVersionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionLedgerOperations for CoreVersionLedger {
    fn group_families(&self, dir: &Path, pattern: &str) -> Result<Families> {
        group_families(dir, pattern)
    }

    fn next_version(&self, dir: &Path, base: &str) -> Result<u32> {
        next_version(dir, base)
    }

    fn is_locked(&self, path: &Path) -> bool {
        is_locked(path)
    }

    fn lock(&self, path: &Path) -> Result<bool> {
        lock(path)
    }

    fn unlock(&self, path: &Path) -> Result<bool> {
        unlock(path)
    }

    fn lock_all_latest(&self, project_root: &Path) -> LockReport {
        lock_all_latest(project_root)
    }

    fn unlock_all(&self, project_root: &Path) -> UnlockReport {
        unlock_all(project_root)
    }

    fn delete_all_old_versions(
        &self,
        project_root: &Path,
        cancel_flag: &AtomicBool,
    ) -> DeletionOutcome {
        delete_all_old_versions(project_root, cancel_flag)
    }

    fn aggregate_statistics(&self, project_root: &Path) -> VersionStatistics {
        aggregate_statistics(project_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn entry(path: &Path, prefix: char, number: u32) -> VersionedEntry {
        VersionedEntry {
            path: path.to_path_buf(),
            token: VersionToken::new(prefix, number),
            is_dir: false,
        }
    }

    #[test]
    fn test_group_families_and_latest() {
        // Arrange
        let dir = tempdir().unwrap();
        for name in ["a_v1.png", "a_v3.png", "a_v2.png", "b_v1.png", "plain.png", "notes_v1.txt"] {
            touch(&dir.path().join(name), "x");
        }

        // Act
        let families = group_families(dir.path(), "*.png").unwrap();

        // Assert
        assert_eq!(families.len(), 2);
        assert_eq!(families["a"].len(), 3);
        assert_eq!(families["b"].len(), 1);
        let latest = latest_of(&families["a"]).unwrap();
        assert_eq!(latest.path, dir.path().join("a_v3.png"));
    }

    #[test]
    fn test_group_families_ignores_prefix_case_and_hidden_entries() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("shot_T1.PNG"), "x");
        touch(&dir.path().join("shot_t2.png"), "x");
        touch(&dir.path().join(".shot_T1.PNG.lock"), "");
        fs::create_dir(dir.path().join("cell_T4")).unwrap();

        let families = group_families(dir.path(), "*.png").unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families["shot"].len(), 2);

        let with_dirs = group_families(dir.path(), "*").unwrap();
        assert!(with_dirs["cell"][0].is_dir);
    }

    #[test]
    fn test_unversioned_entries_join_their_stem_family_as_v0() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("intro.mov"), "plain");
        touch(&dir.path().join("intro_v1.mov"), "v1");
        touch(&dir.path().join("outro.mov"), "plain");
        let filter = FamilyFilter::new(&["*.mov"], EntryKind::Files).unwrap();

        let families = group_families_with_unversioned(dir.path(), &filter).unwrap();

        assert_eq!(families.len(), 2);
        assert_eq!(families["intro"].len(), 2);
        assert_eq!(
            latest_of(&families["intro"]).unwrap().path,
            dir.path().join("intro_v1.mov")
        );
        assert_eq!(families["outro"][0].token.number, 0);
        assert!(group_families_filtered(dir.path(), &filter).unwrap()["intro"].len() == 1);
    }

    #[test]
    fn test_deletion_plan_never_marks_latest_old() {
        let dir = tempdir().unwrap();
        for size in 1..=4usize {
            let family: Vec<VersionedEntry> = (1..=size as u32)
                .map(|n| entry(&dir.path().join(format!("a_v{n}.png")), 'v', n))
                .collect();
            let latest = family.last().unwrap().path.clone();
            let all_locked: HashSet<PathBuf> = family.iter().map(|e| e.path.clone()).collect();

            for locked in [HashSet::new(), all_locked] {
                let plan = deletion_plan(&family, &locked);
                assert_eq!(plan.keep, vec![latest.clone()]);
                assert!(!plan.locked_old.contains(&latest));
                assert!(!plan.deletable_old.contains(&latest));
                assert_eq!(plan.locked_old.len() + plan.deletable_old.len(), size - 1);
            }
        }
    }

    #[test]
    fn test_deletion_plan_splits_locked_and_keeps_ties() {
        let dir = tempdir().unwrap();
        let family = vec![
            entry(&dir.path().join("a_v1.png"), 'v', 1),
            entry(&dir.path().join("a_v2.png"), 'v', 2),
            entry(&dir.path().join("a_V3.png"), 'V', 3),
            entry(&dir.path().join("a_T3.png"), 'T', 3),
        ];
        let locked: HashSet<PathBuf> = [dir.path().join("a_v1.png")].into_iter().collect();

        let plan = deletion_plan(&family, &locked);

        assert_eq!(plan.keep.len(), 2);
        assert_eq!(plan.locked_old, vec![dir.path().join("a_v1.png")]);
        assert_eq!(plan.deletable_old, vec![dir.path().join("a_v2.png")]);
    }

    #[test]
    fn test_lock_and_unlock_are_idempotent() {
        let dir = tempdir().unwrap();
        let asset = dir.path().join("a_v1.aep");
        touch(&asset, "x");

        assert!(lock(&asset).unwrap());
        assert!(!lock(&asset).unwrap());
        assert!(dir.path().join(".a_v1.aep.lock").exists());
        assert!(is_locked(&asset));

        assert!(unlock(&asset).unwrap());
        assert!(!unlock(&asset).unwrap());
        assert!(!is_locked(&asset));
    }

    #[test]
    fn test_apply_deletion_counts_failures_and_honours_cancel() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a_v1.png");
        let folder = dir.path().join("cell_v1");
        touch(&file, "x");
        touch(&folder.join("0001.png"), "x");
        let missing = dir.path().join("gone_v1.png");

        let outcome = apply_deletion(
            &[file.clone(), missing, folder.clone()],
            &AtomicBool::new(false),
        );
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.failed, 1);
        assert!(!outcome.cancelled);
        assert!(!file.exists() && !folder.exists());

        let keep = dir.path().join("b_v1.png");
        touch(&keep, "x");
        let outcome = apply_deletion(&[keep.clone()], &AtomicBool::new(true));
        assert!(outcome.cancelled);
        assert_eq!(outcome.deleted, 0);
        assert!(keep.exists());
    }

    #[test]
    fn test_next_version() {
        let dir = tempdir().unwrap();
        assert_eq!(next_version(dir.path(), "Demo_EP01_010").unwrap(), 1);
        touch(&dir.path().join("Demo_EP01_010_T1.png"), "x");
        touch(&dir.path().join("Demo_EP01_010_T4.psd"), "x");
        touch(&dir.path().join("Other_T9.png"), "x");
        assert_eq!(next_version(dir.path(), "Demo_EP01_010").unwrap(), 5);
        assert_eq!(next_version(&dir.path().join("missing"), "x").unwrap(), 1);
    }

    fn build_project(root: &Path) {
        let cut = root.join("ep01/01_vfx/010");
        touch(&cut.join("Demo_EP01_010_v1.aep"), "aep1");
        touch(&cut.join("Demo_EP01_010_v2.aep"), "aep22");
        touch(&cut.join("bg/Demo_EP01_010_T1.png"), "b");
        touch(&cut.join("bg/Demo_EP01_010_T2.png"), "bb");
        touch(&cut.join("cell/Demo_EP01_010_T1/0001.png"), "c");
        touch(&cut.join("cell/Demo_EP01_010_T2/0001.png"), "cc");
        touch(&root.join("ep01/01_vfx/timesheets/010_v1.aep"), "ignored");
        touch(&root.join("06_render/ep01/010/prores/Demo_EP01_010_v1.mov"), "m");
        touch(&root.join("06_render/ep01/010/prores/Demo_EP01_010_v2.mov"), "mm");
        touch(&root.join("01_vfx/020/Demo_020.aep"), "unversioned");
    }

    #[test]
    fn test_asset_locations_cover_every_category() {
        let dir = tempdir().unwrap();
        build_project(dir.path());

        let locations = asset_locations(dir.path());
        let categories: HashSet<AssetCategory> = locations.iter().map(|l| l.category).collect();

        assert_eq!(categories.len(), 4);
        assert!(locations.iter().all(|l| !l.dir.ends_with(TIMESHEETS_DIR)));
        assert!(
            locations
                .iter()
                .any(|l| l.dir == dir.path().join("01_vfx/020") && l.category == AssetCategory::Aep)
        );
    }

    #[test]
    fn test_delete_all_old_versions_honours_cancellation() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        build_project(root);

        let outcome = delete_all_old_versions(root, &AtomicBool::new(true));

        assert!(outcome.cancelled);
        assert_eq!(outcome.deleted, 0);
        assert!(root.join("ep01/01_vfx/010/Demo_EP01_010_v1.aep").exists());
        assert!(root.join("ep01/01_vfx/010/bg/Demo_EP01_010_T1.png").exists());
        assert!(root.join("06_render/ep01/010/prores/Demo_EP01_010_v1.mov").exists());
    }

    #[test]
    fn test_project_wide_lock_delete_and_statistics() {
        // Arrange
        let dir = tempdir().unwrap();
        let root = dir.path();
        build_project(root);
        let old_aep = root.join("ep01/01_vfx/010/Demo_EP01_010_v1.aep");
        lock(&old_aep).unwrap();

        // Act: statistics before any deletion
        let stats = aggregate_statistics(root);

        // Assert
        assert_eq!(stats.total_files, 9);
        assert_eq!(stats.versioned_files, 8);
        assert_eq!(stats.latest_versions, 4);
        assert_eq!(stats.old_versions, 4);
        assert_eq!(stats.locked_old, 1);
        assert_eq!(stats.deletable_old, 3);
        assert_eq!(stats.locked_files, 1);
        assert_eq!(stats.per_category[&AssetCategory::Aep].count, 3);
        assert_eq!(stats.per_category[&AssetCategory::Cell].size, 3);

        // Act: lock everything latest, then purge
        let lock_report = lock_all_latest(root);
        assert_eq!(lock_report.newly_locked, 4);
        assert_eq!(lock_all_latest(root).already_locked, 4);

        let outcome = delete_all_old_versions(root, &AtomicBool::new(false));
        assert_eq!(outcome.deleted, 3);
        assert_eq!(outcome.failed, 0);
        assert!(old_aep.exists());
        assert!(!root.join("ep01/01_vfx/010/bg/Demo_EP01_010_T1.png").exists());
        assert!(root.join("06_render/ep01/010/prores/Demo_EP01_010_v2.mov").exists());

        // Act: unlock everything
        let unlock_report = unlock_all(root);
        assert_eq!(unlock_report.removed, 5);
        assert_eq!(aggregate_statistics(root).locked_files, 0);
    }
}
