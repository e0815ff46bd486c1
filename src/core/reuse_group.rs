/*
 * Reuse groups: several cuts that share one physical asset directory. The group
 * record lists its members in canonical order and names the main cut (the
 * smallest member by `CutId::compare_key`). Every path computation that touches
 * a cut's working directory must first go through `main_cut_for`.
 *
 * Forming a group is a one-time merge: non-main member directories are folded
 * into the main cut's directory (collisions are skipped, never overwritten), and
 * AEP files in the merged directory are renamed to embed every member id. The
 * merge is per-item best effort with no rollback.
 */
use crate::core::cut_id::{CutId, join_cut_ids};
use crate::core::file_system::{self, list_children};
use crate::core::version_token;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReuseGroupError {
    InsufficientGroupSize(usize),
    UnknownCut(String),
    AlreadyInGroup { cut: String, group: String },
}

impl std::fmt::Display for ReuseGroupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReuseGroupError::InsufficientGroupSize(n) => {
                write!(f, "A reuse group needs at least 2 distinct cuts, got {n}")
            }
            ReuseGroupError::UnknownCut(cut) => write!(f, "Cut {cut} does not exist"),
            ReuseGroupError::AlreadyInGroup { cut, group } => {
                write!(f, "Cut {cut} already belongs to reuse group {group}")
            }
        }
    }
}

impl std::error::Error for ReuseGroupError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReuseGroup {
    pub cuts: Vec<CutId>,
    pub main_cut: CutId,
    #[serde(default)]
    pub episode_id: Option<String>,
}

impl ReuseGroup {
    /*
     * Builds a group record from the requested cuts: duplicates are dropped,
     * members are sorted and the minimum becomes the main cut.
     */
    pub fn new(cuts: &[CutId], episode_id: Option<&str>) -> Result<Self, ReuseGroupError> {
        let mut members = cuts.to_vec();
        members.sort_by_key(CutId::compare_key);
        members.dedup();
        let main_cut = match members.first() {
            Some(first) if members.len() >= 2 => *first,
            _ => return Err(ReuseGroupError::InsufficientGroupSize(members.len())),
        };
        Ok(ReuseGroup {
            cuts: members,
            main_cut,
            episode_id: episode_id.map(str::to_string),
        })
    }

    pub fn contains(&self, cut: &CutId) -> bool {
        self.cuts.contains(cut)
    }

    pub fn in_scope(&self, episode_id: Option<&str>) -> bool {
        self.episode_id.as_deref() == episode_id
    }

    /* Members joined by underscores, e.g. "010_011". */
    pub fn display_name(&self) -> String {
        join_cut_ids(&self.cuts)
    }
}

/* The group (within the given episode scope) that contains `cut`, if any. */
pub fn resolve<'a>(
    groups: &'a [ReuseGroup],
    cut: &CutId,
    episode_id: Option<&str>,
) -> Option<&'a ReuseGroup> {
    groups
        .iter()
        .find(|group| group.in_scope(episode_id) && group.contains(cut))
}

/* The cut whose directory physically holds `cut`'s assets. */
pub fn main_cut_for(groups: &[ReuseGroup], cut: &CutId, episode_id: Option<&str>) -> CutId {
    resolve(groups, cut, episode_id)
        .map(|group| group.main_cut)
        .unwrap_or(*cut)
}

/*
 * Checks that a new group may be formed from `group.cuts`: every member must be
 * an existing cut of the scope and none may already belong to another group.
 */
pub fn validate_membership(
    existing_groups: &[ReuseGroup],
    scope_cuts: &[CutId],
    group: &ReuseGroup,
) -> Result<(), ReuseGroupError> {
    let scope = group.episode_id.as_deref();
    for cut in &group.cuts {
        if !scope_cuts.contains(cut) {
            return Err(ReuseGroupError::UnknownCut(cut.to_string()));
        }
        if let Some(conflict) = resolve(existing_groups, cut, scope) {
            return Err(ReuseGroupError::AlreadyInGroup {
                cut: cut.to_string(),
                group: conflict.display_name(),
            });
        }
    }
    Ok(())
}

/* Per-item tallies of a directory merge. */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub moved: usize,
    pub skipped_collisions: usize,
    pub failed: usize,
    pub renamed_aeps: usize,
    pub removed_member_dirs: usize,
}

fn move_or_count(src: &Path, dst: &Path, report: &mut MergeReport) {
    if dst.exists() {
        log::debug!("ReuseGroup: Skipping {src:?}, {dst:?} already exists");
        report.skipped_collisions += 1;
        return;
    }
    match file_system::move_entry(src, dst) {
        Ok(()) => report.moved += 1,
        Err(e) => {
            log::warn!("ReuseGroup: Failed to move {src:?} -> {dst:?}: {e}");
            report.failed += 1;
        }
    }
}

/*
 * Folds each member directory into `main_dir`. Top-level files move across
 * unless the name is taken. A subdirectory moves whole when the name is free;
 * when the main cut already has it, its immediate children move individually
 * with the same skip-on-collision rule. Member directories that end up empty
 * are removed; anything left behind by a collision stays where it was.
 */
pub fn merge_member_dirs(main_dir: &Path, member_dirs: &[&Path], report: &mut MergeReport) {
    if let Err(e) = file_system::ensure_dir(main_dir) {
        log::warn!("ReuseGroup: Cannot create main cut directory {main_dir:?}: {e}");
        report.failed += 1;
        return;
    }
    for member_dir in member_dirs {
        let items = match list_children(member_dir) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("ReuseGroup: Cannot list member directory {member_dir:?}: {e}");
                report.failed += 1;
                continue;
            }
        };
        for item in items {
            let Some(name) = item.file_name() else {
                continue;
            };
            let dst = main_dir.join(name);
            if item.is_dir() && dst.is_dir() {
                match list_children(&item) {
                    Ok(sub_items) => {
                        for sub_item in sub_items {
                            if let Some(sub_name) = sub_item.file_name() {
                                move_or_count(&sub_item, &dst.join(sub_name), report);
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("ReuseGroup: Cannot list {item:?}: {e}");
                        report.failed += 1;
                    }
                }
            } else {
                move_or_count(&item, &dst, report);
            }
        }
        if file_system::remove_empty_dirs(member_dir) {
            report.removed_member_dirs += 1;
        } else {
            log::info!("ReuseGroup: Member directory {member_dir:?} kept, it still has content");
        }
    }
}

/*
 * Renames AEP files in the merged directory to
 * `<project>_[<EPISODE>_]<members joined>_v<n>.aep`, keeping each file's own
 * version number (0 when it has none). Files whose stem already contains the
 * joined member string, or whose target name exists, are left alone.
 */
pub fn rename_merged_aeps(
    main_dir: &Path,
    project_name: &str,
    group: &ReuseGroup,
    report: &mut MergeReport,
) {
    let members = group.display_name();
    let episode_part = group
        .episode_id
        .as_deref()
        .map(|ep| format!("{}_", ep.to_uppercase()))
        .unwrap_or_default();

    let Ok(children) = list_children(main_dir) else {
        log::warn!("ReuseGroup: Cannot list merged directory {main_dir:?}");
        report.failed += 1;
        return;
    };
    for path in children {
        let is_aep = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("aep"));
        if !is_aep {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        if stem.contains(&members) {
            continue;
        }
        let version = version_token::extract(&stem).map_or(0, |token| token.number);
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "aep".to_string());
        let new_path = main_dir.join(format!(
            "{project_name}_{episode_part}{members}_v{version}.{extension}"
        ));
        if new_path.exists() {
            log::debug!("ReuseGroup: Not renaming {path:?}, {new_path:?} exists");
            continue;
        }
        match std::fs::rename(&path, &new_path) {
            Ok(()) => report.renamed_aeps += 1,
            Err(e) => {
                log::warn!("ReuseGroup: Failed to rename {path:?} -> {new_path:?}: {e}");
                report.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn cut(text: &str) -> CutId {
        CutId::parse(text).unwrap()
    }

    #[test]
    fn test_new_picks_smallest_as_main() {
        let group = ReuseGroup::new(&[cut("11"), cut("10A"), cut("10")], Some("ep01")).unwrap();
        assert_eq!(group.main_cut, cut("10"));
        assert_eq!(group.display_name(), "010_010A_011");
    }

    #[test]
    fn test_new_rejects_small_groups() {
        assert_eq!(
            ReuseGroup::new(&[cut("10")], None),
            Err(ReuseGroupError::InsufficientGroupSize(1))
        );
        assert_eq!(
            ReuseGroup::new(&[cut("10"), cut("010")], None),
            Err(ReuseGroupError::InsufficientGroupSize(1))
        );
    }

    #[test]
    fn test_resolve_is_scoped_and_uses_identity() {
        let groups = vec![ReuseGroup::new(&[cut("10"), cut("11")], Some("ep01")).unwrap()];
        assert!(resolve(&groups, &cut("011"), Some("ep01")).is_some());
        assert_eq!(
            resolve(&groups, &cut("11"), Some("ep01")),
            resolve(&groups, &cut("10"), Some("ep01"))
        );
        assert!(resolve(&groups, &cut("11"), Some("ep02")).is_none());
        assert!(resolve(&groups, &cut("11A"), Some("ep01")).is_none());
        assert_eq!(main_cut_for(&groups, &cut("11"), Some("ep01")), cut("10"));
        assert_eq!(main_cut_for(&groups, &cut("12"), Some("ep01")), cut("12"));
    }

    #[test]
    fn test_validate_membership() {
        let existing = vec![ReuseGroup::new(&[cut("1"), cut("2")], None).unwrap()];
        let scope = vec![cut("1"), cut("2"), cut("3"), cut("4")];

        let ok = ReuseGroup::new(&[cut("3"), cut("4")], None).unwrap();
        assert!(validate_membership(&existing, &scope, &ok).is_ok());

        let conflict = ReuseGroup::new(&[cut("2"), cut("3")], None).unwrap();
        assert_eq!(
            validate_membership(&existing, &scope, &conflict),
            Err(ReuseGroupError::AlreadyInGroup {
                cut: "002".to_string(),
                group: "001_002".to_string()
            })
        );

        let unknown = ReuseGroup::new(&[cut("3"), cut("9")], None).unwrap();
        assert_eq!(
            validate_membership(&existing, &scope, &unknown),
            Err(ReuseGroupError::UnknownCut("009".to_string()))
        );
    }

    #[test]
    fn test_merge_skips_collisions_and_keeps_leftovers() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("010");
        let member = dir.path().join("011");
        fs::create_dir_all(main.join("bg")).unwrap();
        fs::create_dir_all(member.join("bg")).unwrap();
        fs::create_dir_all(member.join("prerender")).unwrap();
        fs::write(main.join("shared.txt"), "main").unwrap();
        fs::write(member.join("shared.txt"), "member").unwrap();
        fs::write(member.join("only_member.txt"), "m").unwrap();
        fs::write(member.join("bg/bg_T1.png"), "b").unwrap();

        let mut report = MergeReport::default();
        merge_member_dirs(&main, &[member.as_path()], &mut report);

        assert_eq!(fs::read_to_string(main.join("shared.txt")).unwrap(), "main");
        assert_eq!(fs::read_to_string(member.join("shared.txt")).unwrap(), "member");
        assert!(main.join("only_member.txt").exists());
        assert!(main.join("bg/bg_T1.png").exists());
        assert!(main.join("prerender").is_dir());
        assert!(!member.join("only_member.txt").exists());
        assert_eq!(report.skipped_collisions, 1);
        assert_eq!(report.moved, 3);
        assert_eq!(report.removed_member_dirs, 0);
    }

    #[test]
    fn test_rename_merged_aeps_embeds_members() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("010");
        fs::create_dir_all(&main).unwrap();
        fs::write(main.join("Demo_EP01_010_v3.aep"), "").unwrap();
        fs::write(main.join("Demo_EP01_011.aep"), "").unwrap();
        fs::write(main.join("Demo_EP01_010_011_v1.aep"), "").unwrap();

        let group = ReuseGroup::new(&[cut("10"), cut("11")], Some("ep01")).unwrap();
        let mut report = MergeReport::default();
        rename_merged_aeps(&main, "Demo", &group, &mut report);

        assert!(main.join("Demo_EP01_010_011_v3.aep").exists());
        assert!(main.join("Demo_EP01_010_011_v0.aep").exists());
        assert!(main.join("Demo_EP01_010_011_v1.aep").exists());
        assert_eq!(report.renamed_aeps, 2);
    }
}
