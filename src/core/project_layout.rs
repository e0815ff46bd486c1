/*
 * Domain object representing an animation project root. It owns the on-disk
 * topology (scaffold folder lists, where a cut's working, render and 3DCG folders
 * live, where templates and timesheets go) so the rest of the core asks for
 * semantic locations instead of joining path fragments by hand.
 */
use crate::core::cut_id::CutId;
use std::path::{Path, PathBuf};

pub const PROJECT_CONFIG_FILENAME: &str = "project_config.json";
pub const README_FILENAME: &str = "README.md";
pub const LOCK_MARKER_SUFFIX: &str = ".lock";

pub const VFX_DIR: &str = "01_vfx";
pub const CG_DIR: &str = "02_3dcg";
pub const RENDER_DIR: &str = "06_render";
pub const TEMPLATES_DIR: &str = "07_master_assets/aep_templates";
pub const FOOTAGE_DIR: &str = "09_edit/footage";
pub const TIMESHEETS_DIR: &str = "timesheets";

pub const PROJECT_SCAFFOLD: &[&str] = &[
    "00_reference_project/character_design",
    "00_reference_project/art_design",
    "00_reference_project/concept_art",
    "00_reference_project/storyboard",
    "00_reference_project/docs",
    "00_reference_project/other_design",
    "01_vfx",
    "02_3dcg",
    "05_stills",
    "06_render",
    "07_master_assets/fonts",
    "07_master_assets/logo",
    "07_master_assets/fx_presets",
    "07_master_assets/aep_templates",
    "08_tools/ae_scripts",
    "08_tools/python",
    "08_tools/config",
    "09_edit/projects",
    "09_edit/output",
    "09_edit/footage",
    "98_tmp",
    "99_other",
];

pub const EPISODE_SCAFFOLD: &[&str] = &[
    "00_reference/storyboard",
    "00_reference/script",
    "00_reference/director_notes",
    "01_vfx/timesheets",
    "03_preview",
    "04_log",
    "05_stills",
    "06_output_mixdown",
];

pub const CUT_SUBDIRS: &[&str] = &["cell", "bg", "prerender"];
pub const RENDER_SUBDIRS: &[&str] = &["png_seq", "prores", "mp4"];

pub const BG_SUBDIR: &str = "bg";
pub const CELL_SUBDIR: &str = "cell";

/*
 * Handle on a project root. Scope arguments are `Option<&str>` episode ids:
 * `None` addresses the root-level cuts of a no-episode project.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: PathBuf) -> Self {
        ProjectLayout { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.to_string_lossy().into_owned())
    }

    pub fn readme_file(&self) -> PathBuf {
        self.root.join(README_FILENAME)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    pub fn footage_dir(&self) -> PathBuf {
        self.root.join(FOOTAGE_DIR)
    }

    pub fn render_root(&self) -> PathBuf {
        self.root.join(RENDER_DIR)
    }

    pub fn episode_dir(&self, episode_id: &str) -> PathBuf {
        self.root.join(episode_id)
    }

    pub fn episode_render_dir(&self, episode_id: &str) -> PathBuf {
        self.render_root().join(episode_id)
    }

    fn scope_dir(&self, episode_id: Option<&str>) -> PathBuf {
        match episode_id {
            Some(ep) => self.episode_dir(ep),
            None => self.root.clone(),
        }
    }

    pub fn vfx_dir(&self, episode_id: Option<&str>) -> PathBuf {
        self.scope_dir(episode_id).join(VFX_DIR)
    }

    pub fn cg_dir(&self, episode_id: Option<&str>) -> PathBuf {
        self.scope_dir(episode_id).join(CG_DIR)
    }

    pub fn timesheets_dir(&self, episode_id: Option<&str>) -> PathBuf {
        self.vfx_dir(episode_id).join(TIMESHEETS_DIR)
    }

    pub fn cut_dir(&self, episode_id: Option<&str>, cut: &CutId) -> PathBuf {
        self.vfx_dir(episode_id).join(cut.to_string())
    }

    pub fn cut_render_dir(&self, episode_id: Option<&str>, cut: &CutId) -> PathBuf {
        let base = match episode_id {
            Some(ep) => self.episode_render_dir(ep),
            None => self.render_root(),
        };
        base.join(cut.to_string())
    }

    pub fn cut_cg_dir(&self, episode_id: Option<&str>, cut: &CutId) -> PathBuf {
        self.cg_dir(episode_id).join(cut.to_string())
    }

    /*
     * Filename prefix shared by a cut's generated assets:
     * `<project>_[<EPISODE>_]<cut or reuse members>`.
     */
    pub fn asset_base_name(project_name: &str, episode_id: Option<&str>, cut_part: &str) -> String {
        match episode_id {
            Some(ep) => format!("{project_name}_{}_{cut_part}", ep.to_uppercase()),
            None => format!("{project_name}_{cut_part}"),
        }
    }
}

/* `.<name>.lock` next to the asset. */
pub fn lock_marker_path(asset: &Path) -> Option<PathBuf> {
    let name = asset.file_name()?.to_string_lossy();
    let parent = asset.parent().unwrap_or_else(|| Path::new(""));
    Some(parent.join(format!(".{name}{LOCK_MARKER_SUFFIX}")))
}

pub fn is_lock_marker(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(LOCK_MARKER_SUFFIX))
}
