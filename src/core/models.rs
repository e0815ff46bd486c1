use crate::core::cut_id::CutId;
use crate::core::reuse_group::{self, ReuseGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// Fixed relative names of the well-known project folders, persisted under `paths`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPaths {
    pub reference: String,
    pub render: String,
    pub assets: String,
    pub aep_templates: String,
    pub tools: String,
    pub edit: String,
    pub vfx: String,
    pub cg: String,
    pub tmp: String,
    pub other: String,
}

impl Default for ProjectPaths {
    fn default() -> Self {
        ProjectPaths {
            reference: "00_reference_project".to_string(),
            render: "06_render".to_string(),
            assets: "07_master_assets".to_string(),
            aep_templates: "07_master_assets/aep_templates".to_string(),
            tools: "08_tools".to_string(),
            edit: "09_edit".to_string(),
            vfx: "01_vfx".to_string(),
            cg: "02_3dcg".to_string(),
            tmp: "98_tmp".to_string(),
            other: "99_other".to_string(),
        }
    }
}

// The whole persisted project state. Field names are the on-disk JSON keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_name: String,
    #[serde(default)]
    pub project_display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(default)]
    pub no_episode: bool,
    #[serde(default)]
    pub episodes: BTreeMap<String, Vec<CutId>>,
    // Root-level cuts, only used in no-episode mode.
    #[serde(default)]
    pub cuts: Vec<CutId>,
    #[serde(default)]
    pub reuse_cuts: Vec<ReuseGroup>,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub last_modified: String,
    #[serde(default)]
    pub paths: ProjectPaths,
}

impl ProjectConfig {
    /// Creates an empty configuration stamped with the current time.
    pub fn new(
        project_name: &str,
        display_name: &str,
        project_path: Option<String>,
        no_episode: bool,
    ) -> Self {
        let now = timestamp_now();
        let display_name = if display_name.trim().is_empty() {
            project_name
        } else {
            display_name
        };
        ProjectConfig {
            project_name: project_name.to_string(),
            project_display_name: display_name.to_string(),
            project_path,
            no_episode,
            episodes: BTreeMap::new(),
            cuts: Vec::new(),
            reuse_cuts: Vec::new(),
            created_time: now.clone(),
            last_modified: now,
            paths: ProjectPaths::default(),
        }
    }

    pub fn has_episode(&self, episode_id: &str) -> bool {
        self.episodes.contains_key(episode_id)
    }

    pub fn episode_ids(&self) -> Vec<String> {
        self.episodes.keys().cloned().collect()
    }

    /// Cuts tracked in a scope: an episode, or the project root when `None`.
    pub fn cuts_in(&self, episode_id: Option<&str>) -> Option<&Vec<CutId>> {
        match episode_id {
            Some(ep) => self.episodes.get(ep),
            None => Some(&self.cuts),
        }
    }

    pub fn cuts_in_mut(&mut self, episode_id: Option<&str>) -> Option<&mut Vec<CutId>> {
        match episode_id {
            Some(ep) => self.episodes.get_mut(ep),
            None => Some(&mut self.cuts),
        }
    }

    pub fn reuse_group_for(&self, cut: &CutId, episode_id: Option<&str>) -> Option<&ReuseGroup> {
        reuse_group::resolve(&self.reuse_cuts, cut, episode_id)
    }

    pub fn main_cut_for(&self, cut: &CutId, episode_id: Option<&str>) -> CutId {
        reuse_group::main_cut_for(&self.reuse_cuts, cut, episode_id)
    }

    pub fn touch(&mut self) {
        self.last_modified = timestamp_now();
    }
}

// RFC 3339 in local time when the offset can be determined, UTC otherwise.
pub fn timestamp_now() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339).unwrap_or_default()
}
