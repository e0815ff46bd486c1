/*
 * Command-line surface. Parsing only: every command is carried out by
 * `handler::ProjectManagerLogic`, which keeps the parsed values free of any
 * filesystem or project state.
 */
use crate::core::MaterialKind;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "anim_project_manager",
    about = "Manage animation project folders, cuts and asset versions",
    version
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project root to operate on (defaults to the last opened project)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// JSON object file overriding version labels, e.g. {"T": "timing {}"}
    #[arg(long, global = true)]
    pub labels: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a new project folder with the standard layout
    New {
        name: String,
        #[arg(long, default_value = "")]
        display_name: String,
        /// Parent folder (defaults to the configured default project path)
        #[arg(long)]
        base: Option<PathBuf>,
        /// Cuts live directly under 01_vfx; only special episodes allowed
        #[arg(long)]
        no_episode: bool,
    },
    /// Open a project and remember it as the current one
    Open { path: PathBuf },
    /// Create an episode: `ep 1` -> ep01, `op`, `pv teaser` -> pv_teaser
    Episode {
        type_tag: String,
        identifier: Option<String>,
    },
    /// Create numbered episodes ep<from>..=ep<to>
    Episodes { from: u32, to: u32 },
    /// Create a cut
    Cut {
        cut: String,
        #[arg(long)]
        episode: Option<String>,
    },
    /// Create cuts <from>..=<to>
    Cuts {
        from: u32,
        to: u32,
        #[arg(long)]
        episode: Option<String>,
    },
    /// List episodes, or the cuts of one scope
    List {
        #[arg(long)]
        episode: Option<String>,
    },
    /// Group cuts that share one asset folder
    Reuse {
        #[arg(required = true, num_args = 2..)]
        cuts: Vec<String>,
        #[arg(long)]
        episode: Option<String>,
    },
    /// Import bg / cell / 3dcg / timesheet material into a cut
    Import {
        kind: MaterialKind,
        source: PathBuf,
        cut: String,
        #[arg(long)]
        episode: Option<String>,
    },
    /// Import several files or folders of one kind into a cut
    ImportMany {
        kind: MaterialKind,
        cut: String,
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        #[arg(long)]
        episode: Option<String>,
    },
    /// Copy the AEP templates into one cut
    Templates {
        cut: String,
        #[arg(long)]
        episode: Option<String>,
    },
    /// Copy the AEP templates into many cuts
    BatchTemplates {
        /// Restrict to one episode
        #[arg(long)]
        episode: Option<String>,
        /// First cut number (requires --episode and --to)
        #[arg(long, requires_all = ["episode", "to"])]
        from: Option<u32>,
        /// Last cut number (requires --episode and --from)
        #[arg(long, requires_all = ["episode", "from"])]
        to: Option<u32>,
        /// Also copy into cuts that already have AEP files
        #[arg(long)]
        include_existing: bool,
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        skip_reuse: bool,
    },
    /// Copy the newest ProRes renders into 09_edit/footage
    CollectRenders,
    /// Show version families of a folder
    Families {
        dir: PathBuf,
        #[arg(long, default_value = "*")]
        pattern: String,
    },
    /// Protect an asset version from bulk deletion
    Lock { path: PathBuf },
    Unlock { path: PathBuf },
    /// Lock the newest version of every asset family in the project
    LockAll,
    /// Remove every lock marker in the project
    UnlockAll,
    /// Delete every unlocked, non-latest asset version in the project
    PurgeOld,
    /// Version statistics for the project
    Stats,
    /// Projects known to the registry, most recently used first
    Projects,
    /// Drop a project from the registry (files are untouched)
    Forget { name: String },
    /// Set the folder new projects are created in
    SetDefault { path: PathBuf },
}
