/*
 * The platform-agnostic core: cut and episode identifiers, version tokens and
 * their labels, reuse groups, the on-disk project layout, the persisted project
 * configuration, the version ledger and the project tree that ties them together.
 * Stateful collaborators are exposed through `...Operations` traits
 * (`ProjectConfigStoreOperations`, `ProjectRegistryOperations`,
 * `SettingsManagerOperations`, `VersionLedgerOperations`) with `Core...`
 * implementations, so callers and tests can substitute their own.
 */
pub mod cut_id;
pub mod episode;
pub mod file_system;
pub mod models;
pub mod path_utils;
pub mod project_config;
pub mod project_layout;
pub mod project_tree;
pub mod registry;
pub mod reuse_group;
pub mod settings;
pub mod version_ledger;
pub mod version_token;

// Naming and labels
pub use version_token::{FileKind, LabelsError, VersionLabels};

// Project operations
pub use project_tree::{
    BatchAepScope, BatchAepSettings, ImportRequest, MaterialKind, ProjectError, ProjectServices,
    ProjectTree,
};
pub use version_ledger::{
    CoreVersionLedger, LedgerError, VersionLedgerOperations, VersionStatistics,
};

// Per-user collaborators
pub use registry::{CoreProjectRegistry, ProjectRegistryOperations, RegistryError};
pub use settings::{AppSettings, CoreSettingsManager, SettingsError, SettingsManagerOperations};
