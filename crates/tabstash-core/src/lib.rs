//! TabStash Core
//!
//! Central coordination layer: one store, one change notifier, and the tab,
//! group, trash and backup repositories built on them.

mod config;
mod error;
pub mod maintenance;
mod stash;

pub use config::Config;
pub use error::CoreError;
pub use stash::Stash;

// Re-export core components
pub use tabstash_backup::{
    BackupError, BackupManager, BackupRecord, BackupSummary, BackupTab, RestoreMode,
    RestoreOutcome,
};
pub use tabstash_groups::{CustomGroupMeta, GroupError, GroupManager, ItemSort};
pub use tabstash_storage::{
    ChangeEvent, ChangeNotifier, Database, StorageError, StoreManager, SCHEMA_VERSION,
};
pub use tabstash_tabs::{
    normalize_url, GroupType, MergeDetail, NormalizationAction, NormalizationReport,
    NormalizationRule, SavedTab, TabError, TabManager, TabPatch,
};
pub use tabstash_trash::{TrashError, TrashManager, TrashedTab};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
