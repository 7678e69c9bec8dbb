//! TabStash Backups
//!
//! Point-in-time snapshots of every tab and group, with generation pruning,
//! merge or overwrite restore, and a portable JSON export.

pub mod encoding;
mod error;
mod manager;
mod record;
mod sql;

pub use error::BackupError;
pub use manager::BackupManager;
pub use record::{BackupRecord, BackupSummary, BackupTab, RestoreMode, RestoreOutcome};

pub type Result<T> = std::result::Result<T, BackupError>;
