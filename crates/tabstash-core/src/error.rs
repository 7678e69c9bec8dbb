//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] tabstash_storage::StorageError),

    #[error("Tab error: {0}")]
    Tab(#[from] tabstash_tabs::TabError),

    #[error("Group error: {0}")]
    Group(#[from] tabstash_groups::GroupError),

    #[error("Trash error: {0}")]
    Trash(#[from] tabstash_trash::TrashError),

    #[error("Backup error: {0}")]
    Backup(#[from] tabstash_backup::BackupError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Maintenance pass exceeded {0} seconds")]
    MaintenanceTimeout(u64),
}
