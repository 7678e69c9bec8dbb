//! Group error types

use tabstash_storage::StorageError;
use tabstash_tabs::TabError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroupError {
    #[error("Group not found: {0}")]
    NotFound(String),

    #[error("Group already exists: {0}")]
    AlreadyExists(String),

    #[error("Group name cannot be empty")]
    EmptyName,

    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("Tab error: {0}")]
    Tab(#[from] TabError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for GroupError {
    fn from(e: rusqlite::Error) -> Self {
        GroupError::Storage(StorageError::from(e))
    }
}
