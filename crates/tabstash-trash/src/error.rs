//! Trash error types

use tabstash_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrashError {
    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("Trashed tab not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for TrashError {
    fn from(e: rusqlite::Error) -> Self {
        TrashError::Storage(StorageError::from(e))
    }
}
