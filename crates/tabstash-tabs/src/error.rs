//! Tab error types

use tabstash_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabError {
    #[error("Tab not found: {0}")]
    NotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Another tab already uses canonical URL {0}")]
    DuplicateCanonicalUrl(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for TabError {
    fn from(e: rusqlite::Error) -> Self {
        TabError::Storage(StorageError::from(e))
    }
}
