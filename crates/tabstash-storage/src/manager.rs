//! Store handle lifecycle

use parking_lot::Mutex;
use std::path::PathBuf;

use crate::database::Database;
use crate::Result;

/// Owns the lazily opened store handle.
///
/// `open` hands out clones of one cached [`Database`]; the first call opens and
/// upgrades the store. The lock is held across the open so concurrent callers
/// never race two upgrades against the same file.
pub struct StoreManager {
    path: Option<PathBuf>,
    handle: Mutex<Option<Database>>,
}

impl StoreManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            handle: Mutex::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            handle: Mutex::new(None),
        }
    }

    pub fn open(&self) -> Result<Database> {
        let mut handle = self.handle.lock();
        if let Some(db) = handle.as_ref() {
            return Ok(db.clone());
        }

        let db = match &self.path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Database::open(path)?
            }
            None => Database::open_in_memory()?,
        };

        tracing::info!(path = ?self.path, "Opened store");

        *handle = Some(db.clone());
        Ok(db)
    }

    /// Drop the cached handle so the next `open` starts from scratch.
    ///
    /// Must not be called while operations on the old handle are in flight.
    pub fn reset(&self) {
        if self.handle.lock().take().is_some() {
            tracing::debug!(path = ?self.path, "Store handle reset");
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }
}
