//! Database connection and operations

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

use crate::error::StorageError;
use crate::migrations::{migrate_to, run_migrations, schema_version, SCHEMA_VERSION};
use crate::Result;

/// Shared handle to the store. Clones share one connection.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut conn = Connection::open(path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;

        // WAL mode for better concurrent performance
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        run_migrations(&mut conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_at_version(SCHEMA_VERSION)
    }

    /// Open an in-memory store migrated only up to `version`.
    ///
    /// Used to exercise upgrade paths and code that must cope with stores that
    /// have not reached the current schema yet.
    pub fn open_in_memory_at_version(version: i32) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrate_to(&mut conn, version.min(SCHEMA_VERSION))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.conn.lock();
        schema_version(&conn)
    }

    /// Upgrade an open store to the current schema.
    pub fn migrate(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        run_migrations(&mut conn)
    }

    pub fn with_connection<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside one transaction. Any error rolls every write back.
    pub fn transaction<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(StorageError::from)?;
        let result = f(&tx)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(result)
    }

    /// Async form of [`Database::with_connection`], run on the blocking pool.
    pub async fn run<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StorageError> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_connection(f))
            .await
            .map_err(|e| E::from(StorageError::TaskJoin(e.to_string())))?
    }

    /// Async form of [`Database::transaction`], run on the blocking pool.
    pub async fn run_transaction<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StorageError> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.transaction(f))
            .await
            .map_err(|e| E::from(StorageError::TaskJoin(e.to_string())))?
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}
