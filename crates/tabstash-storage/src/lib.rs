//! TabStash Storage Layer
//!
//! A single versioned SQLite store holding saved tabs, custom groups, the trash
//! bin and backup snapshots. Opening a store written by an older schema version
//! upgrades it in place inside one transaction.

mod database;
mod error;
mod events;
pub mod json;
mod manager;
mod migrations;
pub mod time;

pub use database::Database;
pub use error::StorageError;
pub use events::{ChangeEvent, ChangeNotifier};
pub use manager::StoreManager;
pub use migrations::SCHEMA_VERSION;

pub type Result<T> = std::result::Result<T, StorageError>;
