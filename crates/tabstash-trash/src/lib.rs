//! TabStash Trash
//!
//! Removing a tab from the active view is separate from destroying it: trashed
//! tabs keep their original classification until restored or purged.

mod error;
mod manager;
mod sql;
mod trashed;

pub use error::TrashError;
pub use manager::TrashManager;
pub use trashed::TrashedTab;

pub type Result<T> = std::result::Result<T, TrashError>;
