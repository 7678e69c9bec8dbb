//! TabStash Custom Groups
//!
//! User-named groups with a dense display order. Renaming or deleting a group
//! rewrites every tab that refers to it in the same transaction.

mod error;
mod group;
mod manager;
pub mod sql;

pub use error::GroupError;
pub use group::{CustomGroupMeta, ItemSort};
pub use manager::GroupManager;

pub type Result<T> = std::result::Result<T, GroupError>;
