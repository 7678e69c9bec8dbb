//! TabStash Tab Repository
//!
//! Saved tabs are stored once per canonical URL. Writes that hit an existing
//! canonical URL merge into the stored record, keeping its identity and
//! classification.

mod error;
mod manager;
pub mod normalize;
pub mod sql;
mod tab;

pub use error::TabError;
pub use manager::{MergeDetail, NormalizationReport, TabManager};
pub use normalize::{normalize_url, NormalizationAction, NormalizationRule};
pub use tab::{extract_domain, GroupType, SavedTab, TabPatch};

pub type Result<T> = std::result::Result<T, TabError>;
