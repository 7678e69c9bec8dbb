//! Trashed tab record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tabstash_storage::time;
use tabstash_tabs::{GroupType, SavedTab};

/// A soft-deleted tab together with the classification it had when it was
/// trashed. Restoring uses the captured classification, not the live groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashedTab {
    #[serde(flatten)]
    pub tab: SavedTab,
    pub trashed_at: DateTime<Utc>,
    pub original_group: String,
    pub original_group_type: GroupType,
    pub original_custom_groups: Vec<String>,
}

impl TrashedTab {
    pub fn from_tab(tab: SavedTab) -> Self {
        Self {
            trashed_at: time::now(),
            original_group: tab.group.clone(),
            original_group_type: tab.group_type,
            original_custom_groups: tab.custom_groups.clone(),
            tab,
        }
    }

    pub fn id(&self) -> &str {
        &self.tab.id
    }

    /// The live tab this record restores to.
    pub fn into_restored(self) -> SavedTab {
        let mut tab = self.tab;
        tab.group = self.original_group;
        tab.group_type = self.original_group_type;
        tab.custom_groups = self.original_custom_groups;
        tab.prepare_for_save();
        tab
    }
}
