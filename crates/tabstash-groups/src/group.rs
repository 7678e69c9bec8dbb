//! Custom group metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tabstash_storage::time;

/// How tabs inside one group are ordered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemSort {
    Newest,
    Oldest,
    Title,
    Domain,
    /// Follow the group's `custom_sort_key_order`
    Custom,
}

impl ItemSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSort::Newest => "newest",
            ItemSort::Oldest => "oldest",
            ItemSort::Title => "title",
            ItemSort::Domain => "domain",
            ItemSort::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ItemSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ItemSort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest" => Ok(ItemSort::Newest),
            "oldest" => Ok(ItemSort::Oldest),
            "title" => Ok(ItemSort::Title),
            "domain" => Ok(ItemSort::Domain),
            "custom" => Ok(ItemSort::Custom),
            _ => Err(format!("Unknown item sort: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomGroupMeta {
    /// Primary key
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Display position; dense from 0 across all groups
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub item_sort: Option<ItemSort>,
    #[serde(default)]
    pub custom_sort_key_order: Option<Vec<String>>,
}

impl CustomGroupMeta {
    pub fn new(name: impl Into<String>, sort_order: i64) -> Self {
        let now = time::now();
        Self {
            name: name.into(),
            created_at: now,
            updated_at: now,
            sort_order,
            color: None,
            item_sort: None,
            custom_sort_key_order: None,
        }
    }

    /// Copy of this group under a new primary key, preferences preserved.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            updated_at: time::now(),
            ..self.clone()
        }
    }
}
