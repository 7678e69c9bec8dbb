//! Backup snapshot records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tabstash_groups::CustomGroupMeta;
use tabstash_tabs::{GroupType, SavedTab};

use crate::encoding::data_url;

/// Immutable copy of a saved tab inside a snapshot. The screenshot bytes are
/// owned by the snapshot, never shared with the live record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupTab {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub canonical_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub domain: String,
    /// Snapshots written before the favicon field rename use `favIconUrl`.
    #[serde(default, alias = "favIconUrl")]
    pub favicon_url: String,
    #[serde(default, with = "data_url")]
    pub screenshot: Vec<u8>,
    pub last_accessed: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub group_type: GroupType,
    #[serde(default)]
    pub custom_groups: Vec<String>,
}

impl From<&SavedTab> for BackupTab {
    fn from(tab: &SavedTab) -> Self {
        Self {
            id: tab.id.clone(),
            url: tab.url.clone(),
            canonical_url: tab.canonical_url.clone(),
            title: tab.title.clone(),
            display_name: tab.display_name.clone(),
            domain: tab.domain.clone(),
            favicon_url: tab.favicon_url.clone(),
            screenshot: tab.screenshot.clone(),
            last_accessed: tab.last_accessed,
            saved_at: tab.saved_at,
            sort_key: tab.sort_key.clone(),
            group: tab.group.clone(),
            group_type: tab.group_type,
            custom_groups: tab.custom_groups.clone(),
        }
    }
}

impl BackupTab {
    /// Live tab recreated from this snapshot entry.
    pub fn to_saved(&self) -> SavedTab {
        let mut tab = SavedTab {
            id: self.id.clone(),
            url: self.url.clone(),
            canonical_url: self.canonical_url.clone(),
            title: self.title.clone(),
            display_name: self.display_name.clone(),
            domain: self.domain.clone(),
            favicon_url: self.favicon_url.clone(),
            screenshot: self.screenshot.clone(),
            last_accessed: self.last_accessed,
            saved_at: self.saved_at,
            sort_key: self.sort_key.clone(),
            group: self.group.clone(),
            group_type: self.group_type,
            custom_groups: self.custom_groups.clone(),
        };
        tab.prepare_for_save();
        tab
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Schema version of the store that produced the snapshot
    pub version: i32,
    #[serde(default)]
    pub tab_count: usize,
    #[serde(default)]
    pub custom_groups: Vec<CustomGroupMeta>,
    #[serde(default)]
    pub tabs: Vec<BackupTab>,
}

impl BackupRecord {
    pub fn summary(&self) -> BackupSummary {
        BackupSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            version: self.version,
            tab_count: self.tab_count,
            custom_groups: self.custom_groups.clone(),
        }
    }
}

/// A backup without its tab payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub version: i32,
    pub tab_count: usize,
    pub custom_groups: Vec<CustomGroupMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    /// Add missing tabs and groups, leave live data alone
    Merge,
    /// Replace all live tabs and groups with the snapshot
    Overwrite,
}

impl RestoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreMode::Merge => "merge",
            RestoreMode::Overwrite => "overwrite",
        }
    }
}

impl std::fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RestoreMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merge" => Ok(RestoreMode::Merge),
            "overwrite" => Ok(RestoreMode::Overwrite),
            _ => Err(format!("Unknown restore mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOutcome {
    pub restored: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_favicon_field() {
        let json = r#"{
            "id": "t1",
            "url": "https://example.com/",
            "favIconUrl": "https://example.com/favicon.ico",
            "screenshot": "",
            "lastAccessed": "2024-01-01T00:00:00.000Z",
            "savedAt": "2024-01-01T00:00:00.000Z"
        }"#;
        let tab: BackupTab = serde_json::from_str(json).unwrap();
        assert_eq!(tab.favicon_url, "https://example.com/favicon.ico");
        assert!(tab.screenshot.is_empty());

        let saved = tab.to_saved();
        assert_eq!(saved.canonical_url, "https://example.com/");
        assert_eq!(saved.domain, "example.com");
        assert_eq!(saved.group, "example.com");
    }

    #[test]
    fn test_screenshot_is_copied() {
        let live = SavedTab::new("https://example.com", "E")
            .unwrap()
            .with_screenshot(vec![0xFF, 0xD8, 0xFF, 1]);
        let snapshot = BackupTab::from(&live);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value["screenshot"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert_eq!(snapshot.to_saved().screenshot, live.screenshot);
    }

    #[test]
    fn test_restore_mode_parse() {
        assert_eq!("Merge".parse::<RestoreMode>().unwrap(), RestoreMode::Merge);
        assert_eq!(RestoreMode::Overwrite.to_string(), "overwrite");
        assert!("replace".parse::<RestoreMode>().is_err());
    }
}
