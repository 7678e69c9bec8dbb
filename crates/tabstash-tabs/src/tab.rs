//! Saved tab data structure
//!
//! A saved tab is displayed under exactly one `group`, which is either its
//! domain or a custom group name, but it may be a member of several custom
//! groups at once. A custom-classified tab is always a member of its `group`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tabstash_storage::time;

use crate::error::TabError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    /// `group` holds the tab's domain
    #[default]
    Domain,
    /// `group` holds a custom group name
    Custom,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Domain => "domain",
            GroupType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for GroupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GroupType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "domain" => Ok(GroupType::Domain),
            "custom" => Ok(GroupType::Custom),
            _ => Err(format!("Unknown group type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTab {
    /// Unique identifier, never changes
    pub id: String,
    /// Address at save time
    pub url: String,
    /// `url` after normalization; at most one tab exists per canonical URL
    pub canonical_url: String,
    pub title: String,
    /// User-chosen label shown instead of the title
    pub display_name: Option<String>,
    pub domain: String,
    pub favicon_url: String,
    /// Encoded screenshot image, empty when none was captured
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshot: Vec<u8>,
    pub last_accessed: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    pub sort_key: Option<String>,
    /// Display group: a domain or a custom group name
    pub group: String,
    pub group_type: GroupType,
    /// Every custom group this tab belongs to
    #[serde(default)]
    pub custom_groups: Vec<String>,
}

impl SavedTab {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(TabError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let now = time::now();
        let domain = extract_domain(&url);

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            canonical_url: url.clone(),
            url,
            title: title.into(),
            display_name: None,
            group: domain.clone(),
            domain,
            favicon_url: String::new(),
            screenshot: Vec::new(),
            last_accessed: now,
            saved_at: now,
            sort_key: None,
            group_type: GroupType::Domain,
            custom_groups: Vec::new(),
        })
    }

    pub fn with_canonical_url(mut self, canonical_url: impl Into<String>) -> Self {
        self.canonical_url = canonical_url.into();
        self
    }

    pub fn with_screenshot(mut self, screenshot: Vec<u8>) -> Self {
        self.screenshot = screenshot;
        self
    }

    pub fn with_favicon(mut self, favicon_url: impl Into<String>) -> Self {
        self.favicon_url = favicon_url.into();
        self
    }

    pub fn in_custom_group(mut self, name: &str) -> Self {
        self.assign_to_group(name);
        self
    }

    /// Title shown in lists, falling back to the URL.
    pub fn display_title(&self) -> &str {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
            name
        } else if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    /// Fill derived fields a caller may have left blank before a write.
    pub fn prepare_for_save(&mut self) {
        if self.canonical_url.trim().is_empty() {
            self.canonical_url = self.url.clone();
        }
        if self.domain.is_empty() {
            self.domain = extract_domain(&self.url);
        }
        if self.group.is_empty() {
            self.group = self.domain.clone();
            self.group_type = GroupType::Domain;
        }
        self.ensure_membership();
    }

    fn ensure_membership(&mut self) {
        if self.group_type == GroupType::Custom && !self.custom_groups.contains(&self.group) {
            self.custom_groups.push(self.group.clone());
        }
    }

    fn reset_to_domain(&mut self) {
        self.group = self.domain.clone();
        self.group_type = GroupType::Domain;
    }

    /// Display the tab under `name` and record the membership.
    pub fn assign_to_group(&mut self, name: &str) {
        self.group = name.to_string();
        self.group_type = GroupType::Custom;
        self.ensure_membership();
    }

    /// Drop custom membership.
    ///
    /// Without a name every membership is cleared and the tab falls back to its
    /// domain. With a name only that membership goes; if it was the display
    /// group another remaining membership takes its place, else the domain.
    pub fn remove_from_group(&mut self, name: Option<&str>) {
        match name {
            None => {
                self.custom_groups.clear();
                self.reset_to_domain();
            }
            Some(name) => {
                self.custom_groups.retain(|g| g != name);
                if self.group_type == GroupType::Custom && self.group == name {
                    match self.custom_groups.first().cloned() {
                        Some(next) => self.group = next,
                        None => self.reset_to_domain(),
                    }
                }
            }
        }
    }

    /// Follow a custom group rename. Returns whether anything changed.
    pub fn rename_group(&mut self, old: &str, new: &str) -> bool {
        let mut changed = false;

        if self.group_type == GroupType::Custom && self.group == old {
            self.group = new.to_string();
            changed = true;
        }

        if self.custom_groups.iter().any(|g| g == old) {
            let mut renamed = Vec::with_capacity(self.custom_groups.len());
            for group in self.custom_groups.drain(..) {
                let group = if group == old { new.to_string() } else { group };
                if !renamed.contains(&group) {
                    renamed.push(group);
                }
            }
            self.custom_groups = renamed;
            changed = true;
        }

        changed
    }

    /// Forget a deleted custom group. Returns whether anything changed.
    pub fn drop_group(&mut self, name: &str) -> bool {
        let mut changed = false;

        if self.group == name {
            if self.group_type != GroupType::Domain || self.group != self.domain {
                changed = true;
            }
            self.reset_to_domain();
        }

        let before = self.custom_groups.len();
        self.custom_groups.retain(|g| g != name);
        changed || self.custom_groups.len() != before
    }

    /// Merge an incoming write into the record already stored for the same
    /// canonical URL.
    ///
    /// The stored identity and classification win; content comes from the
    /// incoming tab, except that an empty screenshot or missing sort key never
    /// erases the stored one. With `union_custom_groups` the membership sets are
    /// combined instead of keeping the stored set only.
    pub fn merge_into(self, existing: &SavedTab, union_custom_groups: bool) -> SavedTab {
        let incoming_group = self.group.clone();
        let incoming_type = self.group_type;
        let incoming_groups = self.custom_groups.clone();

        let mut merged = self;
        merged.id = existing.id.clone();
        merged.display_name = existing.display_name.clone();
        merged.group = existing.group.clone();
        merged.group_type = existing.group_type;
        merged.custom_groups = existing.custom_groups.clone();

        if merged.screenshot.is_empty() {
            merged.screenshot = existing.screenshot.clone();
        }
        if merged.sort_key.is_none() {
            merged.sort_key = existing.sort_key.clone();
        }

        if union_custom_groups {
            for group in incoming_groups {
                if !merged.custom_groups.contains(&group) {
                    merged.custom_groups.push(group);
                }
            }
            if existing.group_type == GroupType::Domain && incoming_type == GroupType::Custom {
                merged.group = incoming_group;
                merged.group_type = GroupType::Custom;
            }
        }

        merged.ensure_membership();
        merged
    }
}

/// Host of a URL, or its scheme for host-less URLs such as `about:blank`.
pub fn extract_domain(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(str::to_string)
            .unwrap_or_else(|| parsed.scheme().to_string()),
        Err(_) => String::new(),
    }
}

/// Partial update applied by `TabManager::update`.
///
/// `None` leaves a field alone. Nullable fields take `Some(None)` to clear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabPatch {
    pub url: Option<String>,
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    pub display_name: Option<Option<String>>,
    pub domain: Option<String>,
    pub favicon_url: Option<String>,
    pub screenshot: Option<Vec<u8>>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub saved_at: Option<DateTime<Utc>>,
    pub sort_key: Option<Option<String>>,
    pub group: Option<String>,
    pub group_type: Option<GroupType>,
    pub custom_groups: Option<Vec<String>>,
}

impl TabPatch {
    pub fn apply(self, tab: &mut SavedTab) {
        if let Some(url) = self.url {
            tab.url = url;
        }
        if let Some(canonical_url) = self.canonical_url {
            tab.canonical_url = canonical_url;
        }
        if let Some(title) = self.title {
            tab.title = title;
        }
        if let Some(display_name) = self.display_name {
            tab.display_name = display_name;
        }
        if let Some(domain) = self.domain {
            tab.domain = domain;
        }
        if let Some(favicon_url) = self.favicon_url {
            tab.favicon_url = favicon_url;
        }
        if let Some(screenshot) = self.screenshot {
            tab.screenshot = screenshot;
        }
        if let Some(last_accessed) = self.last_accessed {
            tab.last_accessed = last_accessed;
        }
        if let Some(saved_at) = self.saved_at {
            tab.saved_at = saved_at;
        }
        if let Some(sort_key) = self.sort_key {
            tab.sort_key = sort_key;
        }
        if let Some(group) = self.group {
            tab.group = group;
        }
        if let Some(group_type) = self.group_type {
            tab.group_type = group_type;
        }
        if let Some(custom_groups) = self.custom_groups {
            tab.custom_groups = custom_groups;
        }
        tab.prepare_for_save();
    }
}
