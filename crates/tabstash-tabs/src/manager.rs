//! Tab Manager
//!
//! Durable CRUD over saved tabs. Writes are keyed by canonical URL: saving a
//! tab whose canonical URL is already stored merges into the stored record
//! instead of creating a second one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use tabstash_storage::{ChangeEvent, ChangeNotifier, Database};

use crate::error::TabError;
use crate::normalize::{normalize_url, NormalizationRule};
use crate::sql;
use crate::tab::{SavedTab, TabPatch};
use crate::Result;

/// Outcome of re-normalizing the stored tabs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationReport {
    /// Tabs deleted because they collided with a survivor
    pub merged_count: usize,
    /// Survivors whose canonical URL changed
    pub updated_count: usize,
    pub details: Vec<MergeDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeDetail {
    pub canonical_url: String,
    pub kept_id: String,
    pub kept_url: String,
    pub merged_urls: Vec<String>,
}

pub struct TabManager {
    db: Database,
    notifier: ChangeNotifier,
}

impl TabManager {
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }

    pub async fn get(&self, id: &str) -> Result<Option<SavedTab>> {
        let id = id.to_string();
        self.db
            .run(move |conn| Ok::<_, TabError>(sql::select_tab(conn, &id)?))
            .await
    }

    pub async fn find_by_url(&self, url: &str) -> Result<Option<SavedTab>> {
        let url = url.to_string();
        self.db
            .run(move |conn| Ok::<_, TabError>(sql::select_by_url(conn, &url)?))
            .await
    }

    pub async fn find_by_canonical_url(&self, canonical_url: &str) -> Result<Option<SavedTab>> {
        let canonical_url = canonical_url.to_string();
        self.db
            .run(move |conn| {
                Ok::<_, TabError>(sql::select_by_canonical_url(conn, &canonical_url)?)
            })
            .await
    }

    /// Save a batch of tabs, merging each into any record stored under the same
    /// canonical URL. Returns the records as written.
    pub async fn save(&self, tabs: Vec<SavedTab>) -> Result<Vec<SavedTab>> {
        self.save_batch(tabs, false).await
    }

    /// Like [`TabManager::save`], but custom group membership is combined with
    /// the stored set rather than replaced by it.
    pub async fn save_for_custom_group(&self, tabs: Vec<SavedTab>) -> Result<Vec<SavedTab>> {
        self.save_batch(tabs, true).await
    }

    async fn save_batch(&self, tabs: Vec<SavedTab>, union: bool) -> Result<Vec<SavedTab>> {
        if tabs.is_empty() {
            return Ok(Vec::new());
        }

        let saved = self
            .db
            .run_transaction(move |conn| {
                let mut saved = Vec::with_capacity(tabs.len());
                for mut tab in tabs {
                    tab.prepare_for_save();
                    let record = match sql::select_by_canonical_url(conn, &tab.canonical_url)? {
                        Some(existing) => tab.merge_into(&existing, union),
                        None => tab,
                    };
                    sql::put_tab(conn, &record)?;
                    saved.push(record);
                }
                Ok::<_, TabError>(saved)
            })
            .await?;

        tracing::info!(count = saved.len(), union, "Saved tabs");
        self.notifier.notify(ChangeEvent::TabsChanged);

        Ok(saved)
    }

    /// All tabs, most recently saved first.
    pub async fn get_all(&self) -> Result<Vec<SavedTab>> {
        self.db
            .run(|conn| Ok::<_, TabError>(sql::select_all(conn)?))
            .await
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let owned = id.to_string();
        let deleted = self
            .db
            .run(move |conn| Ok::<_, TabError>(sql::delete_tab(conn, &owned)?))
            .await?;

        if deleted {
            tracing::info!(tab_id = %id, "Deleted tab");
            self.notifier.notify(ChangeEvent::TabsChanged);
        }
        Ok(deleted)
    }

    pub async fn delete_all(&self) -> Result<usize> {
        let deleted = self
            .db
            .run(|conn| Ok::<_, TabError>(conn.execute("DELETE FROM tabs", [])?))
            .await?;

        tracing::info!(deleted, "Deleted all tabs");
        self.notifier.notify(ChangeEvent::TabsChanged);
        Ok(deleted)
    }

    /// Delete every tab in a group. `name` may be a custom group, a display
    /// group or a raw domain.
    pub async fn delete_by_group(&self, name: &str) -> Result<usize> {
        let owned = name.to_string();
        let deleted = self
            .db
            .run(move |conn| Ok::<_, TabError>(sql::delete_in_group(conn, &owned)?))
            .await?;

        tracing::info!(group = %name, deleted, "Deleted tabs by group");
        if deleted > 0 {
            self.notifier.notify(ChangeEvent::TabsChanged);
        }
        Ok(deleted)
    }

    /// Apply a partial update to one stored tab.
    pub async fn update(&self, id: &str, patch: TabPatch) -> Result<SavedTab> {
        let id = id.to_string();
        let tab = self
            .db
            .run_transaction(move |conn| -> Result<SavedTab> {
                let mut tab =
                    sql::select_tab(conn, &id)?.ok_or_else(|| TabError::NotFound(id.clone()))?;
                let previous_canonical = tab.canonical_url.clone();

                patch.apply(&mut tab);

                if tab.canonical_url != previous_canonical {
                    if let Some(other) = sql::select_by_canonical_url(conn, &tab.canonical_url)? {
                        if other.id != tab.id {
                            return Err(TabError::DuplicateCanonicalUrl(tab.canonical_url));
                        }
                    }
                }

                sql::put_tab(conn, &tab)?;
                Ok(tab)
            })
            .await?;

        tracing::debug!(tab_id = %tab.id, "Updated tab");
        self.notifier.notify(ChangeEvent::TabsChanged);
        Ok(tab)
    }

    pub async fn count(&self) -> Result<usize> {
        self.db
            .run(|conn| Ok::<_, TabError>(sql::count_tabs(conn)?))
            .await
    }

    /// Recompute every canonical URL under `rules` and collapse tabs that now
    /// collide. The most recently saved tab of each collision survives.
    pub async fn apply_normalization_to_existing(
        &self,
        rules: Vec<NormalizationRule>,
    ) -> Result<NormalizationReport> {
        let report = self
            .db
            .run_transaction(move |conn| {
                let tabs = sql::select_all(conn)?;

                let mut order: Vec<String> = Vec::new();
                let mut collisions: HashMap<String, Vec<SavedTab>> = HashMap::new();
                for tab in tabs {
                    let canonical = normalize_url(&tab.url, &rules);
                    if !collisions.contains_key(&canonical) {
                        order.push(canonical.clone());
                    }
                    collisions.entry(canonical).or_default().push(tab);
                }

                let mut report = NormalizationReport::default();
                for canonical in order {
                    let Some(group) = collisions.remove(&canonical) else {
                        continue;
                    };
                    let mut group = group.into_iter();
                    let Some(mut survivor) = group.next() else {
                        continue;
                    };

                    if survivor.canonical_url != canonical {
                        survivor.canonical_url = canonical.clone();
                        sql::put_tab(conn, &survivor)?;
                        report.updated_count += 1;
                    }

                    let mut merged_urls = Vec::new();
                    for duplicate in group {
                        sql::delete_tab(conn, &duplicate.id)?;
                        merged_urls.push(duplicate.url);
                    }

                    if !merged_urls.is_empty() {
                        report.merged_count += merged_urls.len();
                        report.details.push(MergeDetail {
                            canonical_url: canonical,
                            kept_id: survivor.id,
                            kept_url: survivor.url,
                            merged_urls,
                        });
                    }
                }

                Ok::<_, TabError>(report)
            })
            .await?;

        tracing::info!(
            merged = report.merged_count,
            updated = report.updated_count,
            "Applied URL normalization to saved tabs"
        );
        if report.merged_count > 0 || report.updated_count > 0 {
            self.notifier.notify(ChangeEvent::TabsChanged);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NormalizationAction;
    use crate::tab::GroupType;
    use chrono::Duration;

    fn manager() -> TabManager {
        TabManager::new(Database::open_in_memory().unwrap(), ChangeNotifier::new())
    }

    fn tab(url: &str) -> SavedTab {
        SavedTab::new(url, "Title").unwrap()
    }

    #[tokio::test]
    async fn test_save_merges_on_canonical_url() {
        let manager = manager();

        let mut first = tab("https://example.com/a?utm_source=x").with_canonical_url("https://example.com/a");
        first.display_name = Some("Pinned".to_string());
        first.screenshot = vec![1, 2, 3];
        let first = first.in_custom_group("Work");
        manager.save(vec![first.clone()]).await.unwrap();

        let mut second = tab("https://example.com/a").with_canonical_url("https://example.com/a");
        second.title = "Updated".to_string();
        manager.save(vec![second]).await.unwrap();

        assert_eq!(manager.count().await.unwrap(), 1);
        let stored = manager
            .find_by_canonical_url("https://example.com/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.title, "Updated");
        assert_eq!(stored.url, "https://example.com/a");
        assert_eq!(stored.display_name.as_deref(), Some("Pinned"));
        assert_eq!(stored.group, "Work");
        assert_eq!(stored.group_type, GroupType::Custom);
        assert_eq!(stored.custom_groups, vec!["Work"]);
        assert_eq!(stored.screenshot, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_duplicates_within_one_batch_collapse() {
        let manager = manager();
        let saved = manager
            .save(vec![tab("https://example.com/x"), tab("https://example.com/x")])
            .await
            .unwrap();

        assert_eq!(saved[0].id, saved[1].id);
        assert_eq!(manager.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_for_custom_group_unions_membership() {
        let manager = manager();
        manager
            .save_for_custom_group(vec![tab("https://example.com/x").in_custom_group("A")])
            .await
            .unwrap();
        manager
            .save_for_custom_group(vec![tab("https://example.com/x").in_custom_group("B")])
            .await
            .unwrap();

        let stored = manager.find_by_url("https://example.com/x").await.unwrap().unwrap();
        assert!(stored.custom_groups.contains(&"A".to_string()));
        assert!(stored.custom_groups.contains(&"B".to_string()));
        assert_eq!(stored.group, "A");
    }

    #[tokio::test]
    async fn test_get_all_newest_first() {
        let manager = manager();
        let mut old = tab("https://example.com/old");
        old.saved_at = old.saved_at - Duration::hours(2);
        let mut middle = tab("https://example.com/middle");
        middle.saved_at = middle.saved_at - Duration::hours(1);
        let new = tab("https://example.com/new");

        manager.save(vec![middle, new, old]).await.unwrap();

        let urls: Vec<String> = manager
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/new",
                "https://example.com/middle",
                "https://example.com/old"
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_by_domain_group() {
        let manager = manager();
        manager
            .save(vec![
                tab("https://example.com/1"),
                tab("https://example.com/2"),
                tab("https://example.com/3"),
            ])
            .await
            .unwrap();

        assert_eq!(manager.delete_by_group("example.com").await.unwrap(), 3);
        assert_eq!(manager.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_by_group_matches_memberships_and_raw_domain() {
        let manager = manager();
        let mut member = tab("https://a.test/1").in_custom_group("Work");
        member.custom_groups.push("Reading".to_string());
        let mut renamed_domain = tab("https://b.test/1");
        renamed_domain.group = "b-group".to_string();
        let other = tab("https://c.test/1");

        manager
            .save(vec![member, renamed_domain, other])
            .await
            .unwrap();

        assert_eq!(manager.delete_by_group("Reading").await.unwrap(), 1);
        assert_eq!(manager.delete_by_group("b.test").await.unwrap(), 1);
        assert_eq!(manager.delete_by_group("missing").await.unwrap(), 0);
        assert_eq!(manager.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_id_and_all() {
        let manager = manager();
        let saved = manager
            .save(vec![tab("https://example.com/1"), tab("https://example.com/2")])
            .await
            .unwrap();

        assert!(manager.delete_by_id(&saved[0].id).await.unwrap());
        assert!(!manager.delete_by_id(&saved[0].id).await.unwrap());
        assert_eq!(manager.delete_all().await.unwrap(), 1);
        assert_eq!(manager.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_applies_patch() {
        let manager = manager();
        let saved = manager.save(vec![tab("https://example.com/1")]).await.unwrap();

        let updated = manager
            .update(
                &saved[0].id,
                TabPatch {
                    title: Some("Renamed".to_string()),
                    sort_key: Some(Some("a0".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");

        let stored = manager.get(&saved[0].id).await.unwrap().unwrap();
        assert_eq!(stored.sort_key.as_deref(), Some("a0"));
        assert_eq!(stored.url, "https://example.com/1");
    }

    #[tokio::test]
    async fn test_update_errors() {
        let manager = manager();
        let saved = manager
            .save(vec![tab("https://example.com/1"), tab("https://example.com/2")])
            .await
            .unwrap();

        let missing = manager.update("nope", TabPatch::default()).await;
        assert!(matches!(missing, Err(TabError::NotFound(_))));

        let collision = manager
            .update(
                &saved[1].id,
                TabPatch {
                    canonical_url: Some("https://example.com/1".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(collision, Err(TabError::DuplicateCanonicalUrl(_))));
    }

    #[tokio::test]
    async fn test_normalization_merges_collisions() {
        let manager = manager();
        let mut older = tab("https://example.com/a?utm_source=mail");
        older.saved_at = older.saved_at - Duration::minutes(5);
        let newer = tab("https://example.com/a?utm_source=feed");
        let untouched = tab("https://example.com/b");
        manager
            .save(vec![older, newer.clone(), untouched])
            .await
            .unwrap();

        let rules = vec![NormalizationRule::new(
            "tracking",
            NormalizationAction::RemoveQueryParams {
                params: vec!["utm_*".to_string()],
            },
        )];
        let report = manager.apply_normalization_to_existing(rules).await.unwrap();

        assert_eq!(report.merged_count, 1);
        assert_eq!(report.updated_count, 1);
        assert_eq!(
            report.details,
            vec![MergeDetail {
                canonical_url: "https://example.com/a".to_string(),
                kept_id: newer.id.clone(),
                kept_url: newer.url.clone(),
                merged_urls: vec!["https://example.com/a?utm_source=mail".to_string()],
            }]
        );
        assert_eq!(manager.count().await.unwrap(), 2);

        let survivor = manager.get(&newer.id).await.unwrap().unwrap();
        assert_eq!(survivor.canonical_url, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_mutations_notify() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe();
        let manager = TabManager::new(Database::open_in_memory().unwrap(), notifier);

        manager.save(vec![tab("https://example.com/1")]).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::TabsChanged);
    }
}
