//! Trash Manager
//!
//! Soft deletion with a retention window. A retention of zero days skips the
//! trash and deletes the tab outright.

use chrono::Duration;
use rusqlite::Connection;

use tabstash_groups::sql as group_sql;
use tabstash_storage::{time, ChangeEvent, ChangeNotifier, Database};
use tabstash_tabs::{sql as tab_sql, SavedTab};

use crate::error::TrashError;
use crate::sql;
use crate::trashed::TrashedTab;
use crate::Result;

pub struct TrashManager {
    db: Database,
    notifier: ChangeNotifier,
}

/// What happened to one live tab removed by a trash operation.
enum Removal {
    Trashed,
    Deleted,
    Missing,
}

impl TrashManager {
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }

    /// Move one tab to the trash, or delete it when `retention_days` is 0.
    pub async fn move_to_trash(&self, id: &str, retention_days: u32) -> Result<()> {
        let owned = id.to_string();

        let removal = self
            .db
            .run_transaction(move |conn| Ok::<_, TrashError>(remove_tab(conn, &owned, retention_days)?))
            .await?;

        match removal {
            Removal::Missing => return Err(TrashError::TabNotFound(id.to_string())),
            Removal::Trashed => tracing::info!(tab_id = %id, "Moved tab to trash"),
            Removal::Deleted => tracing::info!(tab_id = %id, "Deleted tab without trash retention"),
        }
        self.notify_removed(1, retention_days);
        Ok(())
    }

    /// Move several tabs in one transaction. Ids with no live tab are skipped.
    pub async fn move_many_to_trash(&self, ids: Vec<String>, retention_days: u32) -> Result<usize> {
        let moved = self
            .db
            .run_transaction(move |conn| -> Result<usize> {
                let mut moved = 0;
                for id in &ids {
                    match remove_tab(conn, id, retention_days)? {
                        Removal::Missing => tracing::warn!(tab_id = %id, "Skipping missing tab"),
                        _ => moved += 1,
                    }
                }
                Ok(moved)
            })
            .await?;

        tracing::info!(moved, retention_days, "Moved tabs to trash");
        self.notify_removed(moved, retention_days);
        Ok(moved)
    }

    /// Move every tab of a group (custom name, display group or raw domain).
    pub async fn move_group_to_trash(&self, group_name: &str, retention_days: u32) -> Result<usize> {
        let group = group_name.to_string();

        let moved = self
            .db
            .run_transaction(move |conn| -> Result<usize> {
                let tabs = tab_sql::select_in_group(conn, &group)?;
                for tab in &tabs {
                    trash_tab(conn, tab, retention_days)?;
                }
                Ok(tabs.len())
            })
            .await?;

        tracing::info!(group = %group_name, moved, retention_days, "Moved group to trash");
        self.notify_removed(moved, retention_days);
        Ok(moved)
    }

    /// Bring a trashed tab back under its captured classification.
    ///
    /// Custom groups that no longer exist are recreated. A live tab with the
    /// same canonical URL is replaced by the restored one.
    pub async fn restore(&self, id: &str) -> Result<SavedTab> {
        let owned = id.to_string();

        let (tab, created_groups) = self
            .db
            .run_transaction(move |conn| restore_one(conn, &owned))
            .await?;

        tracing::info!(tab_id = %tab.id, group = %tab.group, "Restored tab from trash");
        self.notify_restored(1, !created_groups.is_empty());
        Ok(tab)
    }

    /// Restore each id independently. Returns how many succeeded.
    pub async fn restore_many(&self, ids: Vec<String>) -> Result<usize> {
        let mut restored = 0;
        let mut created_groups = false;

        for id in ids {
            let owned = id.clone();
            let result = self
                .db
                .run_transaction(move |conn| restore_one(conn, &owned))
                .await;

            match result {
                Ok((_, created)) => {
                    restored += 1;
                    created_groups |= !created.is_empty();
                }
                Err(e) => tracing::warn!(tab_id = %id, error = %e, "Failed to restore tab"),
            }
        }

        tracing::info!(restored, "Restored tabs from trash");
        self.notify_restored(restored, created_groups);
        Ok(restored)
    }

    pub async fn restore_all(&self) -> Result<usize> {
        let ids = self
            .db
            .run(|conn| Ok::<_, TrashError>(sql::select_ids(conn)?))
            .await?;
        self.restore_many(ids).await
    }

    /// All trashed tabs, most recently trashed first.
    pub async fn get_all(&self) -> Result<Vec<TrashedTab>> {
        self.db
            .run(|conn| Ok::<_, TrashError>(sql::select_all(conn)?))
            .await
    }

    pub async fn count(&self) -> Result<usize> {
        self.db
            .run(|conn| Ok::<_, TrashError>(sql::count(conn)?))
            .await
    }

    pub async fn delete_permanently(&self, id: &str) -> Result<bool> {
        let owned = id.to_string();
        let deleted = self
            .db
            .run(move |conn| Ok::<_, TrashError>(sql::delete_trashed(conn, &owned)?))
            .await?;

        if deleted {
            tracing::info!(tab_id = %id, "Permanently deleted trashed tab");
            self.notifier.notify(ChangeEvent::TrashChanged);
        }
        Ok(deleted)
    }

    pub async fn delete_many_permanently(&self, ids: Vec<String>) -> Result<usize> {
        let deleted = self
            .db
            .run_transaction(move |conn| -> Result<usize> {
                let mut deleted = 0;
                for id in &ids {
                    if sql::delete_trashed(conn, id)? {
                        deleted += 1;
                    }
                }
                Ok(deleted)
            })
            .await?;

        tracing::info!(deleted, "Permanently deleted trashed tabs");
        if deleted > 0 {
            self.notifier.notify(ChangeEvent::TrashChanged);
        }
        Ok(deleted)
    }

    /// Permanently delete everything in the trash.
    pub async fn empty(&self) -> Result<usize> {
        let deleted = self
            .db
            .run(|conn| Ok::<_, TrashError>(conn.execute("DELETE FROM trash", [])?))
            .await?;

        tracing::info!(deleted, "Emptied trash");
        self.notifier.notify(ChangeEvent::TrashChanged);
        Ok(deleted)
    }

    /// Purge entries trashed more than `retention_days` ago.
    pub async fn delete_expired(&self, retention_days: u32) -> Result<usize> {
        // Nothing predates a cutoff outside the representable range.
        let Some(cutoff) = Duration::try_days(i64::from(retention_days))
            .and_then(|window| time::now().checked_sub_signed(window))
        else {
            return Ok(0);
        };
        let cutoff = time::encode(&cutoff);

        let deleted = self
            .db
            .run(move |conn| {
                Ok::<_, TrashError>(
                    conn.execute("DELETE FROM trash WHERE trashed_at < ?1", [&cutoff])?,
                )
            })
            .await?;

        if deleted > 0 {
            tracing::info!(deleted, retention_days, "Purged expired trash");
            self.notifier.notify(ChangeEvent::TrashChanged);
        }
        Ok(deleted)
    }

    fn notify_removed(&self, count: usize, retention_days: u32) {
        if count == 0 {
            return;
        }
        self.notifier.notify(ChangeEvent::TabsChanged);
        if retention_days > 0 {
            self.notifier.notify(ChangeEvent::TrashChanged);
        }
    }

    fn notify_restored(&self, count: usize, created_groups: bool) {
        if count == 0 {
            return;
        }
        self.notifier
            .notify_all(&[ChangeEvent::TabsChanged, ChangeEvent::TrashChanged]);
        if created_groups {
            self.notifier.notify(ChangeEvent::CustomGroupsChanged);
        }
    }
}

fn remove_tab(conn: &Connection, id: &str, retention_days: u32) -> rusqlite::Result<Removal> {
    match tab_sql::select_tab(conn, id)? {
        Some(tab) => trash_tab(conn, &tab, retention_days),
        None => Ok(Removal::Missing),
    }
}

fn trash_tab(conn: &Connection, tab: &SavedTab, retention_days: u32) -> rusqlite::Result<Removal> {
    tab_sql::delete_tab(conn, &tab.id)?;
    if retention_days == 0 {
        return Ok(Removal::Deleted);
    }
    sql::put_trashed(conn, &TrashedTab::from_tab(tab.clone()))?;
    Ok(Removal::Trashed)
}

fn restore_one(conn: &Connection, id: &str) -> Result<(SavedTab, Vec<String>)> {
    let trashed = sql::select_trashed(conn, id)?.ok_or_else(|| TrashError::NotFound(id.to_string()))?;
    let tab = trashed.into_restored();

    let created = group_sql::ensure_groups(conn, &tab.custom_groups)?;
    if !created.is_empty() {
        tracing::debug!(groups = ?created, "Recreated groups for restored tab");
    }

    if let Some(live) = tab_sql::select_by_canonical_url(conn, &tab.canonical_url)? {
        if live.id != tab.id {
            tracing::debug!(replaced = %live.id, "Restored tab replaces live duplicate");
            tab_sql::delete_tab(conn, &live.id)?;
        }
    }

    tab_sql::put_tab(conn, &tab)?;
    sql::delete_trashed(conn, id)?;

    Ok((tab, created))
}
