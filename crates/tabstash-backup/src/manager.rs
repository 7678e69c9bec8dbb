//! Backup Manager
//!
//! Full-state snapshots of tabs and groups. Snapshots are immutable once
//! written; restoring from one never changes it.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use tabstash_groups::{sql as group_sql, CustomGroupMeta};
use tabstash_storage::{time, ChangeEvent, ChangeNotifier, Database, SCHEMA_VERSION};
use tabstash_tabs::sql as tab_sql;

use crate::error::BackupError;
use crate::record::{BackupRecord, BackupSummary, BackupTab, RestoreMode, RestoreOutcome};
use crate::sql;
use crate::Result;

/// Exported document: the full record plus the export time.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupExport<'a> {
    #[serde(flatten)]
    backup: &'a BackupRecord,
    exported_at: DateTime<Utc>,
}

pub struct BackupManager {
    db: Database,
    notifier: ChangeNotifier,
}

impl BackupManager {
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }

    /// Snapshot every live tab and group.
    pub async fn create(&self) -> Result<BackupRecord> {
        let record = self
            .db
            .run_transaction(|conn| -> Result<BackupRecord> {
                let tabs: Vec<BackupTab> = tab_sql::select_all(conn)?
                    .iter()
                    .map(BackupTab::from)
                    .collect();
                let custom_groups = group_sql::select_all(conn)?;

                let created_at = time::now();
                let id = sql::free_id(conn, &format!("backup_{}", created_at.timestamp_millis()))?;

                let record = BackupRecord {
                    id,
                    created_at,
                    version: SCHEMA_VERSION,
                    tab_count: tabs.len(),
                    custom_groups,
                    tabs,
                };
                sql::insert_backup(conn, &record)?;
                Ok(record)
            })
            .await?;

        tracing::info!(
            backup_id = %record.id,
            tabs = record.tab_count,
            groups = record.custom_groups.len(),
            "Created backup"
        );
        Ok(record)
    }

    /// Backups without tab payloads, newest first.
    pub async fn list(&self) -> Result<Vec<BackupSummary>> {
        self.db
            .run(|conn| Ok::<_, BackupError>(sql::select_summaries(conn)?))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<BackupRecord>> {
        let id = id.to_string();
        self.db
            .run(move |conn| Ok::<_, BackupError>(sql::select_backup(conn, &id)?))
            .await
    }

    pub async fn restore(&self, id: &str, mode: RestoreMode) -> Result<RestoreOutcome> {
        let owned = id.to_string();

        let outcome = self
            .db
            .run_transaction(move |conn| -> Result<RestoreOutcome> {
                let record = sql::select_backup(conn, &owned)?
                    .ok_or_else(|| BackupError::NotFound(owned.clone()))?;
                Ok(match mode {
                    RestoreMode::Overwrite => restore_overwrite(conn, &record)?,
                    RestoreMode::Merge => restore_merge(conn, &record)?,
                })
            })
            .await?;

        tracing::info!(
            backup_id = %id,
            mode = %mode,
            restored = outcome.restored,
            skipped = outcome.skipped,
            "Restored backup"
        );
        self.notifier
            .notify_all(&[ChangeEvent::TabsChanged, ChangeEvent::CustomGroupsChanged]);

        Ok(outcome)
    }

    /// Keep only the `keep` most recent backups. Negative keeps everything.
    pub async fn prune(&self, keep: i64) -> Result<usize> {
        if keep < 0 {
            return Ok(0);
        }

        let deleted = self
            .db
            .run_transaction(move |conn| -> Result<usize> {
                let summaries = sql::select_summaries(conn)?;
                let mut deleted = 0;
                for summary in summaries.iter().skip(keep as usize) {
                    if sql::delete_backup(conn, &summary.id)? {
                        deleted += 1;
                    }
                }
                Ok(deleted)
            })
            .await?;

        if deleted > 0 {
            tracing::info!(deleted, keep, "Pruned backups");
        }
        Ok(deleted)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let owned = id.to_string();
        let deleted = self
            .db
            .run(move |conn| Ok::<_, BackupError>(sql::delete_backup(conn, &owned)?))
            .await?;

        if deleted {
            tracing::info!(backup_id = %id, "Deleted backup");
        }
        Ok(deleted)
    }

    /// Serialize a backup to a self-contained JSON document.
    pub async fn export_as_json(&self, id: &str) -> Result<String> {
        let record = self
            .get(id)
            .await?
            .ok_or_else(|| BackupError::NotFound(id.to_string()))?;

        let document = serde_json::to_string_pretty(&BackupExport {
            backup: &record,
            exported_at: time::now(),
        })?;

        tracing::debug!(backup_id = %id, bytes = document.len(), "Exported backup");
        Ok(document)
    }

    /// Store an exported document as a new backup.
    pub async fn import_json(&self, document: &str) -> Result<BackupRecord> {
        let mut record: BackupRecord = serde_json::from_str(document)
            .map_err(|e| BackupError::InvalidDocument(e.to_string()))?;
        record.tab_count = record.tabs.len();
        if record.id.trim().is_empty() {
            record.id = format!("backup_{}", record.created_at.timestamp_millis());
        }

        let record = self
            .db
            .run_transaction(move |conn| -> Result<BackupRecord> {
                record.id = sql::free_id(conn, &record.id)?;
                sql::insert_backup(conn, &record)?;
                Ok(record)
            })
            .await?;

        tracing::info!(backup_id = %record.id, tabs = record.tab_count, "Imported backup");
        Ok(record)
    }
}

fn restore_overwrite(conn: &Connection, record: &BackupRecord) -> Result<RestoreOutcome> {
    conn.execute("DELETE FROM tabs", [])?;
    conn.execute("DELETE FROM custom_groups", [])?;

    let mut groups: Vec<&CustomGroupMeta> = record.custom_groups.iter().collect();
    groups.sort_by_key(|g| g.sort_order);
    for group in groups {
        group_sql::insert_group(conn, group)?;
    }
    group_sql::densify(conn)?;

    // Repeated ids or canonical URLs fold into one live tab, as in a save.
    let mut outcome = RestoreOutcome::default();
    for snapshot in &record.tabs {
        let mut tab = snapshot.to_saved();

        if let Some(existing) = tab_sql::select_by_canonical_url(conn, &tab.canonical_url)? {
            tab_sql::put_tab(conn, &tab.merge_into(&existing, false))?;
            outcome.skipped += 1;
            continue;
        }
        if tab_sql::select_tab(conn, &tab.id)?.is_some() {
            tab.id = Uuid::new_v4().to_string();
        }

        tab_sql::put_tab(conn, &tab)?;
        outcome.restored += 1;
    }

    Ok(outcome)
}

fn restore_merge(conn: &Connection, record: &BackupRecord) -> Result<RestoreOutcome> {
    let mut groups: Vec<&CustomGroupMeta> = record.custom_groups.iter().collect();
    groups.sort_by_key(|g| g.sort_order);
    for group in groups {
        if !group_sql::group_exists(conn, &group.name)? {
            let mut group = group.clone();
            group.sort_order = group_sql::next_sort_order(conn)?;
            group_sql::insert_group(conn, &group)?;
        }
    }

    let mut outcome = RestoreOutcome::default();
    for snapshot in &record.tabs {
        let mut tab = snapshot.to_saved();

        let live = tab_sql::select_by_url(conn, &tab.url)?.is_some()
            || tab_sql::select_by_canonical_url(conn, &tab.canonical_url)?.is_some();
        if live {
            outcome.skipped += 1;
            continue;
        }

        if tab_sql::select_tab(conn, &tab.id)?.is_some() {
            tab.id = Uuid::new_v4().to_string();
        }
        tab_sql::put_tab(conn, &tab)?;
        outcome.restored += 1;
    }

    Ok(outcome)
}
