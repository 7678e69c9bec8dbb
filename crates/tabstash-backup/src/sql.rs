//! Row-level access to the `backups` table.

use rusqlite::{params, Connection, OptionalExtension};

use tabstash_storage::{json, time};

use crate::record::{BackupRecord, BackupSummary};

pub fn select_backup(conn: &Connection, id: &str) -> rusqlite::Result<Option<BackupRecord>> {
    conn.query_row(
        "SELECT id, created_at, version, tab_count, custom_groups, tabs
         FROM backups WHERE id = ?1",
        [id],
        |row| {
            let tab_count: i64 = row.get(3)?;
            Ok(BackupRecord {
                id: row.get(0)?,
                created_at: time::column(row, 1)?,
                version: row.get(2)?,
                tab_count: tab_count as usize,
                custom_groups: json::column(row, 4)?,
                tabs: json::column(row, 5)?,
            })
        },
    )
    .optional()
}

/// Every backup without tab payloads, newest first.
pub fn select_summaries(conn: &Connection) -> rusqlite::Result<Vec<BackupSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, created_at, version, tab_count, custom_groups
         FROM backups ORDER BY created_at DESC, rowid DESC",
    )?;
    let summaries = stmt
        .query_map([], |row| {
            let tab_count: i64 = row.get(3)?;
            Ok(BackupSummary {
                id: row.get(0)?,
                created_at: time::column(row, 1)?,
                version: row.get(2)?,
                tab_count: tab_count as usize,
                custom_groups: json::column(row, 4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(summaries)
}

pub fn backup_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM backups WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// First id derived from `base` that no stored backup uses.
pub fn free_id(conn: &Connection, base: &str) -> rusqlite::Result<String> {
    let mut id = base.to_string();
    let mut suffix = 1;
    while backup_exists(conn, &id)? {
        id = format!("{base}_{suffix}");
        suffix += 1;
    }
    Ok(id)
}

pub fn insert_backup(conn: &Connection, record: &BackupRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO backups (id, created_at, version, tab_count, custom_groups, tabs)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            time::encode(&record.created_at),
            record.version,
            record.tab_count as i64,
            json::encode(&record.custom_groups)?,
            json::encode(&record.tabs)?,
        ],
    )?;
    Ok(())
}

pub fn delete_backup(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM backups WHERE id = ?1", [id])? > 0)
}
