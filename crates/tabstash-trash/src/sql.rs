//! Row-level access to the `trash` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use tabstash_storage::{json, time};
use tabstash_tabs::sql::{group_type_column, tab_from_row, TAB_COLUMNS, TAB_COLUMN_COUNT};

use crate::trashed::TrashedTab;

fn columns() -> String {
    format!(
        "{TAB_COLUMNS}, trashed_at, original_group, original_group_type, original_custom_groups"
    )
}

fn trashed_from_row(row: &Row<'_>) -> rusqlite::Result<TrashedTab> {
    let base = TAB_COLUMN_COUNT;
    Ok(TrashedTab {
        tab: tab_from_row(row, 0)?,
        trashed_at: time::column(row, base)?,
        original_group: row.get(base + 1)?,
        original_group_type: group_type_column(row, base + 2)?,
        original_custom_groups: json::column(row, base + 3)?,
    })
}

pub fn select_trashed(conn: &Connection, id: &str) -> rusqlite::Result<Option<TrashedTab>> {
    conn.query_row(
        &format!("SELECT {} FROM trash WHERE id = ?1", columns()),
        [id],
        trashed_from_row,
    )
    .optional()
}

/// Every trashed tab, most recently trashed first.
pub fn select_all(conn: &Connection) -> rusqlite::Result<Vec<TrashedTab>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM trash ORDER BY trashed_at DESC, rowid DESC",
        columns()
    ))?;
    let trashed = stmt
        .query_map([], trashed_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(trashed)
}

pub fn select_ids(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM trash ORDER BY trashed_at DESC, rowid DESC")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

pub fn put_trashed(conn: &Connection, trashed: &TrashedTab) -> rusqlite::Result<()> {
    let tab = &trashed.tab;
    let screenshot = (!tab.screenshot.is_empty()).then_some(&tab.screenshot);

    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO trash ({})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18)",
            columns()
        ),
        params![
            tab.id,
            tab.url,
            tab.canonical_url,
            tab.title,
            tab.display_name,
            tab.domain,
            tab.favicon_url,
            screenshot,
            time::encode(&tab.last_accessed),
            time::encode(&tab.saved_at),
            tab.sort_key,
            tab.group,
            tab.group_type.as_str(),
            json::encode(&tab.custom_groups)?,
            time::encode(&trashed.trashed_at),
            trashed.original_group,
            trashed.original_group_type.as_str(),
            json::encode(&trashed.original_custom_groups)?,
        ],
    )?;
    Ok(())
}

pub fn delete_trashed(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM trash WHERE id = ?1", [id])? > 0)
}

pub fn count(conn: &Connection) -> rusqlite::Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM trash", [], |row| row.get(0))?;
    Ok(n as usize)
}
