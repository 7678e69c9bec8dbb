//! Row-level access to the `tabs` table.
//!
//! These helpers run on a caller-provided connection so other repositories can
//! read and write tabs inside their own transactions.

use rusqlite::{params, Connection, OptionalExtension, Row};

use tabstash_storage::{json, time};

use crate::tab::{GroupType, SavedTab};

/// Column list shared by every table that stores tab-shaped rows.
pub const TAB_COLUMNS: &str = "id, url, canonical_url, title, display_name, domain, favicon_url, \
                               screenshot, last_accessed, saved_at, sort_key, group_name, \
                               group_type, custom_groups";

/// Number of columns in [`TAB_COLUMNS`].
pub const TAB_COLUMN_COUNT: usize = 14;

/// Read a tab from `row`, starting at column `offset`.
pub fn tab_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<SavedTab> {
    let url: String = row.get(offset + 1)?;
    let domain: String = row.get(offset + 5)?;
    let canonical_url: Option<String> = row.get(offset + 2)?;
    let screenshot: Option<Vec<u8>> = row.get(offset + 7)?;
    let group: Option<String> = row.get(offset + 11)?;
    let group_type = group_type_column(row, offset + 12)?;

    Ok(SavedTab {
        id: row.get(offset)?,
        canonical_url: canonical_url
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| url.clone()),
        url,
        title: row.get(offset + 3)?,
        display_name: row.get(offset + 4)?,
        group: group.unwrap_or_else(|| domain.clone()),
        domain,
        favicon_url: row.get(offset + 6)?,
        screenshot: screenshot.unwrap_or_default(),
        last_accessed: time::column(row, offset + 8)?,
        saved_at: time::column(row, offset + 9)?,
        sort_key: row.get(offset + 10)?,
        group_type,
        custom_groups: json::column(row, offset + 13)?,
    })
}

pub fn group_type_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<GroupType> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(GroupType::Domain),
        Some(raw) => raw.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                e.into(),
            )
        }),
    }
}

fn query_tabs<P: rusqlite::Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> rusqlite::Result<Vec<SavedTab>> {
    let mut stmt = conn.prepare(&format!("SELECT {TAB_COLUMNS} FROM tabs {clause}"))?;
    let tabs = stmt
        .query_map(params, |row| tab_from_row(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tabs)
}

pub fn select_tab(conn: &Connection, id: &str) -> rusqlite::Result<Option<SavedTab>> {
    conn.query_row(
        &format!("SELECT {TAB_COLUMNS} FROM tabs WHERE id = ?1"),
        [id],
        |row| tab_from_row(row, 0),
    )
    .optional()
}

pub fn select_by_url(conn: &Connection, url: &str) -> rusqlite::Result<Option<SavedTab>> {
    Ok(query_tabs(conn, "WHERE url = ?1 ORDER BY saved_at DESC LIMIT 1", [url])?
        .into_iter()
        .next())
}

pub fn select_by_canonical_url(
    conn: &Connection,
    canonical_url: &str,
) -> rusqlite::Result<Option<SavedTab>> {
    Ok(query_tabs(
        conn,
        "WHERE canonical_url = ?1 ORDER BY saved_at DESC LIMIT 1",
        [canonical_url],
    )?
    .into_iter()
    .next())
}

/// Every tab, most recently saved first.
pub fn select_all(conn: &Connection) -> rusqlite::Result<Vec<SavedTab>> {
    query_tabs(conn, "ORDER BY saved_at DESC, rowid DESC", [])
}

/// Tabs shown under `name` or holding it as a custom membership.
pub fn select_members(conn: &Connection, name: &str) -> rusqlite::Result<Vec<SavedTab>> {
    query_tabs(
        conn,
        "WHERE group_name = ?1
            OR id IN (SELECT tab_id FROM tab_custom_groups WHERE group_name = ?1)
         ORDER BY saved_at DESC, rowid DESC",
        [name],
    )
}

const IN_GROUP: &str = "(group_type = 'custom'
        AND (group_name = ?1
             OR id IN (SELECT tab_id FROM tab_custom_groups WHERE group_name = ?1)))
    OR (COALESCE(group_type, 'domain') = 'domain'
        AND (group_name = ?1 OR domain = ?1))";

/// Tabs a caller means by `name`, whether it passed a custom group, a display
/// group or a raw domain.
pub fn select_in_group(conn: &Connection, name: &str) -> rusqlite::Result<Vec<SavedTab>> {
    query_tabs(
        conn,
        &format!("WHERE {IN_GROUP} ORDER BY saved_at DESC, rowid DESC"),
        [name],
    )
}

/// Delete the tabs [`select_in_group`] would return.
pub fn delete_in_group(conn: &Connection, name: &str) -> rusqlite::Result<usize> {
    conn.execute(&format!("DELETE FROM tabs WHERE {IN_GROUP}"), [name])
}

/// Insert or overwrite the tab stored under `tab.id`.
pub fn put_tab(conn: &Connection, tab: &SavedTab) -> rusqlite::Result<()> {
    let screenshot = (!tab.screenshot.is_empty()).then_some(&tab.screenshot);

    conn.execute(
        &format!(
            "INSERT INTO tabs ({TAB_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                canonical_url = excluded.canonical_url,
                title = excluded.title,
                display_name = excluded.display_name,
                domain = excluded.domain,
                favicon_url = excluded.favicon_url,
                screenshot = excluded.screenshot,
                last_accessed = excluded.last_accessed,
                saved_at = excluded.saved_at,
                sort_key = excluded.sort_key,
                group_name = excluded.group_name,
                group_type = excluded.group_type,
                custom_groups = excluded.custom_groups"
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
        ],
    )?;
    Ok(())
}

pub fn delete_tab(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM tabs WHERE id = ?1", [id])? > 0)
}

pub fn count_tabs(conn: &Connection) -> rusqlite::Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM tabs", [], |row| row.get(0))?;
    Ok(n as usize)
}
