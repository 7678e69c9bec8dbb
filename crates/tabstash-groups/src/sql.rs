//! Row-level access to the `custom_groups` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use tabstash_storage::{json, time};

use crate::group::{CustomGroupMeta, ItemSort};

const GROUP_COLUMNS: &str =
    "name, created_at, updated_at, sort_order, color, item_sort, custom_sort_key_order";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<CustomGroupMeta> {
    let item_sort: Option<String> = row.get(5)?;
    let sort_order: Option<i64> = row.get(3)?;

    Ok(CustomGroupMeta {
        name: row.get(0)?,
        created_at: time::column(row, 1)?,
        updated_at: time::column(row, 2)?,
        sort_order: sort_order.unwrap_or_default(),
        color: row.get(4)?,
        // Unknown values written by a newer build are ignored rather than fatal.
        item_sort: item_sort.and_then(|s| s.parse::<ItemSort>().ok()),
        custom_sort_key_order: json::column_opt(row, 6)?,
    })
}

/// Whether the store has reached the schema that orders groups explicitly.
pub fn has_sort_order_index(conn: &Connection) -> rusqlite::Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master
             WHERE type = 'index' AND name = 'idx_custom_groups_sort_order'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Every group in display order.
pub fn select_all(conn: &Connection) -> rusqlite::Result<Vec<CustomGroupMeta>> {
    if !has_sort_order_index(conn)? {
        return select_all_legacy(conn);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {GROUP_COLUMNS} FROM custom_groups ORDER BY sort_order ASC, created_at DESC"
    ))?;
    let groups = stmt
        .query_map([], group_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

// Stores older than the sort-order column list groups newest first.
fn select_all_legacy(conn: &Connection) -> rusqlite::Result<Vec<CustomGroupMeta>> {
    let mut stmt = conn.prepare(
        "SELECT name, created_at, updated_at, color FROM custom_groups
         ORDER BY created_at DESC, name ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            time::column(row, 1)?,
            time::column(row, 2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    rows.enumerate()
        .map(|(index, row)| -> rusqlite::Result<CustomGroupMeta> {
            let (name, created_at, updated_at, color) = row?;
            Ok(CustomGroupMeta {
                name,
                created_at,
                updated_at,
                sort_order: index as i64,
                color,
                item_sort: None,
                custom_sort_key_order: None,
            })
        })
        .collect()
}

pub fn select_group(conn: &Connection, name: &str) -> rusqlite::Result<Option<CustomGroupMeta>> {
    conn.query_row(
        &format!("SELECT {GROUP_COLUMNS} FROM custom_groups WHERE name = ?1"),
        [name],
        group_from_row,
    )
    .optional()
}

pub fn group_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM custom_groups WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Position after the last group, or 0 for an empty table.
pub fn next_sort_order(conn: &Connection) -> rusqlite::Result<i64> {
    let max: Option<i64> =
        conn.query_row("SELECT MAX(sort_order) FROM custom_groups", [], |row| {
            row.get(0)
        })?;
    Ok(max.map_or(0, |m| m + 1))
}

/// Insert a new group. Fails with a constraint violation if the name is taken.
pub fn insert_group(conn: &Connection, group: &CustomGroupMeta) -> rusqlite::Result<()> {
    let custom_sort_key_order = group
        .custom_sort_key_order
        .as_ref()
        .map(json::encode)
        .transpose()?;

    conn.execute(
        &format!(
            "INSERT INTO custom_groups ({GROUP_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            group.name,
            time::encode(&group.created_at),
            time::encode(&group.updated_at),
            group.sort_order,
            group.color,
            group.item_sort.map(|s| s.as_str()),
            custom_sort_key_order,
        ],
    )?;
    Ok(())
}

pub fn delete_group(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM custom_groups WHERE name = ?1", [name])? > 0)
}

pub fn set_sort_order(conn: &Connection, name: &str, sort_order: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE custom_groups SET sort_order = ?1 WHERE name = ?2",
        params![sort_order, name],
    )?;
    Ok(())
}

/// Renumber groups 0..n in their current order, touching only rows that move.
pub fn densify(conn: &Connection) -> rusqlite::Result<()> {
    for (index, group) in select_all(conn)?.iter().enumerate() {
        let index = index as i64;
        if group.sort_order != index {
            set_sort_order(conn, &group.name, index)?;
        }
    }
    Ok(())
}

/// Create each named group that does not exist yet, appended to the sort order.
/// Returns the names created.
pub fn ensure_groups<'a, I>(conn: &Connection, names: I) -> rusqlite::Result<Vec<String>>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut created = Vec::new();
    for name in names {
        if name.is_empty() || group_exists(conn, name)? {
            continue;
        }
        insert_group(conn, &CustomGroupMeta::new(name.clone(), next_sort_order(conn)?))?;
        created.push(name.clone());
    }
    Ok(created)
}

pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
