//! Database migrations
//!
//! Every schema version owns one upgrade step. Opening an older store runs each
//! pending step in ascending order inside a single transaction, so an upgrade
//! either lands completely or leaves the store at its previous version.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StorageError;
use crate::Result;

pub const SCHEMA_VERSION: i32 = 8;

type Step = fn(&Connection) -> rusqlite::Result<()>;

static STEPS: &[(i32, &str, Step)] = &[
    (1, "Tabs collection", migrate_v1),
    (2, "Custom groups and tab classification", migrate_v2),
    (3, "Backups collection", migrate_v3),
    (4, "Multi-valued custom group membership", migrate_v4),
    (5, "Custom group sort order", migrate_v5),
    (6, "Canonical URL", migrate_v6),
    (7, "Trash collection", migrate_v7),
    (8, "Rename fav_icon_url to favicon_url", migrate_v8),
];

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    migrate_to(conn, SCHEMA_VERSION)
}

/// Upgrade the store to `target`, applying only the steps it has not seen yet.
pub(crate) fn migrate_to(conn: &mut Connection, target: i32) -> Result<()> {
    let current_version = schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: current_version,
            supported: SCHEMA_VERSION,
        });
    }

    if current_version >= target {
        return Ok(());
    }

    let tx = conn.transaction()?;
    tx.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    for &(version, description, step) in STEPS {
        if version <= current_version || version > target {
            continue;
        }

        tracing::info!(version, "Running migration v{}: {}", version, description);
        step(&tx).map_err(|source| StorageError::Migration { version, source })?;
    }

    set_schema_version(&tx, target)?;
    tx.commit()?;

    tracing::info!(from = current_version, to = target, "Store schema upgraded");

    Ok(())
}

/// Read the on-disk schema version without writing anything.
pub(crate) fn schema_version(conn: &Connection) -> Result<i32> {
    if !table_exists(conn, "schema_version")? {
        return Ok(0);
    }

    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn table_has_column(
    conn: &Connection,
    table: &str,
    column: &str,
) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    declaration: &str,
) -> rusqlite::Result<()> {
    if !table_has_column(conn, table, column)? {
        conn.execute_batch(&format!(
            "ALTER TABLE {table} ADD COLUMN {column} {declaration};"
        ))?;
    }
    Ok(())
}

fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tabs (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            display_name TEXT,
            domain TEXT NOT NULL DEFAULT '',
            fav_icon_url TEXT NOT NULL DEFAULT '',
            screenshot BLOB,
            last_accessed TEXT NOT NULL,
            saved_at TEXT NOT NULL,
            sort_key TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_tabs_domain ON tabs(domain);
        CREATE INDEX IF NOT EXISTS idx_tabs_saved_at ON tabs(saved_at);
        CREATE INDEX IF NOT EXISTS idx_tabs_url ON tabs(url);
        CREATE INDEX IF NOT EXISTS idx_tabs_title ON tabs(title);
    "#,
    )
}

fn migrate_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS custom_groups (
            name TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            color TEXT
        );
    "#,
    )?;

    add_column_if_missing(conn, "tabs", "group_name", "TEXT")?;
    add_column_if_missing(conn, "tabs", "group_type", "TEXT")?;
    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_tabs_group ON tabs(group_name, group_type);")?;

    let updated = conn.execute(
        "UPDATE tabs
         SET group_name = COALESCE(group_name, domain),
             group_type = COALESCE(group_type,
                                   CASE WHEN group_name IS NULL THEN 'domain' ELSE 'custom' END)
         WHERE group_name IS NULL OR group_type IS NULL",
        [],
    )?;
    tracing::debug!(updated, "Backfilled tab groups from domain");

    Ok(())
}

fn migrate_v3(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS backups (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            tab_count INTEGER NOT NULL DEFAULT 0,
            custom_groups TEXT NOT NULL DEFAULT '[]',
            tabs TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_backups_created_at ON backups(created_at);
    "#,
    )
}

fn migrate_v4(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "tabs", "custom_groups", "TEXT NOT NULL DEFAULT '[]'")?;

    // tab_custom_groups is the multi-entry index over tabs.custom_groups; the
    // triggers keep it in step with every write to the JSON column.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tab_custom_groups (
            tab_id TEXT NOT NULL,
            group_name TEXT NOT NULL,
            PRIMARY KEY (tab_id, group_name)
        );

        CREATE INDEX IF NOT EXISTS idx_tab_custom_groups_name ON tab_custom_groups(group_name);

        CREATE TRIGGER IF NOT EXISTS trg_tabs_custom_groups_insert AFTER INSERT ON tabs
        BEGIN
            INSERT OR IGNORE INTO tab_custom_groups (tab_id, group_name)
            SELECT NEW.id, value FROM json_each(NEW.custom_groups);
        END;

        CREATE TRIGGER IF NOT EXISTS trg_tabs_custom_groups_update AFTER UPDATE OF custom_groups ON tabs
        BEGIN
            DELETE FROM tab_custom_groups WHERE tab_id = OLD.id;
            INSERT OR IGNORE INTO tab_custom_groups (tab_id, group_name)
            SELECT NEW.id, value FROM json_each(NEW.custom_groups);
        END;

        CREATE TRIGGER IF NOT EXISTS trg_tabs_custom_groups_delete AFTER DELETE ON tabs
        BEGIN
            DELETE FROM tab_custom_groups WHERE tab_id = OLD.id;
        END;
    "#,
    )?;

    let updated = conn.execute(
        "UPDATE tabs SET custom_groups = json_array(group_name)
         WHERE group_type = 'custom' AND group_name IS NOT NULL AND custom_groups = '[]'",
        [],
    )?;
    tracing::debug!(updated, "Backfilled custom group membership");

    conn.execute(
        "INSERT OR IGNORE INTO tab_custom_groups (tab_id, group_name)
         SELECT tabs.id, members.value FROM tabs, json_each(tabs.custom_groups) AS members",
        [],
    )?;

    Ok(())
}

fn migrate_v5(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "custom_groups", "sort_order", "INTEGER")?;
    add_column_if_missing(conn, "custom_groups", "item_sort", "TEXT")?;
    add_column_if_missing(conn, "custom_groups", "custom_sort_key_order", "TEXT")?;
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_custom_groups_sort_order ON custom_groups(sort_order);",
    )?;

    // Before v5 groups were listed newest first; keep that order.
    let groups: Vec<(String, Option<i64>)> = {
        let mut stmt = conn.prepare(
            "SELECT name, sort_order FROM custom_groups ORDER BY created_at DESC, name ASC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    for (index, (name, sort_order)) in groups.iter().enumerate() {
        let index = index as i64;
        if *sort_order != Some(index) {
            conn.execute(
                "UPDATE custom_groups SET sort_order = ?1 WHERE name = ?2",
                params![index, name],
            )?;
        }
    }

    Ok(())
}

fn migrate_v6(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "tabs", "canonical_url", "TEXT")?;
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_tabs_canonical_url ON tabs(canonical_url);",
    )?;

    let updated = conn.execute(
        "UPDATE tabs SET canonical_url = url WHERE canonical_url IS NULL OR canonical_url = ''",
        [],
    )?;
    tracing::debug!(updated, "Backfilled canonical URLs");

    Ok(())
}

fn migrate_v7(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS trash (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            canonical_url TEXT,
            title TEXT NOT NULL DEFAULT '',
            display_name TEXT,
            domain TEXT NOT NULL DEFAULT '',
            fav_icon_url TEXT NOT NULL DEFAULT '',
            screenshot BLOB,
            last_accessed TEXT NOT NULL,
            saved_at TEXT NOT NULL,
            sort_key TEXT,
            group_name TEXT,
            group_type TEXT,
            custom_groups TEXT NOT NULL DEFAULT '[]',
            trashed_at TEXT NOT NULL,
            original_group TEXT NOT NULL,
            original_group_type TEXT NOT NULL,
            original_custom_groups TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_trash_trashed_at ON trash(trashed_at);
        CREATE INDEX IF NOT EXISTS idx_trash_domain ON trash(domain);
    "#,
    )
}

fn migrate_v8(conn: &Connection) -> rusqlite::Result<()> {
    for table in ["tabs", "trash"] {
        if table_has_column(conn, table, "fav_icon_url")?
            && !table_has_column(conn, table, "favicon_url")?
        {
            conn.execute_batch(&format!(
                "ALTER TABLE {table} RENAME COLUMN fav_icon_url TO favicon_url;"
            ))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_at(version: i32) -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to(&mut conn, version).unwrap();
        conn
    }

    fn insert_v1_tab(conn: &Connection, id: &str, url: &str, domain: &str) {
        conn.execute(
            "INSERT INTO tabs (id, url, title, domain, fav_icon_url, last_accessed, saved_at)
             VALUES (?1, ?2, 'Title', ?3, 'https://icons.test/f.ico',
                     '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z')",
            params![id, url, domain],
        )
        .unwrap();
    }

    #[test]
    fn test_fresh_store_reaches_current_version() {
        let conn = fresh_at(SCHEMA_VERSION);
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);

        for table in ["tabs", "custom_groups", "backups", "trash", "tab_custom_groups"] {
            assert!(table_exists(&conn, table).unwrap(), "missing table {table}");
        }
        assert!(table_has_column(&conn, "tabs", "favicon_url").unwrap());
        assert!(!table_has_column(&conn, "tabs", "fav_icon_url").unwrap());
        assert!(table_has_column(&conn, "trash", "favicon_url").unwrap());
    }

    #[test]
    fn test_v1_store_upgrades_without_data_loss() {
        let mut conn = fresh_at(1);
        insert_v1_tab(&conn, "tab-1", "https://example.com/a", "example.com");
        insert_v1_tab(&conn, "tab-2", "https://rust-lang.org/", "rust-lang.org");

        migrate_to(&mut conn, SCHEMA_VERSION).unwrap();

        let (group, group_type, canonical, favicon, custom): (String, String, String, String, String) = conn
            .query_row(
                "SELECT group_name, group_type, canonical_url, favicon_url, custom_groups
                 FROM tabs WHERE id = 'tab-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .unwrap();

        assert_eq!(group, "example.com");
        assert_eq!(group_type, "domain");
        assert_eq!(canonical, "https://example.com/a");
        assert_eq!(favicon, "https://icons.test/f.ico");
        assert_eq!(custom, "[]");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tabs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_v4_backfills_legacy_custom_membership() {
        let mut conn = fresh_at(3);
        insert_v1_tab(&conn, "tab-1", "https://example.com/a", "example.com");
        conn.execute(
            "UPDATE tabs SET group_name = 'Work', group_type = 'custom' WHERE id = 'tab-1'",
            [],
        )
        .unwrap();

        migrate_to(&mut conn, 4).unwrap();

        let custom: String = conn
            .query_row("SELECT custom_groups FROM tabs WHERE id = 'tab-1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(custom, r#"["Work"]"#);

        let indexed: String = conn
            .query_row(
                "SELECT tab_id FROM tab_custom_groups WHERE group_name = 'Work'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexed, "tab-1");
    }

    #[test]
    fn test_v5_backfills_dense_sort_order() {
        let mut conn = fresh_at(4);
        for (name, created) in [
            ("Old", "2024-01-01T00:00:00.000Z"),
            ("Newest", "2024-03-01T00:00:00.000Z"),
            ("Middle", "2024-02-01T00:00:00.000Z"),
        ] {
            conn.execute(
                "INSERT INTO custom_groups (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
                params![name, created],
            )
            .unwrap();
        }

        migrate_to(&mut conn, 5).unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM custom_groups ORDER BY sort_order ASC")
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(names, vec!["Newest", "Middle", "Old"]);
    }

    #[test]
    fn test_membership_index_follows_writes() {
        let conn = fresh_at(SCHEMA_VERSION);
        conn.execute(
            "INSERT INTO tabs (id, url, canonical_url, domain, last_accessed, saved_at,
                               group_name, group_type, custom_groups)
             VALUES ('t', 'https://a.test', 'https://a.test', 'a.test',
                     '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z',
                     'A', 'custom', '[\"A\",\"B\"]')",
            [],
        )
        .unwrap();

        let members = |conn: &Connection| -> i64 {
            conn.query_row("SELECT COUNT(*) FROM tab_custom_groups", [], |row| row.get(0))
                .unwrap()
        };
        assert_eq!(members(&conn), 2);

        conn.execute("UPDATE tabs SET custom_groups = '[\"B\"]' WHERE id = 't'", [])
            .unwrap();
        assert_eq!(members(&conn), 1);

        conn.execute("DELETE FROM tabs WHERE id = 't'", []).unwrap();
        assert_eq!(members(&conn), 0);
    }

    #[test]
    fn test_current_store_is_left_untouched() {
        let mut conn = fresh_at(SCHEMA_VERSION);
        let total_changes = |conn: &Connection| -> i64 {
            conn.query_row("SELECT total_changes()", [], |row| row.get(0))
                .unwrap()
        };
        let before = total_changes(&conn);

        migrate_to(&mut conn, SCHEMA_VERSION).unwrap();

        assert_eq!(total_changes(&conn), before);
    }

    #[test]
    fn test_newer_store_is_rejected() {
        let mut conn = fresh_at(SCHEMA_VERSION);
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();

        let err = migrate_to(&mut conn, SCHEMA_VERSION).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_failed_step_rolls_back_whole_upgrade() {
        let mut conn = fresh_at(6);
        // A conflicting object makes step 7 fail after nothing else has changed.
        conn.execute_batch("CREATE VIEW trash AS SELECT 1;").unwrap();

        let err = migrate_to(&mut conn, SCHEMA_VERSION).unwrap_err();
        assert!(matches!(err, StorageError::Migration { version: 7, .. }));
        assert_eq!(schema_version(&conn).unwrap(), 6);
        assert!(table_has_column(&conn, "tabs", "fav_icon_url").unwrap());
    }
}
