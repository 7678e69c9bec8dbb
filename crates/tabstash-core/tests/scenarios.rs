//! Cross-component behavior of a stash backed by one store.

use std::path::Path;

use tabstash_core::{
    Config, GroupType, RestoreMode, RestoreOutcome, SavedTab, Stash, StorageError, StoreManager,
    SCHEMA_VERSION,
};

fn stash() -> Stash {
    Stash::in_memory(Config::new("unused".into())).unwrap()
}

fn tab(url: &str) -> SavedTab {
    SavedTab::new(url, "Title").unwrap()
}

#[tokio::test]
async fn repeated_saves_keep_one_record_per_canonical_url() {
    let stash = stash();

    let mut first = tab("https://example.com/a?ref=1").with_canonical_url("https://example.com/a");
    first.display_name = Some("Keep me".to_string());
    let first = first.in_custom_group("Work");
    stash.tabs().save(vec![first.clone()]).await.unwrap();

    for (i, url) in ["https://example.com/a?ref=2", "https://example.com/a?ref=3"]
        .iter()
        .enumerate()
    {
        let mut next = tab(url).with_canonical_url("https://example.com/a");
        next.title = format!("Title {i}");
        stash.tabs().save(vec![next]).await.unwrap();
    }

    let all = stash.tabs().get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    let stored = &all[0];
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.url, "https://example.com/a?ref=3");
    assert_eq!(stored.title, "Title 1");
    assert_eq!(stored.display_name.as_deref(), Some("Keep me"));
    assert_eq!(stored.group, "Work");
    assert_eq!(stored.group_type, GroupType::Custom);
    assert_eq!(stored.custom_groups, vec!["Work"]);
}

#[tokio::test]
async fn custom_group_saves_accumulate_memberships() {
    let stash = stash();
    stash
        .tabs()
        .save_for_custom_group(vec![tab("https://example.com/a").in_custom_group("A")])
        .await
        .unwrap();
    stash
        .tabs()
        .save_for_custom_group(vec![tab("https://example.com/a").in_custom_group("B")])
        .await
        .unwrap();

    let stored = stash
        .tabs()
        .find_by_canonical_url("https://example.com/a")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.custom_groups.contains(&"A".to_string()));
    assert!(stored.custom_groups.contains(&"B".to_string()));
}

fn write_v1_store(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE tabs (
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
        CREATE TABLE schema_version (version INTEGER NOT NULL);
        INSERT INTO schema_version (version) VALUES (1);
        INSERT INTO tabs (id, url, title, domain, fav_icon_url, last_accessed, saved_at)
        VALUES ('t1', 'https://example.com/a', 'A', 'example.com', 'https://example.com/f.ico',
                '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z');
        INSERT INTO tabs (id, url, title, domain, last_accessed, saved_at)
        VALUES ('t2', 'https://rust-lang.org/', 'Rust', 'rust-lang.org',
                '2024-02-01T00:00:00.000Z', '2024-02-01T00:00:00.000Z');
        "#,
    )
    .unwrap();
}

fn dump(manager: &StoreManager) -> Vec<String> {
    let db = manager.open().unwrap();
    db.with_connection(|conn| {
        let mut out = Vec::new();

        let mut stmt = conn.prepare(
            "SELECT type || ':' || name || ':' || COALESCE(sql, '')
             FROM sqlite_master ORDER BY type, name",
        )?;
        let schema = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.extend(schema);

        let mut stmt = conn.prepare(
            "SELECT id || '|' || url || '|' || canonical_url || '|' || group_name || '|'
                    || group_type || '|' || favicon_url || '|' || custom_groups
             FROM tabs ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.extend(rows);

        Ok::<_, StorageError>(out)
    })
    .unwrap()
}

#[tokio::test]
async fn upgrading_twice_matches_upgrading_once() {
    let dir = tempfile::tempdir().unwrap();
    let once_path = dir.path().join("once.db");
    let twice_path = dir.path().join("twice.db");
    write_v1_store(&once_path);
    write_v1_store(&twice_path);

    let once = StoreManager::new(&once_path);
    let once_dump = dump(&once);

    let twice = StoreManager::new(&twice_path);
    twice.open().unwrap();
    twice.reset();
    let twice_dump = dump(&twice);

    assert_eq!(once_dump, twice_dump);
    assert!(once_dump
        .iter()
        .any(|line| line == "t1|https://example.com/a|https://example.com/a|example.com|domain|https://example.com/f.ico|[]"));
    assert_eq!(once.open().unwrap().schema_version().unwrap(), SCHEMA_VERSION);

    // The upgraded store is usable through the repositories.
    let mut config = Config::new(dir.path().to_path_buf());
    config.database_path = once_path.clone();
    drop(once);
    let stash = Stash::open(config).unwrap();
    assert_eq!(stash.tabs().count().await.unwrap(), 2);
    let rust = stash.tabs().find_by_url("https://rust-lang.org/").await.unwrap().unwrap();
    assert_eq!(rust.group, "rust-lang.org");
}

#[tokio::test]
async fn deleting_a_group_leaves_no_references() {
    let stash = stash();
    stash.groups().create("G").await.unwrap();
    stash.groups().create("H").await.unwrap();

    let mut shown = tab("https://a.test/").in_custom_group("G");
    shown.custom_groups.push("H".to_string());
    let mut member = tab("https://b.test/").in_custom_group("H");
    member.custom_groups.push("G".to_string());
    let untouched = tab("https://c.test/");
    stash
        .tabs()
        .save(vec![shown, member, untouched])
        .await
        .unwrap();

    stash.groups().delete("G").await.unwrap();

    for tab in stash.tabs().get_all().await.unwrap() {
        assert!(!tab.custom_groups.contains(&"G".to_string()), "{} kept G", tab.url);
        assert_ne!(tab.group, "G");
    }
}

#[tokio::test]
async fn trash_round_trip_survives_group_rename() {
    let stash = stash();
    stash.groups().create("Work").await.unwrap();
    let mut original = tab("https://example.com/doc").in_custom_group("Work");
    original.custom_groups.push("Reading".to_string());
    let saved = stash.tabs().save(vec![original]).await.unwrap().remove(0);

    stash.trash().move_to_trash(&saved.id, 30).await.unwrap();
    stash.groups().rename("Work", "Projects").await.unwrap();
    let restored = stash.trash().restore(&saved.id).await.unwrap();

    assert_eq!(restored.group, saved.group);
    assert_eq!(restored.group_type, saved.group_type);
    assert_eq!(restored.custom_groups, saved.custom_groups);
}

#[tokio::test]
async fn backup_restore_reports_counts() {
    let stash = stash();
    let urls: Vec<String> = (0..5).map(|i| format!("https://example.com/{i}")).collect();
    stash
        .tabs()
        .save(urls.iter().map(|u| tab(u)).collect())
        .await
        .unwrap();
    let backup = stash.backups().create().await.unwrap();

    // Keep K = 2 of the N = 5 snapshot URLs live.
    stash.tabs().delete_all().await.unwrap();
    stash
        .tabs()
        .save(vec![tab(&urls[1]), tab(&urls[3]), tab("https://other.test/")])
        .await
        .unwrap();

    let merged = stash
        .backups()
        .restore(&backup.id, RestoreMode::Merge)
        .await
        .unwrap();
    assert_eq!(merged, RestoreOutcome { restored: 3, skipped: 2 });

    let overwritten = stash
        .backups()
        .restore(&backup.id, RestoreMode::Overwrite)
        .await
        .unwrap();
    assert_eq!(overwritten, RestoreOutcome { restored: 5, skipped: 0 });
    assert_eq!(stash.tabs().count().await.unwrap(), 5);
}

#[tokio::test]
async fn renaming_a_group_updates_tabs_and_order() {
    let stash = stash();
    assert_eq!(stash.groups().create("Work").await.unwrap().sort_order, 0);
    assert_eq!(stash.groups().create("Reading").await.unwrap().sort_order, 1);

    let mut doc = tab("https://example.com/doc");
    doc.group = "Work".to_string();
    doc.group_type = GroupType::Custom;
    doc.custom_groups = vec!["Work".to_string()];
    let saved = stash.tabs().save(vec![doc]).await.unwrap().remove(0);

    stash.groups().rename("Work", "Projects").await.unwrap();

    let stored = stash.tabs().get(&saved.id).await.unwrap().unwrap();
    assert_eq!(stored.group, "Projects");
    assert_eq!(stored.custom_groups, vec!["Projects"]);

    let names: Vec<String> = stash
        .groups()
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["Projects", "Reading"]);
}

#[tokio::test]
async fn deleting_a_domain_group_removes_its_tabs() {
    let stash = stash();
    stash
        .tabs()
        .save(vec![
            tab("https://example.com/1"),
            tab("https://example.com/2"),
            tab("https://example.com/3"),
        ])
        .await
        .unwrap();

    assert_eq!(stash.tabs().delete_by_group("example.com").await.unwrap(), 3);
    assert_eq!(stash.tabs().count().await.unwrap(), 0);
}

#[tokio::test]
async fn pruning_keeps_the_newest_generations() {
    let stash = stash();
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(stash.backups().create().await.unwrap().id);
    }

    assert_eq!(stash.backups().prune(2).await.unwrap(), 3);

    let kept: Vec<String> = stash
        .backups()
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(kept, vec![ids[4].clone(), ids[3].clone()]);
}

#[tokio::test]
async fn mutations_succeed_without_listeners() {
    let stash = stash();
    let saved = stash.tabs().save(vec![tab("https://example.com/")]).await.unwrap();
    stash.groups().create("Solo").await.unwrap();
    stash.trash().move_to_trash(&saved[0].id, 1).await.unwrap();
    stash.trash().empty().await.unwrap();
}
