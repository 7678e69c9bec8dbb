//! Group Manager
//!
//! Lifecycle of custom groups. Renames and deletes cascade over every tab that
//! displays or holds the group, inside the same transaction as the group write.

use rusqlite::Connection;

use tabstash_storage::{json, time, ChangeEvent, ChangeNotifier, Database};
use tabstash_tabs::{sql as tab_sql, SavedTab};

use crate::error::GroupError;
use crate::group::{CustomGroupMeta, ItemSort};
use crate::sql;
use crate::Result;

pub struct GroupManager {
    db: Database,
    notifier: ChangeNotifier,
}

impl GroupManager {
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }

    /// All groups in display order.
    pub async fn get_all(&self) -> Result<Vec<CustomGroupMeta>> {
        self.db
            .run(|conn| Ok::<_, GroupError>(sql::select_all(conn)?))
            .await
    }

    pub async fn get(&self, name: &str) -> Result<Option<CustomGroupMeta>> {
        let name = name.to_string();
        self.db
            .run(move |conn| Ok::<_, GroupError>(sql::select_group(conn, &name)?))
            .await
    }

    /// Create a group at the end of the display order.
    pub async fn create(&self, name: &str) -> Result<CustomGroupMeta> {
        let name = validate_name(name)?;

        let group = self
            .db
            .run_transaction(move |conn| -> Result<CustomGroupMeta> {
                let group = CustomGroupMeta::new(name.clone(), sql::next_sort_order(conn)?);
                sql::insert_group(conn, &group).map_err(|e| {
                    if sql::is_constraint_violation(&e) {
                        GroupError::AlreadyExists(name.clone())
                    } else {
                        GroupError::from(e)
                    }
                })?;
                Ok(group)
            })
            .await?;

        tracing::info!(group = %group.name, sort_order = group.sort_order, "Created custom group");
        self.notifier.notify(ChangeEvent::CustomGroupsChanged);

        Ok(group)
    }

    /// Rename a group and every reference to it held by tabs.
    pub async fn rename(&self, old_name: &str, new_name: &str) -> Result<CustomGroupMeta> {
        let old = old_name.to_string();
        let new = validate_name(new_name)?;

        let (group, touched) = self
            .db
            .run_transaction(move |conn| -> Result<(CustomGroupMeta, usize)> {
                let existing =
                    sql::select_group(conn, &old)?.ok_or_else(|| GroupError::NotFound(old.clone()))?;
                if old == new {
                    return Ok((existing, 0));
                }
                if sql::group_exists(conn, &new)? {
                    return Err(GroupError::AlreadyExists(new));
                }

                let renamed = existing.renamed(new.clone());
                sql::delete_group(conn, &old)?;
                sql::insert_group(conn, &renamed)?;

                let mut touched = 0;
                for mut tab in tab_sql::select_members(conn, &old)? {
                    if tab.rename_group(&old, &new) {
                        tab_sql::put_tab(conn, &tab)?;
                        touched += 1;
                    }
                }

                Ok((renamed, touched))
            })
            .await?;

        tracing::info!(from = %old_name, to = %group.name, tabs = touched, "Renamed custom group");
        self.notify_groups_changed(touched > 0);

        Ok(group)
    }

    /// Delete a group. Tabs displayed under it fall back to their domain and
    /// lose the membership. Returns how many tabs were reclassified.
    pub async fn delete(&self, name: &str) -> Result<usize> {
        let owned = name.to_string();

        let touched = self
            .db
            .run_transaction(move |conn| -> Result<usize> {
                if !sql::delete_group(conn, &owned)? {
                    return Err(GroupError::NotFound(owned));
                }

                let mut touched = 0;
                for mut tab in tab_sql::select_members(conn, &owned)? {
                    if tab.drop_group(&owned) {
                        tab_sql::put_tab(conn, &tab)?;
                        touched += 1;
                    }
                }

                sql::densify(conn)?;
                Ok(touched)
            })
            .await?;

        tracing::info!(group = %name, tabs = touched, "Deleted custom group");
        self.notify_groups_changed(touched > 0);

        Ok(touched)
    }

    /// Reorder groups to follow `names`. Unknown names are ignored; groups not
    /// listed keep their relative order after the listed ones.
    pub async fn update_order(&self, names: Vec<String>) -> Result<()> {
        self.db
            .run_transaction(move |conn| -> Result<()> {
                let current = sql::select_all(conn)?;

                let mut ordered: Vec<&CustomGroupMeta> = Vec::with_capacity(current.len());
                for name in &names {
                    if let Some(group) = current.iter().find(|g| &g.name == name) {
                        if !ordered.iter().any(|g| g.name == group.name) {
                            ordered.push(group);
                        }
                    }
                }
                for group in &current {
                    if !ordered.iter().any(|g| g.name == group.name) {
                        ordered.push(group);
                    }
                }

                for (index, group) in ordered.iter().enumerate() {
                    let index = index as i64;
                    if group.sort_order != index {
                        sql::set_sort_order(conn, &group.name, index)?;
                    }
                }
                Ok(())
            })
            .await?;

        tracing::debug!("Updated custom group order");
        self.notifier.notify(ChangeEvent::CustomGroupsChanged);
        Ok(())
    }

    pub async fn update_color(&self, name: &str, color: Option<String>) -> Result<()> {
        self.update_preference(name, "color", color).await
    }

    pub async fn update_item_sort(&self, name: &str, item_sort: Option<ItemSort>) -> Result<()> {
        self.update_preference(name, "item_sort", item_sort.map(|s| s.as_str().to_string()))
            .await
    }

    pub async fn update_custom_sort_key_order(
        &self,
        name: &str,
        order: Option<Vec<String>>,
    ) -> Result<()> {
        let encoded = order
            .as_ref()
            .map(json::encode)
            .transpose()
            .map_err(GroupError::from)?;
        self.update_preference(name, "custom_sort_key_order", encoded)
            .await
    }

    async fn update_preference(
        &self,
        name: &str,
        column: &'static str,
        value: Option<String>,
    ) -> Result<()> {
        let owned = name.to_string();
        self.db
            .run(move |conn| -> Result<()> {
                let updated = conn.execute(
                    &format!(
                        "UPDATE custom_groups SET {column} = ?1, updated_at = ?2 WHERE name = ?3"
                    ),
                    rusqlite::params![value, time::encode(&time::now()), owned],
                )?;
                if updated == 0 {
                    return Err(GroupError::NotFound(owned));
                }
                Ok(())
            })
            .await?;

        tracing::debug!(group = %name, column, "Updated custom group preference");
        self.notifier.notify(ChangeEvent::CustomGroupsChanged);
        Ok(())
    }

    /// Display a tab under an existing custom group.
    pub async fn assign_tab_to_group(&self, tab_id: &str, group_name: &str) -> Result<SavedTab> {
        let tab_id = tab_id.to_string();
        let group = group_name.to_string();

        let tab = self
            .db
            .run_transaction(move |conn| -> Result<SavedTab> {
                require_group(conn, &group)?;
                assign(conn, &tab_id, &group)
            })
            .await?;

        tracing::info!(tab_id = %tab.id, group = %group_name, "Assigned tab to group");
        self.notify_groups_changed(true);
        Ok(tab)
    }

    /// Drop one membership, or every membership when `group_name` is `None`.
    pub async fn remove_tab_from_group(
        &self,
        tab_id: &str,
        group_name: Option<&str>,
    ) -> Result<SavedTab> {
        let tab_id = tab_id.to_string();
        let group = group_name.map(str::to_string);

        let tab = self
            .db
            .run_transaction(move |conn| remove(conn, &tab_id, group.as_deref()))
            .await?;

        tracing::info!(tab_id = %tab.id, group = ?group_name, "Removed tab from group");
        self.notify_groups_changed(true);
        Ok(tab)
    }

    /// Assign many tabs in one transaction. Ids with no stored tab are skipped.
    pub async fn assign_tabs_to_group(&self, tab_ids: Vec<String>, group_name: &str) -> Result<usize> {
        let group = group_name.to_string();

        let assigned = self
            .db
            .run_transaction(move |conn| -> Result<usize> {
                require_group(conn, &group)?;
                let mut assigned = 0;
                for id in &tab_ids {
                    match assign(conn, id, &group) {
                        Ok(_) => assigned += 1,
                        Err(GroupError::TabNotFound(_)) => {
                            tracing::warn!(tab_id = %id, "Skipping missing tab");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(assigned)
            })
            .await?;

        tracing::info!(group = %group_name, assigned, "Assigned tabs to group");
        self.notify_groups_changed(assigned > 0);
        Ok(assigned)
    }

    /// Remove many tabs from a group in one transaction. Ids with no stored tab
    /// are skipped.
    pub async fn remove_tabs_from_group(
        &self,
        tab_ids: Vec<String>,
        group_name: Option<&str>,
    ) -> Result<usize> {
        let group = group_name.map(str::to_string);

        let removed = self
            .db
            .run_transaction(move |conn| -> Result<usize> {
                let mut removed = 0;
                for id in &tab_ids {
                    match remove(conn, id, group.as_deref()) {
                        Ok(_) => removed += 1,
                        Err(GroupError::TabNotFound(_)) => {
                            tracing::warn!(tab_id = %id, "Skipping missing tab");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(removed)
            })
            .await?;

        tracing::info!(group = ?group_name, removed, "Removed tabs from group");
        self.notify_groups_changed(removed > 0);
        Ok(removed)
    }

    fn notify_groups_changed(&self, tabs_touched: bool) {
        self.notifier.notify(ChangeEvent::CustomGroupsChanged);
        if tabs_touched {
            self.notifier.notify(ChangeEvent::TabsChanged);
        }
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GroupError::EmptyName);
    }
    Ok(name.to_string())
}

fn require_group(conn: &Connection, name: &str) -> Result<()> {
    if !sql::group_exists(conn, name)? {
        return Err(GroupError::NotFound(name.to_string()));
    }
    Ok(())
}

fn load_tab(conn: &Connection, id: &str) -> Result<SavedTab> {
    tab_sql::select_tab(conn, id)?.ok_or_else(|| GroupError::TabNotFound(id.to_string()))
}

fn assign(conn: &Connection, tab_id: &str, group: &str) -> Result<SavedTab> {
    let mut tab = load_tab(conn, tab_id)?;
    tab.assign_to_group(group);
    tab_sql::put_tab(conn, &tab)?;
    Ok(tab)
}

fn remove(conn: &Connection, tab_id: &str, group: Option<&str>) -> Result<SavedTab> {
    let mut tab = load_tab(conn, tab_id)?;
    tab.remove_from_group(group);
    tab_sql::put_tab(conn, &tab)?;
    Ok(tab)
}
