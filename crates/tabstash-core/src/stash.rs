//! Stash state container
//!
//! Wires every repository to one store handle and one change notifier.

use parking_lot::RwLock;
use tokio::sync::broadcast;

use tabstash_backup::BackupManager;
use tabstash_groups::GroupManager;
use tabstash_storage::{ChangeEvent, ChangeNotifier, Database, StoreManager};
use tabstash_tabs::{normalize_url, NormalizationReport, SavedTab, TabManager};
use tabstash_trash::TrashManager;

use crate::config::Config;
use crate::Result;

pub struct Stash {
    config: RwLock<Config>,
    store: StoreManager,
    db: Database,
    notifier: ChangeNotifier,
    tabs: TabManager,
    groups: GroupManager,
    trash: TrashManager,
    backups: BackupManager,
}

impl Stash {
    /// Open (and upgrade if needed) the store named by `config`.
    pub fn open(config: Config) -> Result<Self> {
        let store = StoreManager::new(&config.database_path);
        Self::with_store(config, store)
    }

    /// A stash backed by a private in-memory store.
    pub fn in_memory(config: Config) -> Result<Self> {
        Self::with_store(config, StoreManager::in_memory())
    }

    fn with_store(config: Config, store: StoreManager) -> Result<Self> {
        let db = store.open()?;
        let notifier = ChangeNotifier::new();
        let schema_version = db.schema_version()?;

        tracing::info!(
            database = %config.database_path.display(),
            schema_version,
            "Stash opened"
        );

        Ok(Self {
            config: RwLock::new(config),
            tabs: TabManager::new(db.clone(), notifier.clone()),
            groups: GroupManager::new(db.clone(), notifier.clone()),
            trash: TrashManager::new(db.clone(), notifier.clone()),
            backups: BackupManager::new(db.clone(), notifier.clone()),
            store,
            db,
            notifier,
        })
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn trash(&self) -> &TrashManager {
        &self.trash
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn store(&self) -> &StoreManager {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn update_config(&self, config: Config) {
        *self.config.write() = config;
        tracing::info!("Configuration updated");
        self.notifier.notify(ChangeEvent::SettingsChanged);
    }

    /// Save tabs after deriving each canonical URL from the configured rules.
    pub async fn stash_tabs(&self, tabs: Vec<SavedTab>) -> Result<Vec<SavedTab>> {
        let rules = self.config.read().normalization_rules.clone();
        let tabs = tabs
            .into_iter()
            .map(|tab| {
                let canonical = normalize_url(&tab.url, &rules);
                tab.with_canonical_url(canonical)
            })
            .collect();

        Ok(self.tabs.save(tabs).await?)
    }

    /// Move tabs to the trash under the configured retention window.
    pub async fn discard_tabs(&self, ids: Vec<String>) -> Result<usize> {
        let retention_days = self.config.read().trash_retention_days;
        Ok(self.trash.move_many_to_trash(ids, retention_days).await?)
    }

    /// Re-derive every stored canonical URL from the configured rules.
    pub async fn renormalize(&self) -> Result<NormalizationReport> {
        let rules = self.config.read().normalization_rules.clone();
        Ok(self.tabs.apply_normalization_to_existing(rules).await?)
    }
}
