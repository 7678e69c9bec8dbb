//! Periodic maintenance
//!
//! One pass purges expired trash, takes a backup and prunes old backup
//! generations. Each pass is bounded by the configured timeout.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::CoreError;
use crate::stash::Stash;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub expired_trash: usize,
    pub backup_id: String,
    pub pruned_backups: usize,
}

/// Run one maintenance pass under the configured timeout.
pub async fn run_once(stash: &Stash) -> Result<MaintenanceReport> {
    let timeout_secs = stash.config().maintenance_timeout_secs;

    tokio::time::timeout(Duration::from_secs(timeout_secs), pass(stash))
        .await
        .map_err(|_| CoreError::MaintenanceTimeout(timeout_secs))?
}

async fn pass(stash: &Stash) -> Result<MaintenanceReport> {
    let config = stash.config();

    let expired_trash = stash
        .trash()
        .delete_expired(config.trash_retention_days)
        .await?;
    let backup = stash.backups().create().await?;
    let pruned_backups = stash.backups().prune(config.backup_keep_count).await?;

    Ok(MaintenanceReport {
        expired_trash,
        backup_id: backup.id,
        pruned_backups,
    })
}

/// Run maintenance every `backup_interval_hours` until `shutdown` changes.
/// The first pass runs immediately.
pub async fn run_periodic(stash: Arc<Stash>, mut shutdown: watch::Receiver<bool>) {
    let hours = stash.config().backup_interval_hours.max(1);
    let mut interval = tokio::time::interval(Duration::from_secs(hours * 3600));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match run_once(&stash).await {
                    Ok(report) => {
                        tracing::info!(
                            expired_trash = report.expired_trash,
                            backup_id = %report.backup_id,
                            pruned_backups = report.pruned_backups,
                            "Maintenance pass complete"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Maintenance pass failed");
                    }
                }
            }
            _ = shutdown.changed() => {
                tracing::info!("Maintenance shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tabstash_tabs::SavedTab;

    fn stash(keep: i64) -> Stash {
        let mut config = Config::new("unused".into());
        config.backup_keep_count = keep;
        Stash::in_memory(config).unwrap()
    }

    #[tokio::test]
    async fn test_run_once_backs_up_and_prunes() {
        let stash = stash(2);
        stash
            .stash_tabs(vec![SavedTab::new("https://example.com/", "E").unwrap()])
            .await
            .unwrap();

        for _ in 0..3 {
            run_once(&stash).await.unwrap();
        }

        let backups = stash.backups().list().await.unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].tab_count, 1);
    }

    #[tokio::test]
    async fn test_run_periodic_stops_on_shutdown() {
        let stash = Arc::new(stash(-1));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_periodic(Arc::clone(&stash), rx));

        // The first tick fires immediately.
        for _ in 0..100 {
            if !stash.backups().list().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stash.backups().list().await.unwrap().len(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
