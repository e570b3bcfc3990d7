use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::notify::NotifyHub;
use crate::observability::STORE_COMPACTIONS_TOTAL;
use crate::store::DurableStore;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that compacts the store log once `threshold` appends
/// have accumulated since the last compaction, and drops notification
/// channels nobody listens to any more.
pub async fn run_compactor(store: Arc<DurableStore>, notify: Arc<NotifyHub>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        maintain(&store, &notify, threshold).await;
    }
}

/// One maintenance pass. Returns true if a compaction ran and succeeded.
pub async fn maintain(store: &DurableStore, notify: &NotifyHub, threshold: u64) -> bool {
    let before = notify.channel_count();
    notify.prune();
    let pruned = before.saturating_sub(notify.channel_count());
    if pruned > 0 {
        debug!("pruned {pruned} idle notification channels");
    }
    compact_if_due(store, threshold).await
}

/// Returns true if a compaction ran and succeeded.
pub async fn compact_if_due(store: &DurableStore, threshold: u64) -> bool {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact().await {
        Ok(()) => {
            metrics::counter!(STORE_COMPACTIONS_TOTAL).increment(1);
            info!("compacted store log after {appends} appends ({} keys live)", store.len());
            true
        }
        Err(e) => {
            error!("store compaction failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use super::*;
    use crate::store::Storage;

    fn test_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("dentefeliz_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_path("threshold.wal");
        let store = DurableStore::open(&path).unwrap();

        for i in 0..5 {
            store.set("darkMode", (i % 2 == 0).to_string()).await.unwrap();
        }
        assert!(!compact_if_due(&store, 10).await);
        assert_eq!(store.appends_since_compact().await, 5);

        assert!(compact_if_due(&store, 5).await);
        assert_eq!(store.appends_since_compact().await, 0);
        assert_eq!(store.get("darkMode").await.unwrap().as_deref(), Some("true"));

        drop(store);
        let reopened = DurableStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("darkMode").await.unwrap().as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn maintenance_prunes_idle_channels() {
        let path = test_path("prune.wal");
        let store = DurableStore::open(&path).unwrap();
        let notify = NotifyHub::new();

        let monday = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let listening = notify.subscribe(monday);
        drop(notify.subscribe(monday.succ_opt().unwrap()));
        assert_eq!(notify.channel_count(), 2);

        assert!(!maintain(&store, &notify, 1000).await);
        assert_eq!(notify.channel_count(), 1);
        drop(listening);
        maintain(&store, &notify, 1000).await;
        assert_eq!(notify.channel_count(), 0);
    }
}
