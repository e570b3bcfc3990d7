use std::io;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::wal::{Record, Wal};

use super::{Storage, StorageError};

// ── Group-commit log channel ─────────────────────────────

enum WalCommand {
    Append {
        record: Record,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        records: Vec<Record>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the log and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends.
/// 4. One flush_sync for the whole batch.
/// 5. Respond to every sender with the batch result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { record, response } => {
                let mut batch = vec![(record, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { record, response }) => batch.push((record, response)),
                        Ok(other) => {
                            // Flush what we have first, then handle the non-append command
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
    tracing::debug!("log writer for {} stopped", wal.path().display());
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Record, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::STORE_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::STORE_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("log flush of {} records failed: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Record, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (record, _) in batch {
        if let Err(e) = wal.append_buffered(record) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even after an append error, so partially buffered bytes
    // don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { records, response } => {
            let result = Wal::write_compact_file(wal.path(), &records).and_then(|()| wal.swap_compact_file());
            match &result {
                Ok(()) => tracing::info!("compacted {} to {} records", wal.path().display(), records.len()),
                Err(e) => tracing::error!("compaction of {} failed: {e}", wal.path().display()),
            }
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// File-backed storage: every value lives in memory and every write is
/// appended to a checksummed log that is replayed on open.
///
/// Must be opened inside a tokio runtime; the log writer runs as a task.
///
/// A write is visible to `get` as soon as it is queued, before its fsync. If
/// the fsync then fails the write is rolled back, so a reader in that window
/// may have seen a value that never became durable.
pub struct DurableStore {
    entries: DashMap<String, String>,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Keeps map updates and log submissions in the same order.
    write_order: Mutex<()>,
}

impl DurableStore {
    pub fn open(path: &Path) -> io::Result<Self> {
        let records = Wal::replay(path)?;
        let entries = DashMap::new();
        for record in &records {
            match record {
                Record::Set { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                Record::Removed { key } => {
                    entries.remove(key);
                }
            }
        }
        tracing::info!(
            "opened {} ({} records replayed, {} keys live)",
            path.display(),
            records.len(),
            entries.len()
        );

        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            entries,
            wal_tx,
            write_order: Mutex::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn submit(&self, record: Record) -> Result<oneshot::Receiver<io::Result<()>>, StorageError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { record, response: tx })
            .await
            .map_err(|_| StorageError::WriterClosed("log writer shut down"))?;
        Ok(rx)
    }

    async fn await_commit(rx: oneshot::Receiver<io::Result<()>>) -> Result<(), StorageError> {
        rx.await
            .map_err(|_| StorageError::WriterClosed("log writer dropped response"))??;
        Ok(())
    }

    /// Rewrite the log as one `Set` per live key.
    pub async fn compact(&self) -> Result<(), StorageError> {
        let (tx, rx) = oneshot::channel();
        {
            let _order = self.write_order.lock().await;
            let records: Vec<Record> = self
                .entries
                .iter()
                .map(|e| Record::Set {
                    key: e.key().clone(),
                    value: e.value().clone(),
                })
                .collect();
            self.wal_tx
                .send(WalCommand::Compact { records, response: tx })
                .await
                .map_err(|_| StorageError::WriterClosed("log writer shut down"))?;
        }
        Self::await_commit(rx).await
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl Storage for DurableStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        // The map is updated before the log so a concurrent compaction snapshot
        // never misses a write that is already queued behind it.
        let (previous, rx) = {
            let _order = self.write_order.lock().await;
            let previous = self.entries.insert(key.to_string(), value.clone());
            let record = Record::Set {
                key: key.to_string(),
                value: value.clone(),
            };
            match self.submit(record).await {
                Ok(rx) => (previous, rx),
                Err(e) => {
                    restore(&self.entries, key, Some(value.as_str()), previous);
                    return Err(e);
                }
            }
        };
        if let Err(e) = Self::await_commit(rx).await {
            let _order = self.write_order.lock().await;
            restore(&self.entries, key, Some(value.as_str()), previous);
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let (previous, rx) = {
            let _order = self.write_order.lock().await;
            let previous = self.entries.remove(key).map(|(_, v)| v);
            match self.submit(Record::Removed { key: key.to_string() }).await {
                Ok(rx) => (previous, rx),
                Err(e) => {
                    restore(&self.entries, key, None, previous);
                    return Err(e);
                }
            }
        };
        if let Err(e) = Self::await_commit(rx).await {
            let _order = self.write_order.lock().await;
            restore(&self.entries, key, None, previous);
            return Err(e);
        }
        Ok(())
    }
}

/// Undo a failed write: put `previous` back, but only while the key still
/// holds what this write left there (`written`, `None` for a removal). A later
/// write to the same key owns it from then on. Call under `write_order`.
fn restore(entries: &DashMap<String, String>, key: &str, written: Option<&str>, previous: Option<String>) {
    let current = entries.get(key).map(|e| e.value().clone());
    if current.as_deref() != written {
        return;
    }
    match previous {
        Some(v) => {
            entries.insert(key.to_string(), v);
        }
        None => {
            entries.remove(key);
        }
    }
}
