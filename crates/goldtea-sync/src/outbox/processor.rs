//! # Outbox Processor
//!
//! Replays queued writes against the store until they land.
//!
//! ## Processing Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌──────────┐   offline    ┌─────────────────────────────┐            │
//! │   │  wake    │─────────────►│ skip, wait poll interval    │            │
//! │   └────┬─────┘              └─────────────────────────────┘            │
//! │        │ online                                                         │
//! │        ▼                                                                │
//! │   pending(batch_size, max_attempts)   oldest request first             │
//! │        │                                                                │
//! │        ▼  for each entry                                                │
//! │   apply_write(store, op)                                                │
//! │        ├── ok  → mark_synced, notify on_replayed(collection)           │
//! │        └── err → mark_failed (attempts += 1)                           │
//! │                  attempts reached max → logged, left for inspection    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   no failures  → reset backoff, wait poll interval                     │
//! │   any failure  → wait max(poll interval, next backoff step)            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `on_replayed` lets the owner drop caches that a replayed write made
//! stale.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use goldtea_core::Collection;

use super::OutboxStore;
use crate::config::OutboxSettings;
use crate::connectivity::ConnectivityMonitor;
use crate::coordinator::apply_write;
use crate::error::{SyncError, SyncResult};
use crate::store::RemoteStore;

/// Callback run after a queued write reached the store.
pub type ReplayListener = Arc<dyn Fn(Collection) + Send + Sync>;

/// Outcome of one processing cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub replayed: usize,
    pub failed: usize,
    /// Failures that used up the last attempt.
    pub given_up: usize,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

// =============================================================================
// Outbox Processor
// =============================================================================

pub struct OutboxProcessor {
    store: Arc<dyn RemoteStore>,
    outbox: Arc<dyn OutboxStore>,
    settings: OutboxSettings,
    on_replayed: Option<ReplayListener>,
    connectivity: Option<ConnectivityMonitor>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the outbox processor.
#[derive(Clone)]
pub struct OutboxProcessorHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl OutboxProcessorHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Shutdown channel closed".into()))
    }
}

impl OutboxProcessor {
    /// Creates a processor and the handle that stops it.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        outbox: Arc<dyn OutboxStore>,
        settings: OutboxSettings,
    ) -> (Self, OutboxProcessorHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let processor = OutboxProcessor {
            store,
            outbox,
            settings,
            on_replayed: None,
            connectivity: None,
            shutdown_rx,
        };

        (processor, OutboxProcessorHandle { shutdown_tx })
    }

    pub fn on_replayed(mut self, listener: ReplayListener) -> Self {
        self.on_replayed = Some(listener);
        self
    }

    /// Skips cycles while the monitor reports offline.
    pub fn with_connectivity(mut self, monitor: ConnectivityMonitor) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    /// Runs the processing loop until shutdown.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(
            poll_secs = self.settings.poll_interval_secs,
            batch_size = self.settings.batch_size,
            "Outbox processor starting"
        );

        let poll = self.settings.poll_interval();
        let mut backoff = self.create_backoff();
        let mut wait = poll;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    wait = match self.process_batch().await {
                        Ok(report) if report.is_clean() => {
                            backoff.reset();
                            poll
                        }
                        Ok(report) => {
                            let step = backoff.next_backoff().unwrap_or(self.settings.max_backoff());
                            debug!(failed = report.failed, wait_ms = step.max(poll).as_millis() as u64, "Backing off after failed replays");
                            step.max(poll)
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to process outbox batch");
                            backoff.next_backoff().unwrap_or(self.settings.max_backoff()).max(poll)
                        }
                    };
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Outbox processor shutting down");
                    break;
                }
            }
        }

        info!("Outbox processor stopped");
    }

    /// Replays one batch of pending writes.
    pub async fn process_batch(&self) -> SyncResult<BatchReport> {
        let mut report = BatchReport::default();

        if let Some(monitor) = &self.connectivity {
            if !monitor.is_online() {
                debug!("Offline, skipping outbox processing");
                return Ok(report);
            }
        }

        let entries = self
            .outbox
            .pending(self.settings.batch_size, self.settings.max_attempts)
            .await?;

        if entries.is_empty() {
            debug!("No pending writes");
            return Ok(report);
        }

        info!(count = entries.len(), "Replaying pending writes");

        for entry in entries {
            let collection = entry.op.collection();
            match apply_write(self.store.as_ref(), &entry.op).await {
                Ok(()) => {
                    self.outbox.mark_synced(&entry.id).await?;
                    report.replayed += 1;
                    if let Some(listener) = &self.on_replayed {
                        listener(collection);
                    }
                    debug!(collection = %collection, id = %entry.op.id(), "Replayed pending write");
                }
                Err(e) => {
                    self.outbox.mark_failed(&entry.id, &e.to_string()).await?;
                    report.failed += 1;

                    if entry.attempts.saturating_add(1) >= self.settings.max_attempts {
                        report.given_up += 1;
                        warn!(
                            collection = %collection,
                            id = %entry.op.id(),
                            attempts = entry.attempts + 1,
                            error = %e,
                            "Giving up on pending write after max attempts"
                        );
                    } else {
                        debug!(collection = %collection, id = %entry.op.id(), error = %e, "Replay failed");
                    }
                }
            }
        }

        info!(
            replayed = report.replayed,
            failed = report.failed,
            "Outbox cycle complete"
        );
        Ok(report)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.settings.initial_backoff(),
            max_interval: self.settings.max_backoff(),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectionStatus;
    use crate::coordinator::WriteOp;
    use crate::outbox::MemoryOutbox;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    fn upsert(id: &str) -> WriteOp {
        WriteOp::Upsert {
            collection: Collection::Villages,
            id: id.to_string(),
            data: json!({ "name": id, "day": "Monday" }),
            reconcile: None,
        }
    }

    fn settings(max_attempts: u32) -> OutboxSettings {
        OutboxSettings {
            max_attempts,
            ..OutboxSettings::default()
        }
    }

    #[tokio::test]
    async fn test_replays_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.enqueue(&upsert("Rampur"), Utc::now()).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (processor, _handle) = OutboxProcessor::new(store.clone(), outbox.clone(), settings(3));
        let processor = processor.on_replayed(Arc::new(move |c| sink.lock().unwrap().push(c)));

        let report = processor.process_batch().await.unwrap();
        assert_eq!(report.replayed, 1);
        assert!(report.is_clean());
        assert!(store.document(Collection::Villages, "Rampur").is_some());
        assert_eq!(outbox.count_pending().await.unwrap(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![Collection::Villages]);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::new());
        store.set_fail_writes(true);
        outbox.enqueue(&upsert("Rampur"), Utc::now()).await.unwrap();

        let (processor, _handle) = OutboxProcessor::new(store.clone(), outbox.clone(), settings(2));

        let first = processor.process_batch().await.unwrap();
        assert_eq!((first.failed, first.given_up), (1, 0));
        let second = processor.process_batch().await.unwrap();
        assert_eq!((second.failed, second.given_up), (1, 1));

        // Exhausted entries are no longer replayed but still counted
        let third = processor.process_batch().await.unwrap();
        assert_eq!(third, BatchReport::default());
        assert_eq!(outbox.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_skips_while_offline() {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.enqueue(&upsert("Rampur"), Utc::now()).await.unwrap();

        let monitor = ConnectivityMonitor::new();
        let (processor, _handle) = OutboxProcessor::new(store.clone(), outbox.clone(), settings(3));
        let processor = processor.with_connectivity(monitor.clone());

        assert_eq!(processor.process_batch().await.unwrap().replayed, 0);
        monitor.update(ConnectionStatus::Online);
        assert_eq!(processor.process_batch().await.unwrap().replayed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_replays_and_shuts_down() {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.enqueue(&upsert("Kheri"), Utc::now()).await.unwrap();

        let (processor, handle) = OutboxProcessor::new(store.clone(), outbox.clone(), settings(3));
        let task = tokio::spawn(processor.run());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(store.document(Collection::Villages, "Kheri").is_some());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
