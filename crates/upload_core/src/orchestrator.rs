//! Batch submission, the single-writer batch driver, and the caller's handle.
//!
//! Every item gets its own [`UploadTask`]; all of them feed one unbounded
//! update queue. A driver task owns the [`Batch`] and applies updates strictly
//! in queue order, publishing a fresh [`BatchSnapshot`] on a `watch` channel
//! and a [`BatchEvent`] on a `broadcast` channel after each accepted change.

use std::sync::Arc;

use shared::{
    domain::{BatchId, ItemId},
    protocol::{BatchEvent, BatchSnapshot, BatchSummary, UploadItemView},
};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch, Semaphore},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    batch::Batch,
    error::BatchError,
    file::FileRef,
    monitor::CompletionMonitor,
    task::{BatchUpdate, UploadTask},
    transport::Transport,
};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub destination: Url,
    /// `None` launches every upload at once.
    pub max_concurrent: Option<usize>,
    pub event_capacity: usize,
}

impl OrchestratorOptions {
    pub fn new(destination: Url) -> Self {
        Self {
            destination,
            max_concurrent: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn max_concurrent(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent = limit;
        self
    }
}

pub struct BatchUploadOrchestrator {
    transport: Arc<dyn Transport>,
    options: OrchestratorOptions,
}

impl BatchUploadOrchestrator {
    pub fn new(transport: Arc<dyn Transport>, options: OrchestratorOptions) -> Self {
        Self { transport, options }
    }

    pub fn destination(&self) -> &Url {
        &self.options.destination
    }

    /// Creates a batch and starts uploading every file. Must be called from
    /// within a tokio runtime.
    pub fn submit(&self, files: Vec<FileRef>) -> Result<BatchHandle, BatchError> {
        let batch = Batch::create(files)?;
        let batch_id = batch.id();

        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(batch.snapshot());
        let (events, _) = broadcast::channel(self.options.event_capacity.max(1));

        let destination = Arc::new(self.options.destination.clone());
        let slots = self
            .options
            .max_concurrent
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        let tasks: Vec<JoinHandle<()>> = batch
            .items()
            .iter()
            .map(|item| {
                UploadTask {
                    id: item.id(),
                    file: Arc::clone(item.file()),
                    destination: Arc::clone(&destination),
                    transport: Arc::clone(&self.transport),
                    updates: updates_tx.clone(),
                    slots: slots.clone(),
                }
                .spawn()
            })
            .collect();

        info!(
            %batch_id,
            items = tasks.len(),
            destination = %self.options.destination,
            max_concurrent = ?self.options.max_concurrent,
            "batch submitted"
        );

        let driver = BatchDriver {
            batch,
            monitor: CompletionMonitor::new(),
            snapshot: snapshot_tx,
            events: events.clone(),
        };
        tokio::spawn(driver.run(updates_rx));

        Ok(BatchHandle {
            id: batch_id,
            updates: updates_tx,
            snapshot: snapshot_rx,
            events,
            tasks,
        })
    }
}

/// Sole owner and writer of a batch.
struct BatchDriver {
    batch: Batch,
    monitor: CompletionMonitor,
    snapshot: watch::Sender<BatchSnapshot>,
    events: broadcast::Sender<BatchEvent>,
}

impl BatchDriver {
    async fn run(mut self, mut updates: mpsc::UnboundedReceiver<BatchUpdate>) {
        while let Some(update) = updates.recv().await {
            self.apply(update);
        }
        debug!(batch_id = %self.batch.id(), "batch driver stopped");
    }

    fn apply(&mut self, update: BatchUpdate) {
        match update {
            BatchUpdate::Progress { id, percent } => {
                let result = self.batch.apply_progress(id, percent);
                if matches!(result, Ok(true)) {
                    debug!(batch_id = %self.batch.id(), item = %id, percent, "upload progress");
                }
                self.record(id, result);
            }
            BatchUpdate::Succeeded { id } => {
                let result = self.batch.mark_succeeded(id);
                self.record(id, result);
            }
            BatchUpdate::Failed { id, cause } => {
                let result = self.batch.mark_failed(id, cause);
                self.record(id, result);
            }
            BatchUpdate::Cancel { ack } => {
                let cancelled = self.batch.cancel_open();
                info!(
                    batch_id = %self.batch.id(),
                    cancelled = cancelled.len(),
                    "batch cancelled"
                );
                if !cancelled.is_empty() {
                    self.publish();
                    for id in cancelled {
                        self.emit_item(id);
                    }
                    self.check_settled();
                }
                let _ = ack.send(());
            }
        }
    }

    fn record(&mut self, id: ItemId, result: Result<bool, BatchError>) {
        match result {
            Ok(true) => {
                self.publish();
                self.emit_item(id);
                self.check_settled();
            }
            Ok(false) => {}
            Err(error) => {
                warn!(batch_id = %self.batch.id(), item = %id, %error, "dropping rejected update");
            }
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.batch.snapshot());
    }

    fn emit_item(&self, id: ItemId) {
        if let Ok(item) = self.batch.item(id) {
            let _ = self.events.send(BatchEvent::ItemUpdated(item.view()));
        }
    }

    fn check_settled(&mut self) {
        if let Some(summary) = self.monitor.observe(&self.batch) {
            info!(
                batch_id = %summary.batch_id,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "batch settled"
            );
            let _ = self.events.send(BatchEvent::Settled(summary));
        }
    }
}

/// The caller's read-only view of a submitted batch.
///
/// Dropping the handle aborts uploads that are still running.
pub struct BatchHandle {
    id: BatchId,
    updates: mpsc::UnboundedSender<BatchUpdate>,
    snapshot: watch::Receiver<BatchSnapshot>,
    events: broadcast::Sender<BatchEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl BatchHandle {
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Current state of every item, in submission order. Never waits.
    pub fn snapshot(&self) -> BatchSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn items(&self) -> Vec<UploadItemView> {
        self.snapshot.borrow().items.clone()
    }

    pub fn is_settled(&self) -> bool {
        self.snapshot.borrow().settled
    }

    /// Item and settlement events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    /// Snapshot stream for consumers that only care about the latest state.
    pub fn watch(&self) -> watch::Receiver<BatchSnapshot> {
        self.snapshot.clone()
    }

    pub async fn settled(&self) -> Result<BatchSummary, BatchError> {
        let mut snapshot = self.snapshot.clone();
        let settled = snapshot
            .wait_for(|snapshot| snapshot.settled)
            .await
            .map_err(|_| BatchError::Closed)?;
        Ok(settled.summary())
    }

    /// Aborts running uploads and fails every open item as cancelled.
    /// Returns once the cancelled state is visible through [`Self::snapshot`].
    pub async fn cancel(&self) -> Result<(), BatchError> {
        for task in &self.tasks {
            task.abort();
        }

        let (ack, done) = oneshot::channel();
        self.updates
            .send(BatchUpdate::Cancel { ack })
            .map_err(|_| BatchError::Closed)?;
        done.await.map_err(|_| BatchError::Closed)
    }
}

impl Drop for BatchHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
