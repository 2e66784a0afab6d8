//! Upload items and the batch that owns them.
//!
//! Items move forward only: `Pending -> InFlight -> {Succeeded | Failed}`,
//! with `Pending` and `InFlight` also allowed to fail directly (cancellation,
//! immediate transport errors). Every mutation reports whether it changed
//! anything so the driver knows when to publish a new snapshot.

use std::sync::Arc;

use shared::{
    domain::{BatchId, ItemId, ItemStatus},
    error::FailureCause,
    protocol::{BatchSnapshot, UploadItemView},
};

use crate::{error::BatchError, file::FileRef};

#[derive(Debug, Clone)]
pub struct UploadItem {
    id: ItemId,
    file: Arc<FileRef>,
    status: ItemStatus,
    progress_percent: f64,
    failure: Option<FailureCause>,
}

impl UploadItem {
    fn pending(id: ItemId, file: FileRef) -> Self {
        Self {
            id,
            file: Arc::new(file),
            status: ItemStatus::Pending,
            progress_percent: 0.0,
            failure: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn file(&self) -> &Arc<FileRef> {
        &self.file
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    pub fn failure(&self) -> Option<&FailureCause> {
        self.failure.as_ref()
    }

    pub fn view(&self) -> UploadItemView {
        UploadItemView {
            id: self.id,
            name: self.file.name().to_string(),
            size_bytes: self.file.size_bytes(),
            status: self.status,
            progress_percent: self.progress_percent,
            failure: self.failure.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Batch {
    id: BatchId,
    items: Vec<UploadItem>,
}

impl Batch {
    /// Builds one pending item per file, in submission order.
    pub fn create(files: Vec<FileRef>) -> Result<Self, BatchError> {
        if files.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let count = files.len();
        let items = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| Ok(UploadItem::pending(item_id_at(index, count)?, file)))
            .collect::<Result<_, BatchError>>()?;

        Ok(Self {
            id: BatchId::generate(),
            items,
        })
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Result<&UploadItem, BatchError> {
        self.items
            .get(id.index())
            .ok_or(BatchError::UnknownItem(id))
    }

    pub fn is_settled(&self) -> bool {
        self.items.iter().all(|item| item.status.is_terminal())
    }

    pub fn apply_progress(&mut self, id: ItemId, percent: f64) -> Result<bool, BatchError> {
        if percent.is_nan() {
            return Err(BatchError::InvalidProgress { id, percent });
        }
        let percent = percent.clamp(0.0, 100.0);
        let item = self.item_mut(id)?;

        match item.status {
            ItemStatus::Pending => {
                item.status = ItemStatus::InFlight;
                item.progress_percent = percent;
                Ok(true)
            }
            ItemStatus::InFlight if percent > item.progress_percent => {
                item.progress_percent = percent;
                Ok(true)
            }
            ItemStatus::InFlight => Ok(false),
            from => Err(BatchError::InvalidTransition {
                id,
                from,
                to: ItemStatus::InFlight,
            }),
        }
    }

    pub fn mark_succeeded(&mut self, id: ItemId) -> Result<bool, BatchError> {
        let item = self.item_mut(id)?;

        match item.status {
            ItemStatus::Succeeded => Ok(false),
            ItemStatus::Failed => Err(BatchError::InvalidTransition {
                id,
                from: ItemStatus::Failed,
                to: ItemStatus::Succeeded,
            }),
            ItemStatus::Pending | ItemStatus::InFlight => {
                item.status = ItemStatus::Succeeded;
                item.progress_percent = 100.0;
                Ok(true)
            }
        }
    }

    /// Fails an open item. A second failure keeps the first cause.
    pub fn mark_failed(&mut self, id: ItemId, cause: FailureCause) -> Result<bool, BatchError> {
        let item = self.item_mut(id)?;

        match item.status {
            ItemStatus::Failed => Ok(false),
            ItemStatus::Succeeded => Err(BatchError::InvalidTransition {
                id,
                from: ItemStatus::Succeeded,
                to: ItemStatus::Failed,
            }),
            ItemStatus::Pending | ItemStatus::InFlight => {
                item.status = ItemStatus::Failed;
                item.failure = Some(cause);
                Ok(true)
            }
        }
    }

    /// Fails every item that has not reached a terminal state yet.
    pub fn cancel_open(&mut self) -> Vec<ItemId> {
        let mut cancelled = Vec::new();
        for item in &mut self.items {
            if !item.status.is_terminal() {
                item.status = ItemStatus::Failed;
                item.failure = Some(FailureCause::Cancelled);
                cancelled.push(item.id);
            }
        }
        cancelled
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            batch_id: self.id,
            items: self.items.iter().map(UploadItem::view).collect(),
            settled: self.is_settled(),
        }
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut UploadItem, BatchError> {
        self.items
            .get_mut(id.index())
            .ok_or(BatchError::UnknownItem(id))
    }
}

fn item_id_at(index: usize, count: usize) -> Result<ItemId, BatchError> {
    u32::try_from(index)
        .map(ItemId)
        .map_err(|_| BatchError::TooManyItems { count })
}

#[cfg(test)]
#[path = "tests/batch_tests.rs"]
mod tests;
