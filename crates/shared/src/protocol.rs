use serde::{Deserialize, Serialize};

use crate::{
    domain::{BatchId, ItemId, ItemStatus},
    error::FailureCause,
};

/// One row of the upload list as the view layer renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItemView {
    pub id: ItemId,
    pub name: String,
    pub size_bytes: u64,
    pub status: ItemStatus,
    /// Pinned to 100 once succeeded. Not meaningful for failed items.
    pub progress_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCause>,
}

impl UploadItemView {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub batch_id: BatchId,
    pub items: Vec<UploadItemView>,
    pub settled: bool,
}

impl BatchSnapshot {
    pub fn succeeded(&self) -> usize {
        self.count(ItemStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            batch_id: self.batch_id,
            total: self.items.len(),
            succeeded: self.succeeded(),
            failed: self.failed(),
        }
    }

    fn count(&self, status: ItemStatus) -> usize {
        self.items
            .iter()
            .filter(|item| item.status == status)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BatchEvent {
    ItemUpdated(UploadItemView),
    Settled(BatchSummary),
}
