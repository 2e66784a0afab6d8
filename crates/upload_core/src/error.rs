use shared::domain::{ItemId, ItemStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("cannot submit an empty batch")]
    EmptyBatch,
    #[error("batch of {count} files exceeds the item id range")]
    TooManyItems { count: usize },
    #[error("no item {0} in batch")]
    UnknownItem(ItemId),
    #[error("invalid transition for item {id}: {from} -> {to}")]
    InvalidTransition {
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
    },
    #[error("invalid progress value {percent} for item {id}")]
    InvalidProgress { id: ItemId, percent: f64 },
    #[error("batch driver is no longer running")]
    Closed,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected upload with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}
