use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an item ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureCause {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upload cancelled")]
    Cancelled,
}

impl FailureCause {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
