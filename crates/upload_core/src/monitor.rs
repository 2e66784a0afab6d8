use shared::protocol::BatchSummary;

use crate::batch::Batch;

/// Detects the single `Open -> Settled` flip of a batch.
///
/// Call [`CompletionMonitor::observe`] after every accepted state change; it
/// yields a summary the first time every item is terminal and never again.
#[derive(Debug, Default)]
pub struct CompletionMonitor {
    fired: bool,
}

impl CompletionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn observe(&mut self, batch: &Batch) -> Option<BatchSummary> {
        if self.fired || !batch.is_settled() {
            return None;
        }
        self.fired = true;
        Some(batch.snapshot().summary())
    }
}
