use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use shared::{domain::ItemId, error::FailureCause};
use tokio::{
    sync::{mpsc, oneshot, Semaphore},
    task::JoinHandle,
};
use tracing::warn;
use url::Url;

use crate::{
    error::TransportError,
    file::FileRef,
    transport::{ProgressSink, Transport},
};

/// Everything that may change a batch, funnelled through one queue.
#[derive(Debug)]
pub(crate) enum BatchUpdate {
    Progress { id: ItemId, percent: f64 },
    Succeeded { id: ItemId },
    Failed { id: ItemId, cause: FailureCause },
    Cancel { ack: oneshot::Sender<()> },
}

/// Drives one item through a single transport attempt. Never retries.
pub(crate) struct UploadTask {
    pub(crate) id: ItemId,
    pub(crate) file: Arc<FileRef>,
    pub(crate) destination: Arc<Url>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) updates: mpsc::UnboundedSender<BatchUpdate>,
    pub(crate) slots: Option<Arc<Semaphore>>,
}

impl UploadTask {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub(crate) async fn run(self) {
        let _permit = match &self.slots {
            Some(slots) => match Arc::clone(slots).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.finish(Err(TransportError::Other(
                        "upload slots are no longer available".to_string(),
                    )));
                    return;
                }
            },
            None => None,
        };

        let progress = ProgressSink::new(self.id, self.updates.clone());
        progress.report(0.0);

        // A panicking transport still has to leave the item terminal.
        let upload = self.transport.upload(&self.file, &self.destination, progress);
        let outcome = AssertUnwindSafe(upload)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(TransportError::Other("upload task panicked".to_string())));
        self.finish(outcome);
    }

    fn finish(&self, outcome: Result<(), TransportError>) {
        let update = match outcome {
            Ok(()) => BatchUpdate::Succeeded { id: self.id },
            Err(error) => {
                warn!(item = %self.id, file = self.file.name(), %error, "upload failed");
                BatchUpdate::Failed {
                    id: self.id,
                    cause: FailureCause::transport(error.to_string()),
                }
            }
        };
        let _ = self.updates.send(update);
    }
}
