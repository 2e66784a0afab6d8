//! The network side of a single upload.
//!
//! A [`Transport`] performs one upload per call. Progress is reported through
//! the [`ProgressSink`] it is handed; the returned `Result` is the terminal
//! outcome. Neither the sink nor the outcome is trusted blindly: the batch
//! drops anything that arrives for an item that is already terminal.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use reqwest::{multipart, Body, Client};
use shared::domain::ItemId;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::{error::TransportError, file::FileRef, task::BatchUpdate};

const UPLOAD_FIELD_NAME: &str = "file";
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn upload(
        &self,
        file: &FileRef,
        destination: &Url,
        progress: ProgressSink,
    ) -> Result<(), TransportError>;
}

/// Progress callback handed to a [`Transport`] for one item.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    id: ItemId,
    updates: mpsc::UnboundedSender<BatchUpdate>,
}

impl ProgressSink {
    pub(crate) fn new(id: ItemId, updates: mpsc::UnboundedSender<BatchUpdate>) -> Self {
        Self { id, updates }
    }

    pub fn item_id(&self) -> ItemId {
        self.id
    }

    pub fn report(&self, percent: f64) {
        // The driver only goes away once the batch is dropped.
        let _ = self.updates.send(BatchUpdate::Progress {
            id: self.id,
            percent,
        });
    }

    pub fn report_bytes(&self, sent: u64, total: u64) {
        self.report(percent_of(sent, total));
    }
}

pub(crate) fn percent_of(sent: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (sent as f64 / total as f64) * 100.0
}

/// Posts each file as `multipart/form-data` to the destination URL.
pub struct ReqwestTransport {
    http: Client,
    chunk_bytes: usize,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self {
            http,
            chunk_bytes: UPLOAD_CHUNK_BYTES,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http))
    }

    pub fn chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    fn progress_body(&self, content: &Bytes, progress: ProgressSink) -> Body {
        let total = content.len() as u64;
        let chunks: Vec<Bytes> = content
            .chunks(self.chunk_bytes)
            .map(|chunk| content.slice_ref(chunk))
            .collect();

        let mut sent = 0u64;
        let body = stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            progress.report_bytes(sent, total);
            Ok::<_, std::io::Error>(chunk)
        }));
        Body::wrap_stream(body)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn upload(
        &self,
        file: &FileRef,
        destination: &Url,
        progress: ProgressSink,
    ) -> Result<(), TransportError> {
        let part = multipart::Part::stream_with_length(
            self.progress_body(file.content(), progress),
            file.size_bytes(),
        )
        .file_name(file.name().to_string())
        .mime_str(file.mime_type())?;
        let form = multipart::Form::new().part(UPLOAD_FIELD_NAME, part);

        let response = self
            .http
            .post(destination.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        debug!(file = file.name(), %status, "upload accepted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
