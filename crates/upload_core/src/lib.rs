//! Concurrent batch uploads with per-file progress and a single settlement signal.
//!
//! A caller hands [`BatchUploadOrchestrator::submit`] a list of [`FileRef`]s and
//! gets back a [`BatchHandle`]. Each file is uploaded by its own task through a
//! [`Transport`]; the handle exposes the resulting state as snapshots and as a
//! stream of [`shared::protocol::BatchEvent`]s that ends with exactly one
//! `Settled` event once every item has succeeded or failed.

pub mod batch;
pub mod error;
pub mod file;
pub mod monitor;
pub mod orchestrator;
mod task;
pub mod transport;

pub use batch::{Batch, UploadItem};
pub use error::{BatchError, TransportError};
pub use file::FileRef;
pub use monitor::CompletionMonitor;
pub use orchestrator::{BatchHandle, BatchUploadOrchestrator, OrchestratorOptions};
pub use transport::{ProgressSink, ReqwestTransport, Transport};
