use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use shared::protocol::{BatchEvent, BatchSummary};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{debug, info, warn};
use upload_core::{
    BatchHandle, BatchUploadOrchestrator, FileRef, OrchestratorOptions, ReqwestTransport,
};

mod config;
mod render;

use config::{load_settings, validate_destination, Settings};

#[derive(Parser, Debug)]
#[command(about = "Upload files to a file server as one concurrent batch")]
struct Args {
    /// Files to upload, in the order they should be listed.
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Upload URL; a trailing `/` stores files under that directory.
    #[arg(long)]
    destination: Option<String>,
    #[arg(long)]
    max_concurrent: Option<usize>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long, default_value = "uploader.toml")]
    config: PathBuf,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(v) = &self.destination {
            settings.destination_url = v.clone();
        }
        if let Some(v) = self.max_concurrent {
            settings.max_concurrent = Some(v);
        }
        if let Some(v) = self.timeout_secs {
            settings.request_timeout_secs = Some(v);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config)?;
    args.apply(&mut settings);

    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    let destination = validate_destination(&settings.destination_url)?;

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let file = FileRef::from_path(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        files.push(file);
    }

    let transport = match settings.request_timeout_secs {
        Some(secs) => ReqwestTransport::with_timeout(Duration::from_secs(secs))?,
        None => ReqwestTransport::new(),
    };
    let orchestrator = BatchUploadOrchestrator::new(
        Arc::new(transport),
        OrchestratorOptions::new(destination).max_concurrent(settings.max_concurrent),
    );

    info!(
        destination = %orchestrator.destination(),
        files = files.len(),
        "starting upload"
    );
    let handle = orchestrator.submit(files)?;
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let summary = follow_batch(&handle, interrupt, |line| println!("{line}")).await?;

    for line in render::format_snapshot(&handle.snapshot()) {
        println!("{line}");
    }
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "upload finished"
    );

    if summary.failed > 0 {
        bail!("{} of {} uploads failed", summary.failed, summary.total);
    }
    Ok(())
}

/// Prints item updates until the batch settles, then the settlement line.
/// Resolving `interrupt` cancels the batch once.
async fn follow_batch(
    handle: &BatchHandle,
    interrupt: impl Future<Output = ()>,
    mut emit: impl FnMut(String),
) -> Result<BatchSummary> {
    let mut events = BroadcastStream::new(handle.subscribe());
    let settled = handle.settled();
    tokio::pin!(settled);
    tokio::pin!(interrupt);
    let mut cancelled = false;

    let summary = loop {
        tokio::select! {
            biased;
            Some(event) = events.next() => match event {
                Ok(event @ BatchEvent::ItemUpdated(_)) => emit(render::format_event(&event)),
                Ok(BatchEvent::Settled(_)) => {}
                Err(err) => debug!(%err, "skipped batch events"),
            },
            summary = &mut settled => break summary?,
            _ = &mut interrupt, if !cancelled => {
                warn!("interrupted; cancelling remaining uploads");
                cancelled = true;
                handle.cancel().await?;
            }
        }
    };

    emit(render::format_summary(&summary));
    Ok(summary)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
