//! Terminal rendering of the batch read model.

use shared::{
    domain::ItemStatus,
    protocol::{BatchEvent, BatchSnapshot, BatchSummary, UploadItemView},
};

pub fn format_item(item: &UploadItemView) -> String {
    let progress = match item.status {
        ItemStatus::Pending => "   -".to_string(),
        ItemStatus::InFlight => format!("{:>3}%", item.progress_percent.round() as u32),
        ItemStatus::Succeeded => "  ok".to_string(),
        ItemStatus::Failed => "FAIL".to_string(),
    };

    match &item.failure {
        Some(cause) => format!("[{progress}] {} ({} bytes): {cause}", item.name, item.size_bytes),
        None => format!("[{progress}] {} ({} bytes)", item.name, item.size_bytes),
    }
}

pub fn format_event(event: &BatchEvent) -> String {
    match event {
        BatchEvent::ItemUpdated(item) => format_item(item),
        BatchEvent::Settled(summary) => format_summary(summary),
    }
}

pub fn format_summary(summary: &BatchSummary) -> String {
    format!(
        "batch settled: {} succeeded, {} failed, {} total",
        summary.succeeded, summary.failed, summary.total
    )
}

pub fn format_snapshot(snapshot: &BatchSnapshot) -> Vec<String> {
    snapshot.items.iter().map(format_item).collect()
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
