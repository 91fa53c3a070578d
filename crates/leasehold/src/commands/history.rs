//! Show past holders of a resource.

use anyhow::Result;
use leasehold_core::{Category, ReleaseReason, ResourceRegistry, UsageRecord};
use serde::Serialize;

use super::{timestamp, Reply};

#[derive(Serialize)]
struct HistoryResponse<'a> {
    id: &'a str,
    category: Category,
    history: &'a [UsageRecord],
}

pub async fn run(
    registry: &ResourceRegistry,
    category: Category,
    id: &str,
    limit: Option<usize>,
) -> Result<Reply> {
    let history = registry.history(category, id, limit).await?;
    let body = HistoryResponse {
        id,
        category,
        history: &history,
    };
    Reply::ok(render(category, id, &history), &body)
}

fn render(category: Category, id: &str, history: &[UsageRecord]) -> String {
    if history.is_empty() {
        return format!("No usage history for {category} {id}");
    }

    let entries = history.iter().map(|record| {
        let ended = match &record.reason {
            ReleaseReason::Normal => "released".to_string(),
            ReleaseReason::Stolen { by } => format!("stolen by {by}"),
        };
        format!(
            "  {}  {} to {}  ({ended})",
            record.holder,
            timestamp(record.acquired_at),
            timestamp(record.released_at)
        )
    });
    std::iter::once(format!("History for {category} {id}, newest first:"))
        .chain(entries)
        .collect::<Vec<_>>()
        .join("\n")
}
