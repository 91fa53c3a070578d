//! Aggregate status of every resource.

use std::collections::BTreeMap;

use anyhow::Result;
use leasehold_core::{AggregateStatus, Category, LeaseStatus, ResourceRegistry};

use super::{describe, Reply};

pub async fn run(registry: &ResourceRegistry) -> Result<Reply> {
    let status = registry.status_all().await;
    Reply::ok(render(&status), &status)
}

fn render(status: &AggregateStatus) -> String {
    [
        section(Category::Publisher, &status.publishers),
        section(Category::Environment, &status.environments),
    ]
    .join("\n")
}

fn section(category: Category, statuses: &BTreeMap<String, LeaseStatus>) -> String {
    let taken = statuses.values().filter(|s| s.is_taken).count();
    let header = format!("{} ({taken}/{} taken):", category.plural(), statuses.len());
    std::iter::once(header)
        .chain(
            statuses
                .iter()
                .map(|(id, status)| format!("  {id}: {}", describe(status))),
        )
        .collect::<Vec<_>>()
        .join("\n")
}
