//! Show one resource.

use anyhow::Result;
use leasehold_core::{Category, ResourceInfo, ResourceRegistry};

use super::{describe, Reply};

pub async fn run(registry: &ResourceRegistry, category: Category, id: &str) -> Result<Reply> {
    let info = registry.info(category, id).await?;
    Reply::ok(render(&info), &info)
}

fn render(info: &ResourceInfo) -> String {
    let mut lines = vec![
        format!("{} {} ({})", info.category, info.id, info.name),
        format!("  Status: {}", describe(&info.status)),
    ];
    if !info.metadata.is_empty() {
        lines.push("  Metadata:".to_string());
        lines.extend(info.metadata.iter().map(|(key, value)| {
            let shown = value
                .as_str()
                .map_or_else(|| value.to_string(), str::to_string);
            format!("    {key}: {shown}")
        }));
    }
    lines.join("\n")
}
