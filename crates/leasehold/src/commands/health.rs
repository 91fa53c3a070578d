//! Persistence health: whether the store accepts writes right now.

use anyhow::Result;
use leasehold_core::{PersistenceHealth, ResourceRegistry};

use super::{timestamp, Reply};

pub async fn run(registry: &ResourceRegistry) -> Result<Reply> {
    let health = registry.check_persistence().await;
    Ok(Reply::ok(render(&health), &health)?.with_degraded(health.degraded))
}

fn render(health: &PersistenceHealth) -> String {
    if !health.enabled {
        return "Persistence: disabled".to_string();
    }
    let mut lines = vec![format!(
        "Persistence: {}",
        if health.degraded { "degraded" } else { "ok" }
    )];
    if health.consecutive_failures > 0 {
        lines.push(format!(
            "  Consecutive failures: {}",
            health.consecutive_failures
        ));
    }
    if let Some(error) = &health.last_error {
        lines.push(format!("  Last error: {error}"));
    }
    if let Some(at) = health.last_success {
        lines.push(format!("  Last successful write: {}", timestamp(at)));
    }
    lines.join("\n")
}
