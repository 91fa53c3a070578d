//! Clear all durable lease state.

use anyhow::Result;
use leasehold_core::{Config, LeaseStore};
use serde_json::json;
use tracing::info;

use super::Reply;

/// Wipe the store named by `config`.
///
/// Works on the store directly: a registry would write its in-memory state
/// back on shutdown.
pub async fn run(config: &Config, confirmed: bool) -> Result<Reply> {
    if !confirmed {
        anyhow::bail!("Refusing to clear lease state without --yes");
    }

    let path = &config.store.path;
    let store = LeaseStore::open(path).await?;
    let cleared = store.clear().await;
    store.close().await;
    cleared?;

    info!(path = %path.display(), "Cleared lease state");
    Reply::ok(
        format!("Cleared lease state in {}", path.display()),
        &json!({ "success": true, "path": path }),
    )
}
