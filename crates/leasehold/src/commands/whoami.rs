//! Show the resolved holder identity.

use anyhow::Result;
use leasehold_core::resolve_holder;
use serde_json::json;

use super::Reply;

pub fn run() -> Result<Reply> {
    let holder = resolve_holder();
    Reply::ok(holder.clone(), &json!({ "holder": holder }))
}
