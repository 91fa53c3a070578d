//! Commands module for leasehold CLI
//!
//! Each command returns a [`Reply`]: a human message plus the JSON body
//! printed under `--json`.

pub mod health;
pub mod history;
pub mod info;
pub mod lease;
pub mod list;
pub mod reset;
pub mod status;
pub mod whoami;

use anyhow::Result;
use chrono::{DateTime, Utc};
use leasehold_core::LeaseStatus;
use serde::Serialize;

pub use list::ListFilter;

/// What a command produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// `false` when a lease operation was refused
    pub success: bool,
    /// The store is not keeping up: a change went unsaved or the write
    /// check failed
    pub degraded: bool,
    pub message: String,
    pub body: serde_json::Value,
}

impl Reply {
    pub fn new<T: Serialize>(success: bool, message: impl Into<String>, body: &T) -> Result<Self> {
        Ok(Self {
            success,
            degraded: false,
            message: message.into(),
            body: serde_json::to_value(body)?,
        })
    }

    pub fn ok<T: Serialize>(message: impl Into<String>, body: &T) -> Result<Self> {
        Self::new(true, message, body)
    }

    #[must_use]
    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }

    /// 4 when degraded, 1 when refused, otherwise 0.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.degraded {
            4
        } else if self.success {
            0
        } else {
            1
        }
    }

    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&self.body)?);
        } else {
            println!("{}", self.message);
        }
        Ok(())
    }
}

/// One-line description of a lease, e.g. `taken by alice since 2026-03-02 14:00 UTC`.
pub(crate) fn describe(status: &LeaseStatus) -> String {
    match (&status.holder, status.held_since) {
        (Some(holder), Some(since)) => format!("taken by {holder} since {}", timestamp(since)),
        (Some(holder), None) => format!("taken by {holder}"),
        _ => "available".to_string(),
    }
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_describe() {
        let since = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).single();
        let held = LeaseStatus {
            is_taken: true,
            holder: Some("alice".into()),
            held_since: since,
        };
        assert_eq!(describe(&held), "taken by alice since 2026-03-02 14:00 UTC");

        let free = LeaseStatus {
            is_taken: false,
            holder: None,
            held_since: None,
        };
        assert_eq!(describe(&free), "available");
    }

    #[test]
    fn test_reply_json_body() -> Result<()> {
        let reply = Reply::ok("hello", &serde_json::json!({ "holder": "alice" }))?;
        assert!(reply.success);
        assert_eq!(reply.body["holder"], "alice");
        Ok(())
    }

    #[test]
    fn test_exit_codes() -> Result<()> {
        let body = serde_json::json!({});
        assert_eq!(Reply::ok("done", &body)?.exit_code(), 0);
        assert_eq!(Reply::new(false, "refused", &body)?.exit_code(), 1);
        assert_eq!(Reply::ok("done", &body)?.with_degraded(true).exit_code(), 4);
        Ok(())
    }
}
