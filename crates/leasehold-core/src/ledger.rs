//! Append-only audit trail of past holder intervals.
//!
//! Entries are stored oldest-first and read newest-first. Nothing is ever
//! mutated or removed once appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a holder interval ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReleaseReason {
    /// The holder (or an operator) released the resource
    Normal,
    /// Another caller took the resource over
    Stolen {
        /// The new holder
        by: String,
    },
}

/// One closed holder interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Who held the resource
    pub holder: String,
    /// When they acquired it
    pub acquired_at: DateTime<Utc>,
    /// When the interval ended
    pub released_at: DateTime<Utc>,
    /// How the interval ended
    pub reason: ReleaseReason,
}

impl UsageRecord {
    /// A normally-released interval.
    ///
    /// `released_at` is clamped to `acquired_at` if the clock went backwards.
    #[must_use]
    pub fn released(
        holder: impl Into<String>,
        acquired_at: DateTime<Utc>,
        released_at: DateTime<Utc>,
    ) -> Self {
        Self {
            holder: holder.into(),
            acquired_at,
            released_at: released_at.max(acquired_at),
            reason: ReleaseReason::Normal,
        }
    }

    /// An interval cut short by a steal.
    #[must_use]
    pub fn stolen(
        holder: impl Into<String>,
        acquired_at: DateTime<Utc>,
        released_at: DateTime<Utc>,
        by: impl Into<String>,
    ) -> Self {
        Self {
            holder: holder.into(),
            acquired_at,
            released_at: released_at.max(acquired_at),
            reason: ReleaseReason::Stolen { by: by.into() },
        }
    }

    #[must_use]
    pub const fn was_stolen(&self) -> bool {
        matches!(self.reason, ReleaseReason::Stolen { .. })
    }

    #[must_use]
    pub fn stolen_by(&self) -> Option<&str> {
        match &self.reason {
            ReleaseReason::Stolen { by } => Some(by.as_str()),
            ReleaseReason::Normal => None,
        }
    }
}

/// Per-resource usage history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLedger {
    entries: Vec<UsageRecord>,
}

impl HistoryLedger {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a closed interval.
    pub fn append(&mut self, record: UsageRecord) {
        self.entries.push(record);
    }

    /// Entries newest-first.
    ///
    /// `None` returns the whole ledger. `Some(k)` returns the `k` most recent
    /// entries, so `Some(0)` is always empty.
    #[must_use]
    pub fn recent(&self, limit: Option<usize>) -> Vec<UsageRecord> {
        self.entries
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Entries appended at or after position `start`, oldest-first.
    #[must_use]
    pub fn since(&self, start: usize) -> &[UsageRecord] {
        self.entries.get(start..).unwrap_or_default()
    }

    /// Most recently appended entry.
    #[must_use]
    pub fn latest(&self) -> Option<&UsageRecord> {
        self.entries.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<UsageRecord> for HistoryLedger {
    fn from_iter<I: IntoIterator<Item = UsageRecord>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
