//! Lease state machine for a single resource.
//!
//! ```text
//!            try_acquire / steal
//!   Free  ─────────────────────────▶  Held(holder, since)
//!    ▲                                   │      │
//!    └──────── release / force ──────────┘      │ steal(other)
//!                                               ▼
//!                                   Held(other, now)
//! ```
//!
//! Leases never expire. Every transition out of `Held` appends exactly one
//! [`UsageRecord`] to the embedded [`HistoryLedger`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{HistoryLedger, UsageRecord};

/// Current holder state. The holder and timestamp are set together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LeaseState {
    #[default]
    Free,
    Held {
        holder: String,
        held_since: DateTime<Utc>,
    },
}

impl LeaseState {
    /// Build a state from a nullable holder/timestamp pair.
    ///
    /// A holder without a timestamp (or the reverse) is not a valid lease and
    /// yields `None`.
    #[must_use]
    pub fn from_parts(holder: Option<String>, held_since: Option<DateTime<Utc>>) -> Option<Self> {
        match (holder, held_since) {
            (Some(holder), Some(held_since)) => Some(Self::Held { holder, held_since }),
            (None, None) => Some(Self::Free),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_held(&self) -> bool {
        matches!(self, Self::Held { .. })
    }

    #[must_use]
    pub fn holder(&self) -> Option<&str> {
        match self {
            Self::Held { holder, .. } => Some(holder.as_str()),
            Self::Free => None,
        }
    }

    #[must_use]
    pub const fn held_since(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Held { held_since, .. } => Some(*held_since),
            Self::Free => None,
        }
    }
}

/// Point-in-time view of a lease for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseStatus {
    pub is_taken: bool,
    pub holder: Option<String>,
    pub held_since: Option<DateTime<Utc>>,
}

impl From<&LeaseState> for LeaseStatus {
    fn from(state: &LeaseState) -> Self {
        Self {
            is_taken: state.is_held(),
            holder: state.holder().map(str::to_string),
            held_since: state.held_since(),
        }
    }
}

/// What a steal displaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Displaced {
    pub previous_holder: Option<String>,
    pub previous_held_since: Option<DateTime<Utc>>,
}

/// Lease plus its usage history.
#[derive(Debug, Clone, Default)]
pub struct Lease {
    state: LeaseState,
    ledger: HistoryLedger,
}

impl Lease {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease if nobody holds it.
    ///
    /// Not reentrant: the current holder asking again also gets `false` and
    /// the timestamp is left alone.
    pub fn try_acquire(&mut self, holder: &str) -> bool {
        self.try_acquire_at(holder, Utc::now())
    }

    pub fn try_acquire_at(&mut self, holder: &str, now: DateTime<Utc>) -> bool {
        if self.state.is_held() {
            return false;
        }
        self.state = LeaseState::Held {
            holder: holder.to_string(),
            held_since: now,
        };
        true
    }

    /// Reassign the lease unconditionally.
    pub fn steal(&mut self, new_holder: &str) -> Displaced {
        self.steal_at(new_holder, Utc::now())
    }

    pub fn steal_at(&mut self, new_holder: &str, now: DateTime<Utc>) -> Displaced {
        let previous = std::mem::replace(
            &mut self.state,
            LeaseState::Held {
                holder: new_holder.to_string(),
                held_since: now,
            },
        );

        match previous {
            LeaseState::Held { holder, held_since } => {
                self.ledger
                    .append(UsageRecord::stolen(holder.clone(), held_since, now, new_holder));
                Displaced {
                    previous_holder: Some(holder),
                    previous_held_since: Some(held_since),
                }
            }
            LeaseState::Free => Displaced::default(),
        }
    }

    /// Release the lease.
    ///
    /// With `Some(holder)` only that holder may release. Returns `false` when
    /// the lease is free or held by someone else; nothing changes in that case.
    pub fn release(&mut self, holder: Option<&str>) -> bool {
        self.release_at(holder, Utc::now())
    }

    pub fn release_at(&mut self, holder: Option<&str>, now: DateTime<Utc>) -> bool {
        let allowed = match (&self.state, holder) {
            (LeaseState::Free, _) => false,
            (LeaseState::Held { .. }, None) => true,
            (LeaseState::Held { holder: current, .. }, Some(requested)) => current == requested,
        };
        if !allowed {
            return false;
        }

        if let LeaseState::Held { holder, held_since } = std::mem::take(&mut self.state) {
            self.ledger
                .append(UsageRecord::released(holder, held_since, now));
        }
        true
    }

    /// Release without a holder check.
    pub fn force_release(&mut self) -> bool {
        self.release(None)
    }

    pub fn force_release_at(&mut self, now: DateTime<Utc>) -> bool {
        self.release_at(None, now)
    }

    #[must_use]
    pub fn current_holder(&self) -> Option<&str> {
        self.state.holder()
    }

    #[must_use]
    pub fn snapshot(&self) -> LeaseStatus {
        LeaseStatus::from(&self.state)
    }

    #[must_use]
    pub const fn state(&self) -> &LeaseState {
        &self.state
    }

    #[must_use]
    pub const fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    /// Newest-first history; see [`HistoryLedger::recent`].
    #[must_use]
    pub fn history(&self, limit: Option<usize>) -> Vec<UsageRecord> {
        self.ledger.recent(limit)
    }

    /// Overwrite the holder state with a persisted one. Used only at startup.
    pub(crate) fn restore(&mut self, state: LeaseState) {
        self.state = state;
    }

    /// Replace the ledger with persisted history. Used only at startup.
    pub(crate) fn restore_history(&mut self, ledger: HistoryLedger) {
        self.ledger = ledger;
    }
}
