//! Leasehold-core - exclusive leases on shared QA resources
//!
//! This crate provides:
//! - The resource catalog (publishers and staging environments)
//! - The per-resource lease state machine and usage history
//! - `SQLite` persistence with startup rehydration
//! - Layered configuration and holder identity

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod identity;
pub mod lease;
pub mod ledger;
pub mod registry;
pub mod resource;
pub mod store;

pub use config::{load_config, Config, LoadOptions};
pub use error::{Error, Result};
pub use identity::{resolve_holder, validate_holder};
pub use lease::{Displaced, Lease, LeaseState, LeaseStatus};
pub use ledger::{HistoryLedger, ReleaseReason, UsageRecord};
pub use registry::{
    AggregateStatus, HydrateReport, LeaseOutcome, PersistenceHealth, ResourceRegistry,
    StealOutcome,
};
pub use resource::{Category, Metadata, Resource, ResourceInfo};
pub use store::{LeaseStore, PersistedRecord};
