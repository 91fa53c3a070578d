//! Leasehold - command-line access to shared QA resource leases
//!
//! Take, steal and release publishers and staging environments from a shell.

pub mod cli;
pub mod commands;
