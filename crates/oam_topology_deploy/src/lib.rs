//! AWS-oriented adapters and handlers for OAM topology deployment.
//!
//! This crate owns runtime integration details (configuration files,
//! per-account credential contexts, OAM API calls and logging) and drives
//! the declarations produced by `oam_topology_core` against AWS.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
