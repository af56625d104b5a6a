//! Shared OAM topology domain primitives.
//!
//! This crate owns deterministic declaration building: configuration
//! contracts, the resource-type allow-list, sink policy documents, identifier
//! generation and the region × account expansion. It excludes AWS SDK and
//! credential concerns, which live in `oam_topology_deploy`.

pub mod contract;
pub mod identifiers;
pub mod manifest;
pub mod policy;
pub mod resource_types;
pub mod topology;
