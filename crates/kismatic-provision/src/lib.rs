//! kismatic-provision - DigitalOcean machines for a Kismatic cluster
//!
//! Creates etcd, master, worker and bootstrap droplets, waits until each
//! accepts SSH sessions, then writes a Kismatic plan file describing them
//! and copies it onto the bootstrap node.

pub mod artifact;
pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod plan;
pub mod provider;
pub mod readiness;
pub mod remote;
pub mod wait;

pub use error::ProvisionError;
