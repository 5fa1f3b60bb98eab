//! kismatic-provision-common - Shared types and constants
//!
//! This crate holds the provider-independent pieces of the provisioner,
//! without any HTTP or process dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values and environment variable names
//! - [`tags`]: Cluster tag validation and node naming
//! - [`topology`]: Node roles, topology requests and provisioned topologies

pub mod defaults;
pub mod tags;
pub mod topology;

// Re-export commonly used types
pub use tags::{TagError, node_name, validate_tag};
pub use topology::{
    NodeCounts, ProvisionedNode, ProvisionedTopology, Role, TopologyError, TopologyRequest,
};
