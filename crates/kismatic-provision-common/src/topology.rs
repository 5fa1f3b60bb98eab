//! Cluster topology types
//!
//! A [`TopologyRequest`] says how many nodes of each [`Role`] to create and
//! how to create them. The provisioning gateway turns it into a
//! [`ProvisionedTopology`] whose role lists have exactly the requested sizes.

use crate::defaults::{
    DEFAULT_CLUSTER_TAG, DEFAULT_IMAGE, DEFAULT_INSTANCE_SIZE, DEFAULT_REGION, DEFAULT_SSH_USER,
    DEFAULT_WORKER_SIZE,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Cluster role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Etcd,
    Master,
    Worker,
    Bootstrap,
}

impl Role {
    /// All roles, in the order nodes are created and reported
    pub const ALL: [Role; 4] = [Role::Etcd, Role::Master, Role::Worker, Role::Bootstrap];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Etcd => "etcd",
            Role::Master => "master",
            Role::Worker => "worker",
            Role::Bootstrap => "bootstrap",
        }
    }

    /// Human-readable title used in inventory output
    pub fn title(&self) -> &'static str {
        match self {
            Role::Etcd => "Etcd",
            Role::Master => "Master",
            Role::Worker => "Worker",
            Role::Bootstrap => "Bootstrap",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors for malformed topology requests
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("topology request must ask for at least one node")]
    NoNodes,
}

/// Number of nodes per role. Counts are independent of each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCounts {
    pub etcd: u16,
    pub master: u16,
    pub worker: u16,
    pub bootstrap: u16,
}

impl NodeCounts {
    pub fn new(etcd: u16, master: u16, worker: u16, bootstrap: u16) -> Self {
        Self {
            etcd,
            master,
            worker,
            bootstrap,
        }
    }

    pub fn get(&self, role: Role) -> u16 {
        match role {
            Role::Etcd => self.etcd,
            Role::Master => self.master,
            Role::Worker => self.worker,
            Role::Bootstrap => self.bootstrap,
        }
    }

    /// Total number of nodes across all roles
    pub fn total(&self) -> usize {
        Role::ALL.iter().map(|r| self.get(*r) as usize).sum()
    }
}

/// Immutable description of the nodes to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRequest {
    counts: NodeCounts,
    /// Droplet size for etcd, master and bootstrap nodes
    pub size: String,
    /// Droplet size for worker nodes
    pub worker_size: String,
    /// Image slug
    pub image: String,
    /// Region slug
    pub region: String,
    /// Cluster tag applied to every node
    pub tag: String,
    /// Remote login user on every node
    pub ssh_user: String,
}

impl TopologyRequest {
    /// Create a request with default provisioning parameters.
    ///
    /// Fails when every count is zero.
    pub fn new(counts: NodeCounts) -> Result<Self, TopologyError> {
        if counts.total() == 0 {
            return Err(TopologyError::NoNodes);
        }
        Ok(Self {
            counts,
            size: DEFAULT_INSTANCE_SIZE.to_string(),
            worker_size: DEFAULT_WORKER_SIZE.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            region: DEFAULT_REGION.to_string(),
            tag: DEFAULT_CLUSTER_TAG.to_string(),
            ssh_user: DEFAULT_SSH_USER.to_string(),
        })
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_worker_size(mut self, size: impl Into<String>) -> Self {
        self.worker_size = size.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_ssh_user(mut self, user: impl Into<String>) -> Self {
        self.ssh_user = user.into();
        self
    }

    pub fn counts(&self) -> NodeCounts {
        self.counts
    }

    /// Droplet size for a node of the given role
    pub fn size_for(&self, role: Role) -> &str {
        match role {
            Role::Worker => &self.worker_size,
            _ => &self.size,
        }
    }
}

/// One created machine. Read-only once the gateway hands it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedNode {
    /// Stable identifier (the droplet hostname)
    pub id: String,
    pub public_ipv4: String,
    pub private_ipv4: String,
    pub ssh_user: String,
}

/// Provisioned nodes grouped by role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedTopology {
    pub etcd: Vec<ProvisionedNode>,
    pub master: Vec<ProvisionedNode>,
    pub worker: Vec<ProvisionedNode>,
    pub bootstrap: Vec<ProvisionedNode>,
}

impl ProvisionedTopology {
    pub fn nodes(&self, role: Role) -> &[ProvisionedNode] {
        match role {
            Role::Etcd => &self.etcd,
            Role::Master => &self.master,
            Role::Worker => &self.worker,
            Role::Bootstrap => &self.bootstrap,
        }
    }

    pub fn push(&mut self, role: Role, node: ProvisionedNode) {
        match role {
            Role::Etcd => self.etcd.push(node),
            Role::Master => self.master.push(node),
            Role::Worker => self.worker.push(node),
            Role::Bootstrap => self.bootstrap.push(node),
        }
    }

    /// Every node, flattened across roles in role order
    pub fn all_nodes(&self) -> impl Iterator<Item = &ProvisionedNode> {
        Role::ALL
            .into_iter()
            .flat_map(move |r| self.nodes(r).iter())
    }

    pub fn counts(&self) -> NodeCounts {
        NodeCounts {
            etcd: self.etcd.len() as u16,
            master: self.master.len() as u16,
            worker: self.worker.len() as u16,
            bootstrap: self.bootstrap.len() as u16,
        }
    }

    /// Whether every role list has the size the request asked for
    pub fn satisfies(&self, request: &TopologyRequest) -> bool {
        self.counts() == request.counts()
    }
}
