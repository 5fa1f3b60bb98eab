//! Cloud provisioning gateway
//!
//! The workflow only needs two things from a cloud: turn a
//! [`TopologyRequest`] into running machines, and tear machines down by
//! tag. [`Provisioner`] is that seam; [`digitalocean`] implements it.

pub mod digitalocean;

use crate::identity::SshIdentity;
use anyhow::Result;
use kismatic_provision_common::{ProvisionedTopology, TopologyRequest};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Trait for provider operations that can be mocked in tests.
///
/// `cancel` and `remove_key` are owned to work around mockall lifetime
/// limitations.
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait Provisioner: Send + Sync {
    /// Create every requested machine and wait until each is active with
    /// both addresses assigned. Nodes come back grouped by role in creation
    /// order. Returns early with an error once `cancel` fires.
    async fn provision(
        &self,
        request: &TopologyRequest,
        identity: &SshIdentity,
        cancel: CancellationToken,
    ) -> Result<ProvisionedTopology>;

    /// Delete every machine carrying `tag`. With `remove_key` set to a
    /// public key file, also delete the registered keys with that exact
    /// public key.
    async fn terminate(&self, tag: &str, remove_key: Option<PathBuf>) -> Result<()>;
}
