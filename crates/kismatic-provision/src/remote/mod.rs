//! Remote shell access to provisioned nodes
//!
//! Readiness polling and plan staging both go through [`RemoteShell`], so
//! the workflow can be exercised without real machines.

mod openssh;

pub use openssh::OpenSshShell;

use anyhow::Result;
use kismatic_provision_common::ProvisionedNode;
use kismatic_provision_common::defaults::DEFAULT_SSH_PORT;
use std::path::Path;
use thiserror::Error;

/// Where to open an SSH session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port: DEFAULT_SSH_PORT,
        }
    }
}

impl From<&ProvisionedNode> for SshTarget {
    fn from(node: &ProvisionedNode) -> Self {
        Self::new(node.public_ipv4.clone(), node.ssh_user.clone())
    }
}

/// Why a probe session did not come up
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("connection refused")]
    ConnectionRefused,

    #[error("SSH handshake failed: {0}")]
    Handshake(String),

    #[error("authentication rejected")]
    AuthRejected,

    #[error("connection timed out")]
    TimedOut,

    /// The local SSH client could not be run at all
    #[error("failed to launch ssh: {0}")]
    Launch(String),
}

impl ProbeError {
    /// Fatal errors end readiness polling; everything else means "not yet".
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::Launch(_))
    }
}

/// SSH operations against a provisioned node.
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait RemoteShell: Send + Sync {
    /// Open a session, run a no-op command and close it
    async fn probe(&self, target: &SshTarget) -> Result<(), ProbeError>;

    /// Copy a local file to `remote_path` on the target
    async fn copy_file(&self, target: &SshTarget, local: &Path, remote_path: &str) -> Result<()>;
}
