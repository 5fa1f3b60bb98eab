//! Typed errors for the provisioning workflow
//!
//! These cover the fatal preconditions and the failures the workflow itself
//! detects. Provider and transport errors keep their own types and travel
//! through `anyhow` unchanged.

use kismatic_provision_common::{Role, TagError, TopologyError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The SSH private key file does not exist
    #[error(
        "private SSH key not found at '{}'. Create a key pair, point {} at it \
         and restrict its permissions (chmod 600)",
        path.display(),
        kismatic_provision_common::defaults::ENV_SSH_KEY_PATH
    )]
    MissingKeyFile { path: PathBuf },

    /// The SSH private key is readable by group or others
    #[error(
        "private SSH key '{}' has mode {mode:o}; it must not be accessible by group or others (chmod 600)",
        path.display()
    )]
    InsecureKeyPermissions { path: PathBuf, mode: u32 },

    /// The public half of the key pair is missing
    #[error("public SSH key not found at '{}'", path.display())]
    MissingPublicKey { path: PathBuf },

    /// Plan assembly needs at least one node of the role
    #[error("cannot build a plan without at least one {role} node")]
    EmptyRole { role: Role },

    /// Some nodes never accepted an SSH session before the deadline
    #[error("timed out after {timeout:?} waiting for SSH on: {}", nodes.join(", "))]
    ReadinessTimeout { timeout: Duration, nodes: Vec<String> },

    /// No free plan file name within the attempt limit
    #[error("no free file name for '{base}.{extension}' after {attempts} attempts")]
    ArtifactNamesExhausted {
        base: String,
        extension: String,
        attempts: u32,
    },

    #[error(transparent)]
    InvalidTag(#[from] TagError),

    #[error(transparent)]
    InvalidTopology(#[from] TopologyError),
}

impl ProvisionError {
    /// Names of the unreachable nodes, for a readiness timeout
    pub fn unready_nodes(&self) -> Option<&[String]> {
        match self {
            ProvisionError::ReadinessTimeout { nodes, .. } => Some(nodes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProvisionError::EmptyRole { role: Role::Worker }.to_string(),
            "cannot build a plan without at least one worker node"
        );

        let err = ProvisionError::ReadinessTimeout {
            timeout: Duration::from_secs(5),
            nodes: vec!["a-master-1".to_string(), "a-worker-1".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "timed out after 5s waiting for SSH on: a-master-1, a-worker-1"
        );
        assert_eq!(err.unready_nodes().map(|n| n.len()), Some(2));
    }

    #[test]
    fn test_key_errors_name_path() {
        let err = ProvisionError::MissingKeyFile {
            path: PathBuf::from("/tmp/ssh/cluster.pem"),
        };
        assert!(err.to_string().contains("/tmp/ssh/cluster.pem"));
        assert!(err.to_string().contains("DO_SECRET_ACCESS_KEY"));

        let err = ProvisionError::InsecureKeyPermissions {
            path: PathBuf::from("k.pem"),
            mode: 0o644,
        };
        assert!(err.to_string().contains("644"));
    }
}
