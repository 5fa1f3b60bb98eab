//! SSH identity resolution
//!
//! The key pair is resolved once per run and shared by droplet creation
//! (public half uploaded to the provider), readiness polling and plan
//! staging (private half).

use crate::error::ProvisionError;
use kismatic_provision_common::defaults::DEFAULT_SSH_KEY_FILE;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved SSH key pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshIdentity {
    /// Private key file
    pub private_key: PathBuf,
    /// Public key file (`<private>.pub`)
    pub public_key: PathBuf,
    /// Key name; the file name of the private key
    pub key_name: String,
}

impl SshIdentity {
    /// Resolve the key pair from an explicit path, or from `ssh/cluster.pem`
    /// next to the running executable.
    ///
    /// A missing or loosely-permissioned private key and a missing public key
    /// are fatal preconditions.
    pub fn resolve(override_path: Option<&Path>) -> Result<Self, ProvisionError> {
        let path = match override_path {
            Some(p) => p.to_path_buf(),
            None => default_key_path(),
        };
        Self::from_private_key(path)
    }

    /// Build an identity from a private key path, validating both halves.
    pub fn from_private_key(private_key: PathBuf) -> Result<Self, ProvisionError> {
        if !private_key.is_file() {
            return Err(ProvisionError::MissingKeyFile { path: private_key });
        }
        check_permissions(&private_key)?;

        let public_key = public_key_path(&private_key);
        if !public_key.is_file() {
            return Err(ProvisionError::MissingPublicKey { path: public_key });
        }

        let key_name = key_name(&private_key);
        debug!(key = %private_key.display(), key_name = %key_name, "Resolved SSH identity");

        Ok(Self {
            private_key,
            public_key,
            key_name,
        })
    }
}

/// `<exe dir>/ssh/cluster.pem`, falling back to the working directory when
/// the executable path is unavailable.
pub fn default_key_path() -> PathBuf {
    let dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join("ssh").join(DEFAULT_SSH_KEY_FILE)
}

/// Key name derived from a private key path
pub fn key_name(private_key: &Path) -> String {
    private_key
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_SSH_KEY_FILE.to_string())
}

/// `<private>.pub`
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut s = private_key.as_os_str().to_owned();
    s.push(".pub");
    PathBuf::from(s)
}

#[cfg(unix)]
fn check_permissions(path: &Path) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)
        .map_err(|_| ProvisionError::MissingKeyFile {
            path: path.to_path_buf(),
        })?
        .permissions()
        .mode()
        & 0o777;
    if mode & 0o077 != 0 {
        return Err(ProvisionError::InsecureKeyPermissions {
            path: path.to_path_buf(),
            mode,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> Result<(), ProvisionError> {
    Ok(())
}
