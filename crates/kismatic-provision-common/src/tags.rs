//! Cluster tag rules and droplet naming
//!
//! Every droplet created for a cluster carries the cluster tag, which is
//! also the only handle `delete-all` uses to find them again.
//!
//! ## Naming Schema
//!
//! | Part | Description |
//! |------|-------------|
//! | tag | Cluster tag (e.g. `apprenda`) |
//! | role | `etcd`, `master`, `worker` or `bootstrap` |
//! | n | 1-based index within the role |
//! | suffix | Short per-run identifier |

use crate::topology::Role;
use thiserror::Error;

/// Maximum tag length accepted by DigitalOcean
pub const MAX_TAG_LENGTH: usize = 255;

/// Reasons a cluster tag is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("cluster tag cannot be empty")]
    Empty,

    #[error("cluster tag is {0} characters long, the limit is {MAX_TAG_LENGTH}")]
    TooLong(usize),

    #[error("cluster tag contains invalid character '{0}' (allowed: letters, digits, ':', '-', '_')")]
    InvalidChar(char),
}

/// Validate a cluster tag before any provider call is made
pub fn validate_tag(tag: &str) -> Result<(), TagError> {
    if tag.is_empty() {
        return Err(TagError::Empty);
    }
    if tag.len() > MAX_TAG_LENGTH {
        return Err(TagError::TooLong(tag.len()));
    }
    if let Some(c) = tag
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_')))
    {
        return Err(TagError::InvalidChar(c));
    }
    Ok(())
}

/// Build the droplet name for the `index`-th (1-based) node of a role.
///
/// Colons and underscores are not valid in hostnames, so they are folded
/// into dashes.
pub fn node_name(tag: &str, role: Role, index: usize, run_suffix: &str) -> String {
    let host_tag: String = tag
        .chars()
        .map(|c| if c == ':' || c == '_' { '-' } else { c })
        .collect();
    format!("{}-{}-{}-{}", host_tag, role.as_str(), index, run_suffix)
}
