//! Copying the written plan onto the bootstrap node

use super::assemble::remote_path;
use crate::remote::{RemoteShell, SshTarget};
use kismatic_provision_common::ProvisionedNode;
use kismatic_provision_common::defaults::PLAN_FILE_NAME;
use std::path::Path;
use tracing::{info, warn};

/// Result of a staging attempt. Staging never fails the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingOutcome {
    /// Copied to this remote path
    Staged(String),
    /// Copy failed; the local plan file is still valid
    Failed(String),
}

impl StagingOutcome {
    pub fn is_staged(&self) -> bool {
        matches!(self, StagingOutcome::Staged(_))
    }
}

/// Copy `local_plan` to `<install_dir>kismatic-cluster.yaml` on the bootstrap node.
pub async fn stage_plan<S: RemoteShell>(
    shell: &S,
    bootstrap: &ProvisionedNode,
    local_plan: &Path,
    install_dir: &str,
) -> StagingOutcome {
    let destination = remote_path(install_dir, PLAN_FILE_NAME);
    let target = SshTarget::from(bootstrap);

    match shell.copy_file(&target, local_plan, &destination).await {
        Ok(()) => {
            info!(node = %bootstrap.id, path = %destination, "Staged plan on bootstrap node");
            StagingOutcome::Staged(destination)
        }
        Err(e) => {
            warn!(node = %bootstrap.id, error = %e, "Failed to stage plan on bootstrap node");
            StagingOutcome::Failed(format!("{e:#}"))
        }
    }
}
