//! Waiting for provisioned nodes to accept SSH sessions
//!
//! Every node is polled concurrently with its own backoff schedule. Probe
//! failures that mean "not up yet" (refused, reset, auth not yet installed,
//! timed out) are retried until a shared deadline; only failures to run the
//! SSH client at all end the wait early.

use crate::error::ProvisionError;
use crate::orchestrator::progress::ProgressReporter;
use crate::remote::{ProbeError, RemoteShell, SshTarget};
use crate::wait::{WaitConfig, wait_for_resource};
use anyhow::{Result, bail};
use futures::stream::{FuturesUnordered, StreamExt};
use kismatic_provision_common::ProvisionedNode;
use kismatic_provision_common::defaults::DEFAULT_READINESS_TIMEOUT_SECS;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Polling schedule for [`wait_for_ssh`]
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Deadline for all nodes, measured from the start of the wait
    pub timeout: Duration,
    /// Delay after the first failed probe
    pub initial_delay: Duration,
    /// Cap for the exponential backoff
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_READINESS_TIMEOUT_SECS),
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(15),
            jitter: true,
        }
    }
}

impl ReadinessConfig {
    fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            timeout: self.timeout,
            jitter: self.jitter,
        }
    }
}

/// Block until every node accepts an SSH session.
///
/// Fails with [`ProvisionError::ReadinessTimeout`] naming the nodes that
/// were still unreachable at the deadline.
pub async fn wait_for_ssh<S, R>(
    shell: &S,
    nodes: &[ProvisionedNode],
    config: &ReadinessConfig,
    cancel: Option<&CancellationToken>,
    reporter: &R,
) -> Result<()>
where
    S: RemoteShell,
    R: ProgressReporter,
{
    if nodes.is_empty() {
        return Ok(());
    }

    info!(
        nodes = nodes.len(),
        timeout_secs = config.timeout.as_secs(),
        "Waiting for SSH on all nodes"
    );

    let start = Instant::now();
    let mut pending: BTreeSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let mut futures: FuturesUnordered<_> = nodes
        .iter()
        .map(|node| {
            let target = SshTarget::from(node);
            let wait_config = config.wait_config();
            async move {
                let target = &target;
                let result = wait_for_resource(
                    wait_config,
                    cancel,
                    move || async move { probe_once(shell, target).await },
                    &node.id,
                )
                .await;
                (node, result)
            }
        })
        .collect();

    while let Some((node, result)) = futures.next().await {
        match result {
            Ok(()) => {
                pending.remove(node.id.as_str());
                reporter.report_node_ready(&node.id, start.elapsed());
            }
            Err(e) => {
                if let Some(probe) = e.downcast_ref::<ProbeError>()
                    && probe.is_fatal()
                {
                    return Err(e.context(format!("SSH probe of {} failed", node.id)));
                }
                debug!(node = %node.id, error = %e, "Node did not become reachable");
            }
        }
    }

    if let Some(token) = cancel
        && token.is_cancelled()
    {
        bail!("Wait for SSH cancelled");
    }

    if !pending.is_empty() {
        return Err(ProvisionError::ReadinessTimeout {
            timeout: config.timeout,
            nodes: pending.into_iter().map(str::to_string).collect(),
        }
        .into());
    }

    info!(elapsed_secs = start.elapsed().as_secs(), "All nodes accepting SSH sessions");
    Ok(())
}

async fn probe_once<S: RemoteShell>(shell: &S, target: &SshTarget) -> Result<bool> {
    match shell.probe(target).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            debug!(host = %target.host, reason = %e, "SSH not ready");
            Ok(false)
        }
    }
}
