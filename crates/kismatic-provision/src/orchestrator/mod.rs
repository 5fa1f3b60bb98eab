//! Create and delete workflows
//!
//! `create`: validate, provision, wait for SSH, then either report the
//! inventory or assemble, write and stage the plan. Every fallible step
//! before the plan file is written is fatal; staging is not.

pub mod progress;

pub use progress::{LogReporter, Phase, ProgressReporter};

use crate::artifact::ArtifactAllocator;
use crate::config::{CreateConfig, DeleteConfig, DigitalOceanConfig};
use crate::credentials::CredentialGenerator;
use crate::error::ProvisionError;
use crate::identity::SshIdentity;
use crate::plan::{StagingOutcome, assemble_plan, render_plan, stage_plan};
use crate::provider::Provisioner;
use crate::provider::digitalocean::DigitalOceanClient;
use crate::readiness::wait_for_ssh;
use crate::remote::{OpenSshShell, RemoteShell};
use anyhow::{Context, Result, bail};
use kismatic_provision_common::{ProvisionedNode, ProvisionedTopology, Role, validate_tag};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// SSH connect timeout for probes and copies
const SSH_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What a successful create run produced
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub topology: ProvisionedTopology,
    /// Local plan file; `None` in no-plan mode
    pub plan_path: Option<PathBuf>,
    /// Staging result; `None` without a bootstrap node or plan
    pub staging: Option<StagingOutcome>,
}

impl CreateOutcome {
    /// Text shown to the operator once the run finishes
    pub fn summary(&self) -> String {
        match &self.plan_path {
            None => format!("Your instances are ready.\n\n{}", format_inventory(&self.topology)),
            Some(path) => format!(
                "To install your cluster, run:\n./kismatic install apply -f {}\n",
                path.display()
            ),
        }
    }
}

/// Refuse requests that could never produce a plan, before anything is created.
fn preflight(config: &CreateConfig) -> Result<(), ProvisionError> {
    validate_tag(&config.topology.tag)?;
    if !config.flags.no_plan {
        let counts = config.topology.counts();
        for role in [Role::Master, Role::Worker] {
            if counts.get(role) == 0 {
                return Err(ProvisionError::EmptyRole { role });
            }
        }
    }
    Ok(())
}

/// Run the create workflow against any provider and shell.
#[instrument(skip_all, fields(tag = %config.topology.tag))]
pub async fn create_cluster<P, S, R>(
    provider: &P,
    shell: &S,
    identity: &SshIdentity,
    config: &CreateConfig,
    passwords: &mut CredentialGenerator,
    cancel: Option<&CancellationToken>,
    reporter: &R,
) -> Result<CreateOutcome>
where
    P: Provisioner,
    S: RemoteShell,
    R: ProgressReporter,
{
    preflight(config)?;
    let cancel = cancel.cloned().unwrap_or_default();

    reporter.report_phase(Phase::Provisioning);
    let topology = provider
        .provision(&config.topology, identity, cancel.clone())
        .await
        .context("Failed to provision droplets")?;

    if !topology.satisfies(&config.topology) {
        bail!(
            "provider returned {:?} nodes but {:?} were requested",
            topology.counts(),
            config.topology.counts()
        );
    }
    for role in Role::ALL {
        for node in topology.nodes(role) {
            reporter.report_node_provisioned(role, node);
        }
    }

    reporter.report_phase(Phase::WaitingForSsh);
    let nodes: Vec<ProvisionedNode> = topology.all_nodes().cloned().collect();
    wait_for_ssh(shell, &nodes, &config.readiness, Some(&cancel), reporter).await?;

    if config.flags.no_plan {
        reporter.report_phase(Phase::Complete);
        return Ok(CreateOutcome {
            topology,
            plan_path: None,
            staging: None,
        });
    }

    reporter.report_phase(Phase::WritingPlan);
    let password = passwords.generate();
    if password.is_sentinel() {
        reporter.report_warning(
            "Could not generate a strong admin password; the plan uses a placeholder. Change it before installing.",
        );
    }
    let plan = assemble_plan(&topology, &config.plan, &identity.key_name, password)?;
    let document = render_plan(&plan)?;

    let plan_path = ArtifactAllocator::plan_file(&config.flags.output_dir)
        .allocate()?
        .write_contents(document.as_bytes())
        .context("Failed to write plan")?;
    info!(path = %plan_path.display(), "Wrote plan file");

    let staging = match topology.bootstrap.first() {
        Some(bootstrap) => {
            reporter.report_phase(Phase::StagingPlan);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => StagingOutcome::Failed("cancelled".to_string()),
                outcome = stage_plan(shell, bootstrap, &plan_path, config.install_dir()) => outcome,
            };
            if let StagingOutcome::Failed(reason) = &outcome {
                reporter.report_warning(&format!(
                    "Unable to copy the plan to bootstrap node {}: {reason}",
                    bootstrap.id
                ));
            }
            Some(outcome)
        }
        None => None,
    };

    reporter.report_phase(Phase::Complete);
    Ok(CreateOutcome {
        topology,
        plan_path: Some(plan_path),
        staging,
    })
}

/// Run the delete-all workflow.
#[instrument(skip_all, fields(tag = %config.tag))]
pub async fn delete_cluster<P: Provisioner>(provider: &P, config: &DeleteConfig) -> Result<()> {
    validate_tag(&config.tag).map_err(ProvisionError::from)?;
    provider
        .terminate(&config.tag, config.key_to_remove())
        .await
        .with_context(|| format!("Failed to delete droplets tagged '{}'", config.tag))
}

/// Create a cluster on DigitalOcean using the system SSH client.
pub async fn run_create(
    config: CreateConfig,
    provider_config: DigitalOceanConfig,
    cancel: CancellationToken,
) -> Result<CreateOutcome> {
    let identity = SshIdentity::resolve(config.ssh_key_path.as_deref())?;
    let provider = DigitalOceanClient::new(provider_config)?;
    let shell = OpenSshShell::new(&identity.private_key, SSH_CONNECT_TIMEOUT);
    let mut passwords = CredentialGenerator::from_entropy();

    create_cluster(
        &provider,
        &shell,
        &identity,
        &config,
        &mut passwords,
        Some(&cancel),
        &LogReporter::new(),
    )
    .await
}

/// Delete every droplet with the configured tag on DigitalOcean.
pub async fn run_delete(config: DeleteConfig, provider_config: DigitalOceanConfig) -> Result<()> {
    let provider = DigitalOceanClient::new(provider_config)?;
    delete_cluster(&provider, &config).await
}

/// Per-role node listing: `id (public, private)`
pub fn format_inventory(topology: &ProvisionedTopology) -> String {
    let mut out = String::new();
    for role in Role::ALL {
        let _ = writeln!(out, "{}:", role.title());
        for node in topology.nodes(role) {
            let _ = writeln!(
                out,
                "  {} ({}, {})",
                node.id, node.public_ipv4, node.private_ipv4
            );
        }
    }
    out
}
