//! Progress reporting abstractions for the create workflow

use kismatic_provision_common::{ProvisionedNode, Role};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Workflow phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Provisioning,
    WaitingForSsh,
    WritingPlan,
    StagingPlan,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Provisioning => "provisioning droplets",
            Phase::WaitingForSsh => "waiting for SSH",
            Phase::WritingPlan => "writing plan",
            Phase::StagingPlan => "staging plan",
            Phase::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Trait for reporting workflow progress
///
/// Lets the same workflow drive plain logging or another front end.
pub trait ProgressReporter: Send + Sync {
    /// Report a phase change
    fn report_phase(&self, phase: Phase);

    /// Report a node that has been created and is active
    fn report_node_provisioned(&self, role: Role, node: &ProvisionedNode);

    /// Report a node accepting SSH sessions
    fn report_node_ready(&self, node_id: &str, elapsed: Duration);

    /// Report a condition that does not fail the run
    fn report_warning(&self, message: &str);
}

/// Progress reporter that logs through `tracing`
#[derive(Debug, Default)]
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for LogReporter {
    fn report_phase(&self, phase: Phase) {
        info!(phase = %phase, "Workflow phase");
    }

    fn report_node_provisioned(&self, role: Role, node: &ProvisionedNode) {
        info!(
            role = %role,
            node = %node.id,
            public_ip = %node.public_ipv4,
            private_ip = %node.private_ipv4,
            "Node provisioned"
        );
    }

    fn report_node_ready(&self, node_id: &str, elapsed: Duration) {
        info!(node = %node_id, elapsed_secs = elapsed.as_secs(), "Node accepting SSH sessions");
    }

    fn report_warning(&self, message: &str) {
        warn!("{}", message);
    }
}
