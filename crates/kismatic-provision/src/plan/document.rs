//! Kismatic plan file rendering
//!
//! The plan is rendered by serializing a document that mirrors the Kismatic
//! plan schema. Fixed cluster settings (networking, certificates, ports)
//! are the values the installer expects for a fresh overlay-network cluster.

use super::assemble::ConfigurationPlan;
use anyhow::{Context, Result};
use kismatic_provision_common::ProvisionedNode;
use kismatic_provision_common::defaults::DEFAULT_SSH_PORT;
use serde::Serialize;

const CLUSTER_NAME: &str = "kubernetes";
const NETWORK_TYPE: &str = "overlay";
const POD_CIDR_BLOCK: &str = "172.16.0.0/16";
const SERVICE_CIDR_BLOCK: &str = "172.20.0.0/16";
const CERTIFICATE_EXPIRY: &str = "17520h";

#[derive(Debug, Serialize)]
struct PlanDocument<'a> {
    cluster: Cluster<'a>,
    etcd: NodeGroup<'a>,
    master: MasterNodeGroup<'a>,
    worker: NodeGroup<'a>,
    ingress: NodeGroup<'a>,
    storage: NodeGroup<'a>,
}

#[derive(Debug, Serialize)]
struct Cluster<'a> {
    name: &'a str,
    admin_password: &'a str,
    allow_package_installation: bool,
    networking: Networking<'a>,
    certificates: Certificates<'a>,
    ssh: Ssh<'a>,
}

#[derive(Debug, Serialize)]
struct Networking<'a> {
    #[serde(rename = "type")]
    network_type: &'a str,
    pod_cidr_block: &'a str,
    service_cidr_block: &'a str,
    update_hosts_files: bool,
}

#[derive(Debug, Serialize)]
struct Certificates<'a> {
    expiry: &'a str,
}

#[derive(Debug, Serialize)]
struct Ssh<'a> {
    user: &'a str,
    ssh_key: &'a str,
    ssh_port: u16,
}

#[derive(Debug, Serialize)]
struct NodeGroup<'a> {
    expected_count: usize,
    nodes: Vec<Node<'a>>,
}

#[derive(Debug, Serialize)]
struct MasterNodeGroup<'a> {
    expected_count: usize,
    load_balanced_fqdn: &'a str,
    load_balanced_short_name: &'a str,
    nodes: Vec<Node<'a>>,
}

#[derive(Debug, Serialize)]
struct Node<'a> {
    host: &'a str,
    ip: &'a str,
    internal_ip: &'a str,
}

impl<'a> NodeGroup<'a> {
    fn new(nodes: &'a [ProvisionedNode]) -> Self {
        Self {
            expected_count: nodes.len(),
            nodes: nodes.iter().map(Node::from).collect(),
        }
    }
}

impl<'a> From<&'a ProvisionedNode> for Node<'a> {
    fn from(node: &'a ProvisionedNode) -> Self {
        Self {
            host: &node.id,
            ip: &node.public_ipv4,
            internal_ip: &node.private_ipv4,
        }
    }
}

/// Render the plan as Kismatic plan YAML.
pub fn render_plan(plan: &ConfigurationPlan) -> Result<String> {
    let doc = PlanDocument {
        cluster: Cluster {
            name: CLUSTER_NAME,
            admin_password: plan.admin_password.as_str(),
            allow_package_installation: true,
            networking: Networking {
                network_type: NETWORK_TYPE,
                pod_cidr_block: POD_CIDR_BLOCK,
                service_cidr_block: SERVICE_CIDR_BLOCK,
                update_hosts_files: false,
            },
            certificates: Certificates {
                expiry: CERTIFICATE_EXPIRY,
            },
            ssh: Ssh {
                user: &plan.ssh_user,
                ssh_key: &plan.ssh_key_file,
                ssh_port: DEFAULT_SSH_PORT,
            },
        },
        etcd: NodeGroup::new(&plan.etcd),
        master: MasterNodeGroup {
            expected_count: plan.master.len(),
            load_balanced_fqdn: &plan.master_endpoint,
            load_balanced_short_name: &plan.master_endpoint,
            nodes: plan.master.iter().map(Node::from).collect(),
        },
        worker: NodeGroup::new(&plan.worker),
        ingress: NodeGroup::new(&plan.ingress),
        storage: NodeGroup::new(&plan.storage),
    };

    serde_yaml::to_string(&doc).context("Failed to render plan document")
}
