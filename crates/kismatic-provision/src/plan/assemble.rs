//! Building the configuration plan from a provisioned topology

use crate::credentials::AdminPassword;
use crate::error::ProvisionError;
use kismatic_provision_common::defaults::DEFAULT_INSTALL_DIR;
use kismatic_provision_common::{ProvisionedNode, ProvisionedTopology, Role};

/// Operator options that shape the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    /// Assign the storage role to every worker
    pub storage_cluster: bool,
    /// Install directory on the bootstrap node
    pub install_dir: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            storage_cluster: false,
            install_dir: DEFAULT_INSTALL_DIR.to_string(),
        }
    }
}

/// Everything the Kismatic installer needs to know about the new cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationPlan {
    pub admin_password: AdminPassword,
    pub etcd: Vec<ProvisionedNode>,
    pub master: Vec<ProvisionedNode>,
    pub worker: Vec<ProvisionedNode>,
    /// Ingress nodes; always the first worker
    pub ingress: Vec<ProvisionedNode>,
    /// Storage nodes; every worker or none
    pub storage: Vec<ProvisionedNode>,
    /// Public address of the first master, used as the cluster endpoint
    pub master_endpoint: String,
    /// Path of the SSH private key on the bootstrap node
    pub ssh_key_file: String,
    pub ssh_user: String,
}

/// Join a remote directory and a file name.
pub fn remote_path(dir: &str, file_name: &str) -> String {
    if dir.is_empty() || dir.ends_with('/') {
        format!("{dir}{file_name}")
    } else {
        format!("{dir}/{file_name}")
    }
}

/// Assemble the plan.
///
/// Needs at least one master and one worker; the first of each is the
/// cluster endpoint and the ingress node respectively.
pub fn assemble_plan(
    topology: &ProvisionedTopology,
    options: &PlanOptions,
    ssh_key_name: &str,
    admin_password: AdminPassword,
) -> Result<ConfigurationPlan, ProvisionError> {
    let first_master = topology
        .master
        .first()
        .ok_or(ProvisionError::EmptyRole { role: Role::Master })?;
    let first_worker = topology
        .worker
        .first()
        .ok_or(ProvisionError::EmptyRole { role: Role::Worker })?;

    let storage = if options.storage_cluster {
        topology.worker.clone()
    } else {
        Vec::new()
    };

    let ssh_dir = remote_path(&options.install_dir, "ssh/");

    Ok(ConfigurationPlan {
        admin_password,
        etcd: topology.etcd.clone(),
        master: topology.master.clone(),
        worker: topology.worker.clone(),
        ingress: vec![first_worker.clone()],
        storage,
        master_endpoint: first_master.public_ipv4.clone(),
        ssh_key_file: remote_path(&ssh_dir, ssh_key_name),
        ssh_user: first_master.ssh_user.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn node(role: Role, i: usize) -> ProvisionedNode {
        ProvisionedNode {
            id: format!("apprenda-{role}-{i}-abc123"),
            public_ipv4: format!("203.0.113.{i}"),
            private_ipv4: format!("10.0.0.{i}"),
            ssh_user: "root".to_string(),
        }
    }

    fn topology(e: usize, m: usize, w: usize, b: usize) -> ProvisionedTopology {
        let mut topo = ProvisionedTopology::default();
        for (role, n) in [
            (Role::Etcd, e),
            (Role::Master, m),
            (Role::Worker, w),
            (Role::Bootstrap, b),
        ] {
            for i in 1..=n {
                topo.push(role, node(role, i));
            }
        }
        topo
    }

    fn password() -> AdminPassword {
        AdminPassword::Generated("abcdefghijklmnop".to_string())
    }

    #[test]
    fn test_remote_path() {
        assert_eq!(remote_path("/ket/", "kismatic-cluster.yaml"), "/ket/kismatic-cluster.yaml");
        assert_eq!(remote_path("/opt/ket", "x.yaml"), "/opt/ket/x.yaml");
        assert_eq!(remote_path("", "x.yaml"), "x.yaml");
    }

    #[test]
    fn test_assemble_without_storage() {
        let topo = topology(1, 1, 2, 1);
        let plan = assemble_plan(&topo, &PlanOptions::default(), "cluster.pem", password()).unwrap();

        assert_eq!(plan.etcd.len(), 1);
        assert_eq!(plan.master.len(), 1);
        assert_eq!(plan.worker.len(), 2);
        assert_eq!(plan.ingress, vec![topo.worker[0].clone()]);
        assert!(plan.storage.is_empty());
        assert_eq!(plan.master_endpoint, topo.master[0].public_ipv4);
        assert_eq!(plan.ssh_key_file, "/ket/ssh/cluster.pem");
        assert_eq!(plan.ssh_user, "root");
    }

    #[test]
    fn test_assemble_with_storage() {
        let topo = topology(1, 1, 2, 1);
        let options = PlanOptions {
            storage_cluster: true,
            ..Default::default()
        };
        let plan = assemble_plan(&topo, &options, "cluster.pem", password()).unwrap();
        assert_eq!(plan.storage, topo.worker);
    }

    #[test]
    fn test_custom_install_dir_moves_key_path() {
        let topo = topology(0, 1, 1, 0);
        let options = PlanOptions {
            install_dir: "/opt/ket".to_string(),
            ..Default::default()
        };
        let plan = assemble_plan(&topo, &options, "id_rsa", password()).unwrap();
        assert_eq!(plan.ssh_key_file, "/opt/ket/ssh/id_rsa");
    }

    #[test]
    fn test_missing_master_is_precondition_error() {
        let err = assemble_plan(&topology(1, 0, 2, 0), &PlanOptions::default(), "k", password())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::EmptyRole { role: Role::Master }));
    }

    #[test]
    fn test_missing_worker_is_precondition_error() {
        let err = assemble_plan(&topology(1, 1, 0, 0), &PlanOptions::default(), "k", password())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::EmptyRole { role: Role::Worker }));
    }

    proptest! {
        /// Assembly fails exactly when there is no master or no worker
        #[test]
        fn assembly_requires_master_and_worker(
            e in 0usize..4, m in 0usize..4, w in 0usize..4, b in 0usize..2
        ) {
            let result = assemble_plan(&topology(e, m, w, b), &PlanOptions::default(), "k", password());
            prop_assert_eq!(result.is_err(), m == 0 || w == 0);
        }

        /// Storage is the full worker list when enabled and empty otherwise
        #[test]
        fn storage_assignment(w in 1usize..8, storage_cluster in any::<bool>()) {
            let topo = topology(1, 1, w, 0);
            let options = PlanOptions { storage_cluster, ..Default::default() };
            let plan = assemble_plan(&topo, &options, "k", password()).unwrap();
            if storage_cluster {
                prop_assert_eq!(&plan.storage, &topo.worker);
            } else {
                prop_assert!(plan.storage.is_empty());
            }
            prop_assert_eq!(plan.ingress.len(), 1);
            prop_assert_eq!(&plan.ingress[0], &topo.worker[0]);
        }
    }
}
