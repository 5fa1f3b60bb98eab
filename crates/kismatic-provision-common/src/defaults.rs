//! Default configuration values shared by the library and the CLI
//!
//! Flag names and env variables are part of the CLI contract; scripts
//! that drive `create` and `delete-all` depend on them.

/// Environment variable holding the DigitalOcean API token
pub const ENV_API_TOKEN: &str = "DO_API_TOKEN";

/// Environment variable overriding the SSH private key path
pub const ENV_SSH_KEY_PATH: &str = "DO_SECRET_ACCESS_KEY";

/// Environment variable overriding the install directory on the bootstrap node
pub const ENV_INSTALL_DIR: &str = "DO_KET_INSTALL_DIR";

/// Install directory on the bootstrap node when `DO_KET_INSTALL_DIR` is unset
pub const DEFAULT_INSTALL_DIR: &str = "/ket/";

/// Key file looked up under `<exe dir>/ssh/` when no override is given
pub const DEFAULT_SSH_KEY_FILE: &str = "cluster.pem";

/// Default cluster tag applied to every droplet
pub const DEFAULT_CLUSTER_TAG: &str = "apprenda";

/// Default droplet size for etcd, master and bootstrap nodes
pub const DEFAULT_INSTANCE_SIZE: &str = "1gb";

/// Default droplet size for worker nodes
pub const DEFAULT_WORKER_SIZE: &str = "4gb";

/// Default droplet image
pub const DEFAULT_IMAGE: &str = "ubuntu-16-04-x64";

/// Default DigitalOcean region
pub const DEFAULT_REGION: &str = "tor1";

/// Default remote login user
pub const DEFAULT_SSH_USER: &str = "root";

/// Base name of the generated plan file
pub const PLAN_BASE_NAME: &str = "kismatic-cluster";

/// Extension of the generated plan file
pub const PLAN_EXTENSION: &str = "yaml";

/// File name used when staging the plan on the bootstrap node
pub const PLAN_FILE_NAME: &str = "kismatic-cluster.yaml";

/// Upper bound on numeric suffixes tried when allocating the plan file
pub const MAX_ARTIFACT_ATTEMPTS: u32 = 4096;

/// Minimum length of the generated admin password
pub const MIN_PASSWORD_LENGTH: usize = 16;

/// Consecutive failed password generations before falling back
pub const MAX_PASSWORD_ATTEMPTS: u32 = 50;

/// Fixed password returned once generation is exhausted
pub const SENTINEL_PASSWORD: &str = "weakpassword";

/// Overall deadline for every node to accept SSH (10 minutes)
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 600;

/// Overall deadline for every droplet to become active (10 minutes)
pub const DEFAULT_ACTIVE_TIMEOUT_SECS: u64 = 600;

/// Default SSH port written into the plan
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Returns the install directory, honouring the override when it is set and non-empty
pub fn install_dir(override_dir: Option<&str>) -> String {
    match override_dir {
        Some(dir) if !dir.trim().is_empty() => dir.to_string(),
        _ => DEFAULT_INSTALL_DIR.to_string(),
    }
}
