//! Configuration types for the provisioner

use crate::identity::{default_key_path, public_key_path};
use crate::plan::PlanOptions;
use crate::readiness::ReadinessConfig;
use kismatic_provision_common::TopologyRequest;
use kismatic_provision_common::defaults::{DEFAULT_ACTIVE_TIMEOUT_SECS, DEFAULT_INSTALL_DIR};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Production API endpoint
pub const DIGITALOCEAN_API_URL: &str = "https://api.digitalocean.com";

/// DigitalOcean API access and pacing
#[derive(Clone)]
pub struct DigitalOceanConfig {
    /// Resolved API token
    pub token: String,
    /// API base URL (overridden in tests)
    pub api_url: String,
    /// Install directory created on the bootstrap droplet
    pub install_dir: String,
    /// How long a droplet may take to become active
    pub active_timeout: Duration,
    /// First delay when polling droplet status
    pub poll_initial_delay: Duration,
    /// Upper bound of the random pause between droplet create calls
    pub create_stagger: Duration,
    /// First delay when retrying a rate-limited call
    pub retry_min_delay: Duration,
    pub retry_max_times: usize,
}

impl DigitalOceanConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DIGITALOCEAN_API_URL.to_string(),
            install_dir: DEFAULT_INSTALL_DIR.to_string(),
            active_timeout: Duration::from_secs(DEFAULT_ACTIVE_TIMEOUT_SECS),
            poll_initial_delay: Duration::from_secs(2),
            create_stagger: Duration::from_millis(500),
            retry_min_delay: Duration::from_secs(2),
            retry_max_times: 6,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_install_dir(mut self, dir: impl Into<String>) -> Self {
        self.install_dir = dir.into();
        self
    }
}

impl fmt::Debug for DigitalOceanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalOceanConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("install_dir", &self.install_dir)
            .field("active_timeout", &self.active_timeout)
            .field("poll_initial_delay", &self.poll_initial_delay)
            .field("create_stagger", &self.create_stagger)
            .field("retry_min_delay", &self.retry_min_delay)
            .field("retry_max_times", &self.retry_max_times)
            .finish()
    }
}

/// Runtime behavior flags
#[derive(Debug, Clone)]
pub struct RunFlags {
    /// Print the inventory instead of writing a plan
    pub no_plan: bool,
    /// Local directory the plan file is written to
    pub output_dir: PathBuf,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            no_plan: false,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Configuration for a create run
///
/// Composed of focused sub-configs; the provider config is built separately
/// because it carries the resolved token.
#[derive(Debug, Clone)]
pub struct CreateConfig {
    pub topology: TopologyRequest,
    pub plan: PlanOptions,
    pub readiness: ReadinessConfig,
    pub flags: RunFlags,
    /// SSH private key override; `None` means `<exe dir>/ssh/cluster.pem`
    pub ssh_key_path: Option<PathBuf>,
}

impl CreateConfig {
    pub fn new(topology: TopologyRequest) -> Self {
        Self {
            topology,
            plan: PlanOptions::default(),
            readiness: ReadinessConfig::default(),
            flags: RunFlags::default(),
            ssh_key_path: None,
        }
    }

    pub fn install_dir(&self) -> &str {
        &self.plan.install_dir
    }
}

/// Configuration for a delete-all run
#[derive(Debug, Clone)]
pub struct DeleteConfig {
    /// Every droplet with this tag is deleted
    pub tag: String,
    /// Also delete the registered SSH key
    pub remove_key: bool,
    pub ssh_key_path: Option<PathBuf>,
}

impl DeleteConfig {
    /// Public key file whose registered copies are deleted, if key removal
    /// was requested
    pub fn key_to_remove(&self) -> Option<PathBuf> {
        if !self.remove_key {
            return None;
        }
        let path = self.ssh_key_path.clone().unwrap_or_else(default_key_path);
        Some(public_key_path(&path))
    }
}
