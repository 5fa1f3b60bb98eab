//! kismatic-provision: provision DigitalOcean infrastructure for Kismatic

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use kismatic_provision::config::{CreateConfig, DeleteConfig, DigitalOceanConfig, RunFlags};
use kismatic_provision::orchestrator;
use kismatic_provision::plan::{PlanOptions, StagingOutcome};
use kismatic_provision_common::defaults::{
    DEFAULT_CLUSTER_TAG, DEFAULT_IMAGE, DEFAULT_INSTANCE_SIZE, DEFAULT_REGION, DEFAULT_SSH_USER,
    DEFAULT_WORKER_SIZE, ENV_API_TOKEN, ENV_INSTALL_DIR, ENV_SSH_KEY_PATH, install_dir,
};
use kismatic_provision_common::{NodeCounts, TopologyRequest};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kismatic-provision")]
#[command(about = "Provision infrastructure on DigitalOcean for a Kismatic cluster")]
#[command(version)]
struct Args {
    /// DigitalOcean API token (prompted for when unset)
    #[arg(long, env = ENV_API_TOKEN, hide_env_values = true, global = true)]
    token: Option<String>,

    /// Private SSH key; `<private>.pub` must sit next to it
    /// (default: ssh/cluster.pem next to this executable)
    #[arg(long, env = ENV_SSH_KEY_PATH, global = true)]
    ssh_key: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Arguments for the create command
#[derive(clap::Args, Debug)]
struct CreateArgs {
    /// Count of etcd nodes to produce
    #[arg(short = 'e', long = "etcdNodeCount", default_value_t = 1)]
    etcd: u16,

    /// Count of master nodes to produce
    #[arg(short = 'm', long = "masterNodeCount", alias = "masterdNodeCount", default_value_t = 1)]
    master: u16,

    /// Count of worker nodes to produce
    #[arg(short = 'w', long = "workerNodeCount", default_value_t = 1)]
    worker: u16,

    /// Skip generating a plan file; print the new nodes instead
    #[arg(short = 'n', long = "noplan")]
    no_plan: bool,

    /// Droplet size for etcd, master and bootstrap nodes
    #[arg(short = 'i', long, default_value = DEFAULT_INSTANCE_SIZE)]
    instance_type: String,

    /// Droplet size for worker nodes
    #[arg(long, default_value = DEFAULT_WORKER_SIZE)]
    worker_type: String,

    /// Image slug
    #[arg(long, default_value = DEFAULT_IMAGE)]
    image: String,

    /// Region to deploy to
    #[arg(long, default_value = DEFAULT_REGION)]
    region: String,

    /// Tag applied to every node in the cluster
    #[arg(long, default_value = DEFAULT_CLUSTER_TAG)]
    tag: String,

    /// SSH user name on the nodes
    #[arg(long = "sshuser", default_value = DEFAULT_SSH_USER)]
    ssh_user: String,

    /// Create a bootstrap node to run the installer from
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    bootstrap: bool,

    /// Create a storage cluster from all worker nodes
    #[arg(short = 's', long = "storage-cluster")]
    storage_cluster: bool,

    /// Install directory on the bootstrap node
    #[arg(long, env = ENV_INSTALL_DIR)]
    install_dir: Option<String>,

    /// Directory the plan file is written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

impl CreateArgs {
    fn into_config(self, ssh_key: Option<PathBuf>) -> Result<CreateConfig> {
        let counts = NodeCounts::new(
            self.etcd,
            self.master,
            self.worker,
            u16::from(self.bootstrap),
        );
        let topology = TopologyRequest::new(counts)?
            .with_size(self.instance_type)
            .with_worker_size(self.worker_type)
            .with_image(self.image)
            .with_region(self.region)
            .with_tag(self.tag)
            .with_ssh_user(self.ssh_user);

        let mut config = CreateConfig::new(topology);
        config.plan = PlanOptions {
            storage_cluster: self.storage_cluster,
            install_dir: install_dir(self.install_dir.as_deref()),
        };
        config.flags = RunFlags {
            no_plan: self.no_plan,
            output_dir: self.output_dir,
        };
        config.ssh_key_path = ssh_key;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create infrastructure for a new cluster
    Create(Box<CreateArgs>),

    /// Delete every node carrying the tag
    DeleteAll {
        /// All nodes with this tag are removed
        #[arg(long, default_value = DEFAULT_CLUSTER_TAG)]
        tag: String,

        /// Also delete the SSH key registered during provisioning
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        remove_key: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if let Some(api) = kismatic_provision::provider::digitalocean::error::find_api_error(e)
        && let Some(suggestion) = api.suggestion()
    {
        let _ = writeln!(stderr, "\n\x1b[36mSuggestion:\x1b[0m {suggestion}");
    }
}

/// Read the API token from stdin when it was not supplied.
fn resolve_token(token: Option<String>) -> Result<String> {
    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
        return Ok(token.trim().to_string());
    }

    print!("Enter DigitalOcean API token: ");
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read API token from stdin")?;
    let token = line.trim().to_string();
    if token.is_empty() {
        bail!("a DigitalOcean API token is required (set {ENV_API_TOKEN})");
    }
    Ok(token)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let token = resolve_token(args.token)?;

    match args.command {
        Command::Create(create_args) => {
            let config = create_args.into_config(args.ssh_key)?;
            let provider = DigitalOceanConfig::new(token).with_install_dir(config.install_dir());

            info!(
                nodes = config.topology.counts().total(),
                region = %config.topology.region,
                tag = %config.topology.tag,
                "Provisioning"
            );

            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel_clone.cancel();
                }
            });

            let outcome = orchestrator::run_create(config, provider, cancel).await?;

            if let Some(StagingOutcome::Staged(path)) = &outcome.staging {
                println!("Copied plan file to the bootstrap node: {path}");
            }
            println!("{}", outcome.summary());
        }

        Command::DeleteAll { tag, remove_key } => {
            let config = DeleteConfig {
                tag: tag.clone(),
                remove_key,
                ssh_key_path: args.ssh_key,
            };
            orchestrator::run_delete(config, DigitalOceanConfig::new(token)).await?;
            println!("Deleted all droplets tagged '{tag}'");
        }
    }

    Ok(())
}
