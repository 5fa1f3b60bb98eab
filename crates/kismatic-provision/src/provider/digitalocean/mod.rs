//! DigitalOcean droplet provisioning over the v2 REST API

mod client;
pub mod error;
pub mod types;
pub mod user_data;

pub use client::DigitalOceanClient;
pub use error::DoApiError;
pub use types::{Droplet, DropletSpec, SshKey};
