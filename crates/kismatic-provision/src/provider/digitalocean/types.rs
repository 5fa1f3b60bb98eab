//! DigitalOcean v2 API payloads

use serde::{Deserialize, Serialize};

/// SSH key registered with the account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshKey {
    pub id: u64,
    pub name: String,
    pub public_key: String,
    #[serde(default)]
    pub fingerprint: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SshKeyList {
    pub ssh_keys: Vec<SshKey>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSshKey<'a> {
    pub name: &'a str,
    pub public_key: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SshKeyEnvelope {
    pub ssh_key: SshKey,
}

/// Parameters for a single droplet
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DropletSpec {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    pub ssh_keys: Vec<u64>,
    pub private_networking: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Droplet {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub networks: Networks,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Networks {
    #[serde(default)]
    pub v4: Vec<NetworkV4>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NetworkV4 {
    pub ip_address: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DropletEnvelope {
    pub droplet: Droplet,
}

impl Droplet {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    fn address(&self, kind: &str) -> Option<&str> {
        self.networks
            .v4
            .iter()
            .find(|n| n.kind == kind)
            .map(|n| n.ip_address.as_str())
    }

    pub fn public_ipv4(&self) -> Option<&str> {
        self.address("public")
    }

    pub fn private_ipv4(&self) -> Option<&str> {
        self.address("private")
    }
}
