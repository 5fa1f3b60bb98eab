use super::error::{DoApiError, classify_api_error, find_api_error, is_retryable};
use super::types::{
    CreateSshKey, Droplet, DropletEnvelope, DropletSpec, SshKey, SshKeyEnvelope, SshKeyList,
};
use super::user_data::bootstrap_user_data;
use crate::config::DigitalOceanConfig;
use crate::identity::SshIdentity;
use crate::provider::Provisioner;
use crate::wait::{WaitConfig, wait_for_resource};
use anyhow::{Context, Result, anyhow, bail};
use backon::{ExponentialBuilder, Retryable};
use futures::stream::{FuturesUnordered, StreamExt};
use kismatic_provision_common::{
    ProvisionedNode, ProvisionedTopology, Role, TopologyRequest, node_name,
};
use rand::Rng;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Keys listed per page; accounts rarely hold more
const KEYS_PER_PAGE: u32 = 200;

/// Client for the DigitalOcean droplet and SSH key APIs
pub struct DigitalOceanClient {
    http: reqwest::Client,
    config: DigitalOceanConfig,
}

impl DigitalOceanClient {
    pub fn new(config: DigitalOceanConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("kismatic-provision/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_url.trim_end_matches('/'), path);
        self.http.request(method, url).bearer_auth(&self.config.token)
    }

    /// Send a request and turn non-success statuses into [`DoApiError`].
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {what}"))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_api_error(status, &body);
        if let Some(suggestion) = err.suggestion() {
            debug!(suggestion, "API error suggestion");
        }
        Err(anyhow::Error::new(err).context(format!("Failed to {what}")))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        self.send(request, what)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode response to {what}"))
    }

    /// Retry a call while it fails with a rate limit or server error
    async fn with_retry<T, F, Fut>(&self, what: &str, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        call.retry(
            ExponentialBuilder::default()
                .with_min_delay(self.config.retry_min_delay)
                .with_max_delay(Duration::from_secs(30))
                .with_max_times(self.config.retry_max_times)
                .with_jitter(),
        )
        .when(is_retryable)
        .notify(|e, dur| {
            warn!(delay = ?dur, error = %e, call = %what, "DigitalOcean API busy, backing off...");
        })
        .await
    }

    /// List the SSH keys registered with the account.
    pub async fn list_ssh_keys(&self) -> Result<Vec<SshKey>> {
        let path = format!("/v2/account/keys?per_page={KEYS_PER_PAGE}");
        let list: SshKeyList = self
            .with_retry("list SSH keys", || {
                self.send_json(self.request(Method::GET, &path), "list SSH keys")
            })
            .await?;
        Ok(list.ssh_keys)
    }

    /// Find or upload the identity's public key, returning its provider id.
    ///
    /// Only a registered key with the same public key text is reused. A key
    /// that merely shares the name belongs to someone else's key pair, so
    /// ours is uploaded next to it.
    #[instrument(skip_all, fields(key_name = %identity.key_name))]
    pub async fn ensure_ssh_key(&self, identity: &SshIdentity) -> Result<u64> {
        let public_key = read_public_key(&identity.public_key).await?;

        let keys = self.list_ssh_keys().await?;
        if let Some(key) = keys.iter().find(|k| same_key(k, &public_key)) {
            debug!(key_id = key.id, "Reusing registered SSH key");
            return Ok(key.id);
        }
        if let Some(key) = keys.iter().find(|k| k.name == identity.key_name) {
            info!(
                key_id = key.id,
                "A different SSH key is registered under this name; uploading ours"
            );
        }

        let body = CreateSshKey {
            name: &identity.key_name,
            public_key: &public_key,
        };
        let created: SshKeyEnvelope = self
            .with_retry("upload SSH key", || {
                self.send_json(
                    self.request(Method::POST, "/v2/account/keys").json(&body),
                    "upload SSH key",
                )
            })
            .await?;
        info!(key_id = created.ssh_key.id, "Uploaded SSH key");
        Ok(created.ssh_key.id)
    }

    /// Create one droplet.
    pub async fn create_droplet(&self, spec: &DropletSpec) -> Result<Droplet> {
        let what = format!("create droplet '{}'", spec.name);
        let envelope: DropletEnvelope = self
            .with_retry(&what, || {
                self.send_json(self.request(Method::POST, "/v2/droplets").json(spec), &what)
            })
            .await?;
        debug!(droplet_id = envelope.droplet.id, name = %spec.name, "Droplet created");
        Ok(envelope.droplet)
    }

    pub async fn get_droplet(&self, id: u64) -> Result<Droplet> {
        let envelope: DropletEnvelope = self
            .send_json(
                self.request(Method::GET, &format!("/v2/droplets/{id}")),
                &format!("describe droplet {id}"),
            )
            .await?;
        Ok(envelope.droplet)
    }

    /// Poll until the droplet is active with both addresses assigned.
    pub async fn wait_for_active(
        &self,
        id: u64,
        cancel: Option<&CancellationToken>,
    ) -> Result<Droplet> {
        let found: Mutex<Option<Droplet>> = Mutex::new(None);

        let wait_config = WaitConfig {
            initial_delay: self.config.poll_initial_delay,
            max_delay: Duration::from_secs(10),
            timeout: self.config.active_timeout,
            jitter: true,
        };

        wait_for_resource(
            wait_config,
            cancel,
            || async {
                let droplet = match self.get_droplet(id).await {
                    Ok(d) => d,
                    Err(e) if is_retryable(&e) => {
                        debug!(droplet_id = id, error = %e, "Transient error describing droplet");
                        return Ok(false);
                    }
                    Err(e) => return Err(e),
                };
                let ready = droplet.is_active()
                    && droplet.public_ipv4().is_some()
                    && droplet.private_ipv4().is_some();
                if ready && let Ok(mut slot) = found.lock() {
                    *slot = Some(droplet);
                }
                Ok(ready)
            },
            &format!("droplet {id}"),
        )
        .await?;

        found
            .into_inner()
            .ok()
            .flatten()
            .ok_or_else(|| anyhow!("droplet {id} became active but was not recorded"))
    }

    /// Delete all droplets carrying the tag.
    pub async fn delete_droplets_by_tag(&self, tag: &str) -> Result<()> {
        let what = format!("delete droplets tagged '{tag}'");
        self.with_retry(&what, || async {
            self.send(
                self.request(Method::DELETE, "/v2/droplets")
                    .query(&[("tag_name", tag)]),
                &what,
            )
            .await
            .map(|_| ())
        })
        .await
    }

    /// Delete registered keys whose public key text matches. Keys that are
    /// already gone are not an error.
    pub async fn delete_ssh_keys_matching(&self, public_key: &str) -> Result<usize> {
        let mut deleted = 0;
        let keys = self.list_ssh_keys().await?;
        for key in keys.into_iter().filter(|k| same_key(k, public_key)) {
            let what = format!("delete SSH key {}", key.id);
            let result = self
                .send(
                    self.request(Method::DELETE, &format!("/v2/account/keys/{}", key.id)),
                    &what,
                )
                .await;
            match result {
                Ok(_) => deleted += 1,
                Err(e) if find_api_error(&e).is_some_and(DoApiError::is_not_found) => {
                    debug!(key_id = key.id, "SSH key already gone");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(deleted)
    }

    fn droplet_spec(
        &self,
        request: &TopologyRequest,
        role: Role,
        index: usize,
        run_suffix: &str,
        key_id: u64,
    ) -> Result<DropletSpec> {
        let user_data = match role {
            Role::Bootstrap => Some(bootstrap_user_data(&self.config.install_dir)?),
            _ => None,
        };
        Ok(DropletSpec {
            name: node_name(&request.tag, role, index, run_suffix),
            region: request.region.clone(),
            size: request.size_for(role).to_string(),
            image: request.image.clone(),
            ssh_keys: vec![key_id],
            private_networking: true,
            tags: vec![request.tag.clone()],
            user_data,
        })
    }

    /// Small random pause between create calls
    async fn stagger(&self) {
        let max_ms = self.config.create_stagger.as_millis() as u64;
        if max_ms == 0 {
            return;
        }
        let ms = rand::thread_rng().gen_range(0..=max_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

async fn read_public_key(path: &Path) -> Result<String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read public key '{}'", path.display()))?;
    let text = text.trim();
    if text.is_empty() {
        bail!("Public key '{}' is empty", path.display());
    }
    Ok(text.to_string())
}

/// Compare on key type and key material; the trailing comment may differ
fn same_key(registered: &SshKey, public_key: &str) -> bool {
    fn material(k: &str) -> Vec<&str> {
        k.split_whitespace().take(2).collect()
    }
    material(&registered.public_key) == material(public_key)
}

/// Six hex characters from a fresh UUID, shared by every droplet of a run
fn run_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..6].to_string()
}

impl Provisioner for DigitalOceanClient {
    #[instrument(skip_all, fields(tag = %request.tag, nodes = request.counts().total()))]
    async fn provision(
        &self,
        request: &TopologyRequest,
        identity: &SshIdentity,
        cancel: CancellationToken,
    ) -> Result<ProvisionedTopology> {
        let key_id = self.ensure_ssh_key(identity).await?;
        let suffix = run_suffix();
        let counts = request.counts();

        let mut created: Vec<(Role, Droplet)> = Vec::with_capacity(counts.total());
        for role in Role::ALL {
            for index in 1..=usize::from(counts.get(role)) {
                if !created.is_empty() {
                    self.stagger().await;
                }
                let spec = self.droplet_spec(request, role, index, &suffix, key_id)?;
                let droplet = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => bail!(
                        "Provisioning cancelled after {} droplets; run delete-all --tag {} to clean up",
                        created.len(),
                        request.tag
                    ),
                    result = self.create_droplet(&spec) => result?,
                };
                info!(
                    role = %role,
                    name = %droplet.name,
                    droplet_id = droplet.id,
                    "Droplet requested"
                );
                created.push((role, droplet));
            }
        }

        // Wait for all droplets concurrently, keeping creation order in the result
        let mut active: Vec<Option<Droplet>> = vec![None; created.len()];
        let mut futures: FuturesUnordered<_> = created
            .iter()
            .enumerate()
            .map(|(slot, (_, droplet))| {
                let cancel = &cancel;
                async move { (slot, self.wait_for_active(droplet.id, Some(cancel)).await) }
            })
            .collect();

        while let Some((slot, result)) = futures.next().await {
            let droplet = result.with_context(|| {
                format!(
                    "Droplet '{}' did not become active; run delete-all --tag {} to clean up",
                    created[slot].1.name, request.tag
                )
            })?;
            active[slot] = Some(droplet);
        }
        drop(futures);

        let mut topology = ProvisionedTopology::default();
        for ((role, _), droplet) in created.iter().zip(active) {
            let droplet = droplet.ok_or_else(|| anyhow!("droplet result missing"))?;
            let node = ProvisionedNode {
                public_ipv4: droplet.public_ipv4().unwrap_or_default().to_string(),
                private_ipv4: droplet.private_ipv4().unwrap_or_default().to_string(),
                id: droplet.name,
                ssh_user: request.ssh_user.clone(),
            };
            topology.push(*role, node);
        }

        Ok(topology)
    }

    #[instrument(skip(self))]
    async fn terminate(&self, tag: &str, remove_key: Option<PathBuf>) -> Result<()> {
        self.delete_droplets_by_tag(tag).await?;
        info!(tag = %tag, "Deleted droplets");

        if let Some(path) = remove_key {
            let public_key = read_public_key(&path).await?;
            let deleted = self.delete_ssh_keys_matching(&public_key).await?;
            info!(key = %path.display(), deleted, "Removed SSH key");
        }
        Ok(())
    }
}
