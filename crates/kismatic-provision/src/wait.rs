//! Polling with exponential backoff and cancellation
//!
//! Used for droplet status (`new` -> `active`) and per-node SSH readiness.
//! A check returns `Ok(true)` when the resource is ready, `Ok(false)` to poll
//! again, and `Err` to give up immediately.

use anyhow::{Result, bail};
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Backoff schedule and deadline for [`wait_for_resource`]
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay after the first unsuccessful check
    pub initial_delay: Duration,
    /// Cap for the exponential growth
    pub max_delay: Duration,
    /// Give up once this much time has passed since the first check
    pub timeout: Duration,
    /// Randomize delays so concurrent pollers spread out
    pub jitter: bool,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl WaitConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Poll `check` until it reports ready, the deadline passes, or `cancel` fires.
///
/// Sleeps never run past the deadline: the last check happens at the
/// deadline at the latest.
pub async fn wait_for_resource<F, Fut>(
    config: WaitConfig,
    cancel: Option<&CancellationToken>,
    check: F,
    resource_name: &str,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + config.timeout;
    let mut attempts = 0u32;

    let mut builder = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0);
    if config.jitter {
        builder = builder.with_jitter();
    }
    let mut delays = builder.build();

    loop {
        attempts += 1;

        if let Some(token) = cancel
            && token.is_cancelled()
        {
            bail!("Wait for {} cancelled", resource_name);
        }

        match check().await {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(resource = %resource_name, error = %e, "Resource check failed");
                return Err(e);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            bail!(
                "Timeout waiting for {} after {:?} ({} attempts)",
                resource_name,
                config.timeout,
                attempts
            );
        }

        // Default backoff stops yielding after a few steps; stay at the cap
        let delay = delays
            .next()
            .unwrap_or(config.max_delay)
            .min(deadline - now);
        debug!(
            resource = %resource_name,
            attempt = attempts,
            delay_ms = delay.as_millis(),
            "Resource not ready, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                bail!("Wait for {} cancelled", resource_name);
            }
        }
    }
}
