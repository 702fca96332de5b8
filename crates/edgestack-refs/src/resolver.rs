//! Deployment-time resolution of published references.
//!
//! [`ReferenceResolver::resolve`] blocks the calling provisioning step until
//! the producer's publish is visible, the attempt budget is spent, or the
//! deadline passes. Only [`ReferenceError::NotFound`] is retried: grant
//! violations and store failures abort immediately. There is no default value
//! on failure.

use std::sync::Arc;
use std::time::Duration;

use edgestack_core::{AwsRegion, ReferenceKey};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::error::ReferenceError;
use crate::grant::{GrantedReader, ReadGrant};
use crate::store::{ReferenceStore, run_blocking};

/// Extra lifetime a read grant gets beyond the resolution deadline.
pub const GRANT_GRACE: Duration = Duration::from_secs(5);

/// Longest deadline honoured; larger timeouts are clamped to it.
const MAX_TIMEOUT: Duration = Duration::from_secs(86_400);

fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.min(MAX_TIMEOUT)
}

/// Bounds for the resolver's retry loop.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use edgestack_refs::RetryPolicy;
///
/// let policy = RetryPolicy::builder()
///     .max_attempts(4)
///     .initial_backoff(Duration::from_millis(100))
///     .build();
/// assert_eq!(policy.backoff(1), Duration::from_millis(100));
/// assert_eq!(policy.backoff(3), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct RetryPolicy {
    /// Total reads before giving up, including the first.
    #[builder(default = 10)]
    pub max_attempts: u32,

    /// Delay after the first failed read.
    #[builder(default = Duration::from_millis(250))]
    pub initial_backoff: Duration,

    /// Upper bound on any single delay.
    #[builder(default = Duration::from_secs(5))]
    pub max_backoff: Duration,

    /// Growth factor between consecutive delays.
    #[builder(default = 2)]
    pub multiplier: u32,

    /// Wall-clock bound on one resolution.
    #[builder(default = Duration::from_secs(120))]
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Load the policy from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `RESOLVER_MAX_ATTEMPTS` | `10` |
    /// | `RESOLVER_INITIAL_BACKOFF_MS` | `250` |
    /// | `RESOLVER_MAX_BACKOFF_MS` | `5000` |
    /// | `RESOLVER_BACKOFF_MULTIPLIER` | `2` |
    /// | `RESOLVER_TIMEOUT_SECS` | `120` |
    #[must_use]
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
        }

        let mut policy = Self::default();
        if let Some(n) = var("RESOLVER_MAX_ATTEMPTS") {
            policy.max_attempts = n;
        }
        if let Some(ms) = var("RESOLVER_INITIAL_BACKOFF_MS") {
            policy.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = var("RESOLVER_MAX_BACKOFF_MS") {
            policy.max_backoff = Duration::from_millis(ms);
        }
        if let Some(n) = var("RESOLVER_BACKOFF_MULTIPLIER") {
            policy.multiplier = n;
        }
        if let Some(secs) = var("RESOLVER_TIMEOUT_SECS") {
            policy.timeout = Duration::from_secs(secs);
        }
        policy
    }

    /// Delay after the `attempt`-th failed read (1-based), capped at `max_backoff`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .max(1)
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Lifetime of the read grant issued for one resolution.
    #[must_use]
    pub fn grant_ttl(&self, timeout: Duration) -> Duration {
        timeout.saturating_add(GRANT_GRACE)
    }
}

/// A value read back for one deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedReference {
    /// Key that was resolved.
    pub key: ReferenceKey,
    /// Region it was read from.
    pub region: AwsRegion,
    /// Published value.
    pub value: String,
    /// Version that was read.
    pub version: u64,
    /// Reads it took.
    pub attempts: u32,
}

/// Blocking reader of a [`ReferenceStore`] with bounded retry.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    store: Arc<dyn ReferenceStore>,
    policy: RetryPolicy,
}

impl ReferenceResolver {
    /// Create a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ReferenceStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The retry policy in force.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolve `key` in `region` within the policy's timeout.
    ///
    /// # Errors
    ///
    /// [`ReferenceError::ReferenceNotFound`] when the attempt budget runs out,
    /// [`ReferenceError::TimedOut`] at the deadline, and any non-retryable
    /// store or grant error as soon as it occurs.
    pub async fn resolve(
        &self,
        region: &AwsRegion,
        key: &ReferenceKey,
    ) -> Result<ResolvedReference, ReferenceError> {
        self.resolve_within(region, key, self.policy.timeout).await
    }

    /// Resolve `key` in `region`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`ReferenceResolver::resolve`].
    pub async fn resolve_within(
        &self,
        region: &AwsRegion,
        key: &ReferenceKey,
        timeout: Duration,
    ) -> Result<ResolvedReference, ReferenceError> {
        let timeout = clamp_timeout(timeout);
        let deadline = Instant::now() + timeout;
        let max_attempts = self.policy.max_attempts.max(1);
        let grant = ReadGrant::for_key(region, key, self.policy.grant_ttl(timeout));
        let reader = GrantedReader::new(Arc::clone(&self.store), grant);

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!(%region, %key, attempt = attempts, "reading published reference");

            let read = {
                let (reader, region, key) = (reader.clone(), region.clone(), key.clone());
                run_blocking(move || reader.get(&region, &key)).await
            };
            match read {
                Ok(record) => {
                    info!(%region, %key, version = record.version, attempts, "resolved reference");
                    return Ok(ResolvedReference {
                        key: record.key,
                        region: record.region,
                        value: record.value,
                        version: record.version,
                        attempts,
                    });
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }

            if attempts >= max_attempts {
                return Err(ReferenceError::ReferenceNotFound {
                    region: region.clone(),
                    key: key.clone(),
                    attempts,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ReferenceError::TimedOut {
                    region: region.clone(),
                    key: key.clone(),
                    attempts,
                    timeout,
                });
            }

            let delay = self.policy.backoff(attempts).min(deadline - now);
            warn!(
                %region,
                %key,
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reference not published yet, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
