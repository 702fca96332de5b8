//! Interceptor configuration.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Body size cap the delivery layer applies when it exposes request bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// Configuration for [`ContentDigestInterceptor`](crate::ContentDigestInterceptor).
///
/// # Examples
///
/// ```
/// use edgestack_edge::InterceptorConfig;
///
/// let config = InterceptorConfig::builder().max_body_bytes(4096).build();
/// assert_eq!(config.max_body_bytes, 4096);
/// assert!(!config.log_payloads);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct InterceptorConfig {
    /// Largest decoded body, in bytes, that will be hashed. Larger bodies are rejected.
    #[builder(default = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Log full before/after request payloads at debug level.
    ///
    /// Payloads include request bodies, so this stays off outside debugging.
    #[builder(default = false)]
    pub log_payloads: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_payloads: false,
        }
    }
}

impl InterceptorConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `EDGE_MAX_BODY_BYTES` | `1048576` |
    /// | `EDGE_LOG_PAYLOADS` | `false` |
    ///
    /// Unparseable numeric values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("EDGE_MAX_BODY_BYTES") {
            if let Ok(n) = v.trim().parse() {
                config.max_body_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("EDGE_LOG_PAYLOADS") {
            config.log_payloads = edgestack_core::parse_bool(&v);
        }

        config
    }
}
