//! Global configuration for EdgeStack binaries.
//!
//! All configuration is driven by environment variables. Component-specific
//! settings (interceptor limits, resolver retry policy) live next to the
//! component that reads them.

use std::path::PathBuf;

use crate::types::AwsRegion;

/// Global configuration for EdgeStack.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStackConfig {
    /// Bind address for the HTTP host.
    pub gateway_listen: String,
    /// Default AWS region.
    pub default_region: AwsRegion,
    /// Log level.
    pub log_level: String,
    /// Emit JSON-formatted log lines instead of human-readable ones.
    pub log_json: bool,
    /// Directory holding the durable published-reference store.
    pub store_dir: PathBuf,
}

impl Default for EdgeStackConfig {
    fn default() -> Self {
        Self {
            gateway_listen: "0.0.0.0:8080".to_owned(),
            default_region: AwsRegion::default(),
            log_level: "info".to_owned(),
            log_json: false,
            store_dir: PathBuf::from("/var/lib/edgestack"),
        }
    }
}

impl EdgeStackConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8080` |
    /// | `DEFAULT_REGION` | `us-east-1` |
    /// | `LOG_LEVEL` | `info` |
    /// | `LOG_FORMAT` | `text` (`json` for JSON lines) |
    /// | `STORE_DIR` | `/var/lib/edgestack` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("DEFAULT_REGION") {
            config.default_region = AwsRegion::new(v);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("LOG_FORMAT") {
            config.log_json = v.eq_ignore_ascii_case("json");
        }
        if let Ok(v) = std::env::var("STORE_DIR") {
            config.store_dir = PathBuf::from(v);
        }

        config
    }
}

/// Parse a boolean environment value (`1`, `true`, `yes`, case-insensitive).
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = EdgeStackConfig::default();
        assert_eq!(config.gateway_listen, "0.0.0.0:8080");
        assert_eq!(config.default_region.as_str(), "us-east-1");
        assert!(!config.log_json);
        assert_eq!(config.store_dir, PathBuf::from("/var/lib/edgestack"));
    }

    #[test]
    fn test_should_parse_bool_values() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" yes "));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("off"));
    }
}
