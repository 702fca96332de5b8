//! Common type definitions shared across crates.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// AWS Region identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Default region. Edge functions must be published from here.
    pub const DEFAULT: &str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A hierarchical key under which a published reference is stored.
///
/// Keys are absolute paths such as `/axumOnLambda/LambdaEdgeArn`: they start
/// with `/`, contain at least one non-empty segment, and use only ASCII
/// alphanumerics plus `_`, `.` and `-` inside segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferenceKey(String);

impl ReferenceKey {
    /// Maximum key length in bytes.
    pub const MAX_LEN: usize = 1011;

    /// Maximum number of path segments.
    pub const MAX_DEPTH: usize = 15;

    /// Parse and validate a reference key.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidReferenceKey`] if the key is not a valid
    /// absolute path.
    ///
    /// # Examples
    ///
    /// ```
    /// use edgestack_core::ReferenceKey;
    ///
    /// let key = ReferenceKey::new("/axumOnLambda/LambdaEdgeArn").unwrap();
    /// assert_eq!(key.namespace(), "/axumOnLambda/");
    /// assert!(ReferenceKey::new("no-leading-slash").is_err());
    /// ```
    pub fn new(key: impl Into<String>) -> Result<Self, CoreError> {
        let key = key.into();
        let reject = |reason| CoreError::InvalidReferenceKey {
            key: key.clone(),
            reason,
        };

        if key.len() > Self::MAX_LEN {
            return Err(reject("key is too long"));
        }
        let Some(path) = key.strip_prefix('/') else {
            return Err(reject("key must start with '/'"));
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() > Self::MAX_DEPTH {
            return Err(reject("key is nested too deeply"));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(reject("key contains an empty segment"));
        }
        let valid = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
        if !segments.iter().all(|s| s.chars().all(valid)) {
            return Err(reject("key contains an unsupported character"));
        }

        Ok(Self(key))
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The parent path of this key, including the trailing `/`.
    ///
    /// A top-level key such as `/name` lives in the root namespace `/`.
    #[must_use]
    pub fn namespace(&self) -> &str {
        // Validation guarantees a leading '/', so rfind always succeeds.
        let end = self.0.rfind('/').map_or(1, |i| i + 1);
        &self.0[..end]
    }

    /// Whether this key lives under `namespace` (a path ending in `/`).
    #[must_use]
    pub fn is_within(&self, namespace: &str) -> bool {
        namespace.ends_with('/') && self.0.starts_with(namespace)
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReferenceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ReferenceKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReferenceKey> for String {
    fn from(key: ReferenceKey) -> Self {
        key.0
    }
}
