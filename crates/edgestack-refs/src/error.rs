//! Error types for reference handoff and deployment ordering.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use edgestack_core::{AwsRegion, ReferenceKey};

/// Errors from the reference store, read grants, and the resolver.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// The key has never been published in this region.
    #[error("reference {key} not found in {region}")]
    NotFound {
        /// Region that was read.
        region: AwsRegion,
        /// Key that was read.
        key: ReferenceKey,
    },

    /// The resolver exhausted its attempt budget without finding the key.
    #[error("reference {key} in {region} not found after {attempts} attempts")]
    ReferenceNotFound {
        /// Region that was read.
        region: AwsRegion,
        /// Key that was read.
        key: ReferenceKey,
        /// Attempts made.
        attempts: u32,
    },

    /// The resolver hit its deadline without finding the key.
    #[error("timed out after {timeout:?} waiting for reference {key} in {region} ({attempts} attempts)")]
    TimedOut {
        /// Region that was read.
        region: AwsRegion,
        /// Key that was read.
        key: ReferenceKey,
        /// Attempts made.
        attempts: u32,
        /// Configured deadline.
        timeout: Duration,
    },

    /// The read grant does not cover the requested key or region.
    #[error("access denied: grant for {namespace} in {grant_region} does not cover {key} in {region}")]
    AccessDenied {
        /// Region the grant is valid for.
        grant_region: AwsRegion,
        /// Namespace the grant is valid for.
        namespace: String,
        /// Region that was requested.
        region: AwsRegion,
        /// Key that was requested.
        key: ReferenceKey,
    },

    /// The read grant is past its expiry.
    #[error("read grant for {namespace} expired at {expires_at}")]
    GrantExpired {
        /// Namespace the grant was valid for.
        namespace: String,
        /// When the grant expired.
        expires_at: DateTime<Utc>,
    },

    /// A region name cannot be used as a storage partition.
    #[error("invalid region name: {0}")]
    InvalidRegion(String),

    /// A store call on the blocking pool panicked or was cancelled.
    #[error("reference store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Reading or writing the durable store failed.
    #[error("reference store I/O error at {}: {source}", .path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A store document could not be parsed.
    #[error("reference store document {} is corrupt: {source}", .path.display())]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl ReferenceError {
    /// Whether the key is simply not there (yet), the only retryable case.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors in a deployment plan's declared ordering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Two units share a name.
    #[error("duplicate unit name: {0}")]
    DuplicateUnit(String),

    /// A unit depends on a unit that is not in the plan.
    #[error("unit {unit} depends on unknown unit {dependency}")]
    UnknownDependency {
        /// Declaring unit.
        unit: String,
        /// Missing dependency.
        dependency: String,
    },

    /// A unit depends on itself.
    #[error("unit {0} depends on itself")]
    SelfDependency(String),

    /// The declared dependencies form a cycle.
    #[error("dependency cycle among units: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// Two units export the same key into the same region.
    #[error("key {key} in {region} is exported by both {first} and {second}")]
    DuplicateExport {
        /// Exported key.
        key: String,
        /// Region it is exported into.
        region: String,
        /// First exporting unit.
        first: String,
        /// Second exporting unit.
        second: String,
    },

    /// A unit imports a key it exports itself.
    #[error("unit {unit} imports its own export {key}")]
    SelfImport {
        /// Unit name.
        unit: String,
        /// Key.
        key: String,
    },

    /// A unit imports a key produced by a unit it does not depend on.
    #[error("unit {consumer} imports {key} from {producer} without declaring a dependency on it")]
    UndeclaredDependency {
        /// Importing unit.
        consumer: String,
        /// Exporting unit.
        producer: String,
        /// Key.
        key: String,
    },
}

/// Errors that abort a deployment run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The plan's ordering is invalid; nothing was applied.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A unit failed to resolve or publish a reference.
    #[error("unit {unit} failed: {source}")]
    Unit {
        /// Failing unit.
        unit: String,
        /// Underlying error.
        #[source]
        source: ReferenceError,
    },
}
