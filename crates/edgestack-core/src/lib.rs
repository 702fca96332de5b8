//! Core types, configuration, and state management for EdgeStack.
//!
//! This crate provides the building blocks shared by the edge interceptor,
//! the deployment-time reference resolver, and the binaries: region-partitioned
//! state, validated reference keys, and the global environment configuration.

mod config;
mod error;
mod state;
mod types;

pub use config::{EdgeStackConfig, parse_bool};
pub use error::CoreError;
pub use state::RegionStore;
pub use types::{AwsRegion, ReferenceKey};
