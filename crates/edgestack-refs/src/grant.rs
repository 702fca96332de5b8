//! Least-privilege read grants.
//!
//! A resolution never reads the store directly. It obtains a [`ReadGrant`]
//! covering only the namespace of the key it needs, in one region, for a
//! bounded time, and reads through a [`GrantedReader`] that checks the grant
//! on every call.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use edgestack_core::{AwsRegion, ReferenceKey};
use serde::Serialize;

use crate::error::ReferenceError;
use crate::store::{PublishedReference, ReferenceStore};

/// Permission to read keys under one namespace in one region until a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadGrant {
    /// Region the grant is valid in.
    pub region: AwsRegion,
    /// Namespace prefix, always ending in `/`.
    pub namespace: String,
    /// Instant after which the grant is void.
    pub expires_at: DateTime<Utc>,
}

impl ReadGrant {
    /// Grant read access to the namespace containing `key`, for `ttl`.
    #[must_use]
    pub fn for_key(region: &AwsRegion, key: &ReferenceKey, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            region: region.clone(),
            namespace: key.namespace().to_owned(),
            expires_at,
        }
    }

    /// Whether the grant has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check that the grant permits reading `key` in `region` at `now`.
    ///
    /// # Errors
    ///
    /// [`ReferenceError::GrantExpired`] once past the deadline, and
    /// [`ReferenceError::AccessDenied`] for any key or region outside the grant.
    pub fn permits(
        &self,
        region: &AwsRegion,
        key: &ReferenceKey,
        now: DateTime<Utc>,
    ) -> Result<(), ReferenceError> {
        if self.is_expired_at(now) {
            return Err(ReferenceError::GrantExpired {
                namespace: self.namespace.clone(),
                expires_at: self.expires_at,
            });
        }
        if &self.region != region || !key.is_within(&self.namespace) {
            return Err(ReferenceError::AccessDenied {
                grant_region: self.region.clone(),
                namespace: self.namespace.clone(),
                region: region.clone(),
                key: key.clone(),
            });
        }
        Ok(())
    }
}

/// Read-only view of a store restricted by a [`ReadGrant`].
#[derive(Debug, Clone)]
pub struct GrantedReader {
    store: Arc<dyn ReferenceStore>,
    grant: ReadGrant,
}

impl GrantedReader {
    /// Wrap `store` so that every read is checked against `grant`.
    #[must_use]
    pub fn new(store: Arc<dyn ReferenceStore>, grant: ReadGrant) -> Self {
        Self { store, grant }
    }

    /// The grant in force.
    #[must_use]
    pub fn grant(&self) -> &ReadGrant {
        &self.grant
    }

    /// Read `key` in `region` if the grant allows it.
    ///
    /// # Errors
    ///
    /// Grant violations, or whatever the underlying store reports.
    pub fn get(
        &self,
        region: &AwsRegion,
        key: &ReferenceKey,
    ) -> Result<PublishedReference, ReferenceError> {
        self.grant.permits(region, key, Utc::now())?;
        self.store.get(region, key)
    }
}
