//! Published references and the stores that hold them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use edgestack_core::{AwsRegion, ReferenceKey, RegionStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ReferenceError;

/// A value written by a producer unit for consumers to read back.
///
/// A record is immutable once written. Publishing a different value under the
/// same key creates the next version and supersedes this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedReference {
    /// Namespaced key, e.g. `/edgestack/edgeFunctionArn`.
    pub key: ReferenceKey,
    /// Opaque value.
    pub value: String,
    /// Region the reference was published in.
    pub region: AwsRegion,
    /// Logical ordering marker, starting at 1.
    pub version: u64,
    /// When this version was written.
    pub written_at: DateTime<Utc>,
}

/// Outcome of applying a publish to the current record.
#[derive(Debug)]
pub(crate) enum Publish {
    /// The key already holds the value; nothing to write.
    Unchanged(PublishedReference),
    /// A new version that must be committed.
    Written(PublishedReference),
}

impl PublishedReference {
    /// Decide what publishing `value` over `previous` produces.
    pub(crate) fn publish(
        previous: Option<&Self>,
        region: &AwsRegion,
        key: &ReferenceKey,
        value: &str,
    ) -> Publish {
        match previous {
            Some(existing) if existing.value == value => Publish::Unchanged(existing.clone()),
            _ => Publish::Written(Self {
                key: key.clone(),
                value: value.to_owned(),
                region: region.clone(),
                version: previous.map_or(1, |p| p.version + 1),
                written_at: Utc::now(),
            }),
        }
    }
}

/// Durable key/value store used to hand identifiers between deployment units.
///
/// Implementations must give read-after-write consistency for a single key:
/// once `put` returns, every later `get` of that key in that region sees the
/// written value or a newer one.
pub trait ReferenceStore: Send + Sync + std::fmt::Debug {
    /// Publish `value` under `key` in `region`.
    ///
    /// Publishing the value the key already holds returns the existing record
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be committed.
    fn put(
        &self,
        region: &AwsRegion,
        key: &ReferenceKey,
        value: &str,
    ) -> Result<PublishedReference, ReferenceError>;

    /// Read the current record for `key` in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::NotFound`] if the key was never published in
    /// that region.
    fn get(&self, region: &AwsRegion, key: &ReferenceKey)
    -> Result<PublishedReference, ReferenceError>;
}

/// Run a store call on the blocking pool. Stores may do file I/O, which must
/// not stall a runtime worker.
pub(crate) async fn run_blocking<T, F>(call: F) -> Result<T, ReferenceError>
where
    F: FnOnce() -> Result<T, ReferenceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call).await?
}

type RegionRecords = RwLock<BTreeMap<ReferenceKey, PublishedReference>>;

/// Process-local store, partitioned by region.
///
/// Useful for tests and for single-process deployment runs.
#[derive(Debug, Default)]
pub struct InMemoryReferenceStore {
    regions: RegionStore<RegionRecords>,
}

impl InMemoryReferenceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys published in `region`.
    #[must_use]
    pub fn len_in(&self, region: &AwsRegion) -> usize {
        self.regions.get(region).map_or(0, |records| records.read().len())
    }
}

impl ReferenceStore for InMemoryReferenceStore {
    fn put(
        &self,
        region: &AwsRegion,
        key: &ReferenceKey,
        value: &str,
    ) -> Result<PublishedReference, ReferenceError> {
        let records = self.regions.get_or_create(region);
        let mut records = records.write();
        match PublishedReference::publish(records.get(key), region, key, value) {
            Publish::Unchanged(existing) => Ok(existing),
            Publish::Written(record) => {
                tracing::debug!(%region, %key, version = record.version, "published reference");
                records.insert(key.clone(), record.clone());
                Ok(record)
            }
        }
    }

    fn get(
        &self,
        region: &AwsRegion,
        key: &ReferenceKey,
    ) -> Result<PublishedReference, ReferenceError> {
        self.regions
            .get(region)
            .and_then(|records| records.read().get(key).cloned())
            .ok_or_else(|| ReferenceError::NotFound {
                region: region.clone(),
                key: key.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ReferenceKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_should_return_not_found_before_publish() {
        let store = InMemoryReferenceStore::new();
        let err = store
            .get(&AwsRegion::default(), &key("/edgestack/edgeFunctionArn"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_should_read_back_published_value() {
        let store = InMemoryReferenceStore::new();
        let region = AwsRegion::default();
        let k = key("/edgestack/edgeFunctionArn");
        let written = store.put(&region, &k, "arn:aws:lambda:us-east-1:1:function:edge:3").unwrap();
        assert_eq!(written.version, 1);

        let read = store.get(&region, &k).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn test_should_not_bump_version_for_identical_value() {
        let store = InMemoryReferenceStore::new();
        let region = AwsRegion::default();
        let k = key("/edgestack/edgeFunctionArn");
        let first = store.put(&region, &k, "v").unwrap();
        let second = store.put(&region, &k, "v").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len_in(&region), 1);
    }

    #[test]
    fn test_should_supersede_with_next_version() {
        let store = InMemoryReferenceStore::new();
        let region = AwsRegion::default();
        let k = key("/edgestack/edgeFunctionArn");
        store.put(&region, &k, "v1").unwrap();
        let second = store.put(&region, &k, "v2").unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(store.get(&region, &k).unwrap().value, "v2");
    }

    #[test]
    fn test_should_isolate_regions() {
        let store = InMemoryReferenceStore::new();
        let k = key("/edgestack/edgeFunctionArn");
        store.put(&AwsRegion::new("us-east-1"), &k, "v").unwrap();
        assert!(store.get(&AwsRegion::new("eu-west-1"), &k).is_err());
    }

    #[test]
    fn test_should_serialize_camel_case() {
        let store = InMemoryReferenceStore::new();
        let record = store
            .put(&AwsRegion::default(), &key("/a/b"), "v")
            .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("writtenAt").is_some());
        assert_eq!(json["key"], "/a/b");
        assert_eq!(json["region"], "us-east-1");
    }
}
