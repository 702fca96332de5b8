//! Region-partitioned state management.
//!
//! Provides [`RegionStore`], a thread-safe concurrent store that gives each
//! AWS region its own isolated state. Published references live in the region
//! they were written to, so a consumer in another region has to name the
//! producer's region explicitly when it resolves them.

use std::sync::Arc;

use dashmap::DashMap;

use crate::types::AwsRegion;

/// Thread-safe, region-partitioned state store.
///
/// Each region gets its own isolated state instance of type `T`.
///
/// # Examples
///
/// ```
/// use edgestack_core::{AwsRegion, RegionStore};
///
/// #[derive(Debug, Default)]
/// struct Counter {
///     hits: std::sync::atomic::AtomicU64,
/// }
///
/// let store = RegionStore::<Counter>::new();
/// let state = store.get_or_create(&AwsRegion::default());
/// state.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
/// ```
#[derive(Debug)]
pub struct RegionStore<T: Default + Send + Sync> {
    inner: DashMap<AwsRegion, Arc<T>>,
}

impl<T: Default + Send + Sync> RegionStore<T> {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Get or create the state for the given region.
    ///
    /// If the state does not exist, a new default instance is created atomically.
    #[must_use]
    pub fn get_or_create(&self, region: &AwsRegion) -> Arc<T> {
        self.inner
            .entry(region.clone())
            .or_insert_with(|| Arc::new(T::default()))
            .clone()
    }

    /// Get the state for the given region, if it exists.
    #[must_use]
    pub fn get(&self, region: &AwsRegion) -> Option<Arc<T>> {
        self.inner.get(region).map(|v| v.clone())
    }
}

impl<T: Default + Send + Sync> Default for RegionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
