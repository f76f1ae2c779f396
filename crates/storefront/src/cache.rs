//! Product cache keyed by product and variant id.
//!
//! Entries are judged fresh against an injected [`Clock`] at read time rather
//! than expired by moka, so the freshness boundary is exact and testable.
//! There is no size bound: the working set is one store's catalog.
//!
//! A product list already carries full detail for every product, so
//! [`ProductCache::populate_from_list`] writes each record under its own id
//! and under every variant id. Opening a variant the shopper saw in the list
//! then needs no second round-trip.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use market_lane_core::ProductRecord;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use tracing::debug;

use crate::clock::Clock;

/// Default freshness window.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(300);

/// A cached product with the time it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: Arc<ProductRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// In-memory product cache.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct ProductCache {
    entries: Cache<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    freshness: TimeDelta,
}

impl ProductCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, freshness: Duration) -> Self {
        Self {
            entries: Cache::builder().build(),
            clock,
            freshness: TimeDelta::from_std(freshness).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Look up a product by product id or variant id.
    ///
    /// Returns `None` if the id was never cached or the entry is at least
    /// one freshness window old. Stale entries are dropped.
    pub async fn lookup(&self, id: &str) -> Option<Arc<ProductRecord>> {
        let entry = self.entries.get(id).await?;
        let age = self.clock.now() - entry.fetched_at;
        if age < self.freshness {
            debug!(id, "Product cache hit");
            Some(entry.record)
        } else {
            debug!(id, age_secs = age.num_seconds(), "Product cache entry expired");
            self.evict_if_stale(id).await;
            None
        }
    }

    /// Remove the entry under `id` only if it is still stale.
    ///
    /// A `put` racing with a stale read must survive, so the check and the
    /// removal happen atomically for the key.
    async fn evict_if_stale(&self, id: &str) {
        let now = self.clock.now();
        let freshness = self.freshness;
        let result = self
            .entries
            .entry_by_ref(id)
            .and_compute_with(move |current| {
                let op = match current {
                    Some(entry) if now - entry.value().fetched_at >= freshness => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        if let CompResult::Unchanged(_) = result {
            debug!(id, "Product cache entry refreshed before eviction");
        }
    }

    /// Store a record under `id`, replacing any existing entry.
    pub async fn put(&self, id: &str, record: Arc<ProductRecord>, fetched_at: DateTime<Utc>) {
        self.entries
            .insert(id.to_string(), CacheEntry { record, fetched_at })
            .await;
    }

    /// Store each record under its product id and all of its variant ids.
    pub async fn populate_from_list(&self, records: &[Arc<ProductRecord>], fetched_at: DateTime<Utc>) {
        for record in records {
            self.put(record.id.as_str(), Arc::clone(record), fetched_at)
                .await;
            for variant_id in record.variant_ids() {
                self.put(variant_id.as_str(), Arc::clone(record), fetched_at)
                    .await;
            }
        }
        debug!(products = records.len(), "Populated product cache from list");
    }

    /// The current time according to the cache's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[cfg(test)]
    pub(crate) async fn invalidate(&self, id: &str) {
        self.entries.invalidate(id).await;
    }

    #[cfg(test)]
    pub(crate) async fn invalidate_all(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Number of stored entries, fresh or not.
    #[cfg(test)]
    pub(crate) async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}
