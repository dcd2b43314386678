//! Per-factory staleness cache.
//!
//! A pure keyed map from entity identity to the last fetched definition
//! snapshot. The cache never evicts on a timer and never judges
//! freshness itself; callers compare an entry's age against the entity's
//! refresh budget. This keeps the map trivially correct under
//! concurrency: per-key atomic replace, last writer wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use strata_common::schema::EntityDefinition;
use strata_common::types::EntityId;

/// One cached definition snapshot and when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub definition: Arc<EntityDefinition>,
    pub fetched_at_ms: u64,
}

impl CacheEntry {
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.fetched_at_ms)
    }
}

/// Cache counters snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Shared by every connection created from one factory. Torn down with
/// the factory, never a process-wide singleton.
#[derive(Debug, Default)]
pub struct StalenessCache {
    entries: DashMap<EntityId, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StalenessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry if present, fresh or not.
    pub fn lookup(&self, identity: &EntityId) -> Option<CacheEntry> {
        match self.entries.get(identity) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace the snapshot for its identity.
    pub fn store(&self, definition: Arc<EntityDefinition>, fetched_at_ms: u64) {
        let identity = definition.identity.clone();
        self.entries.insert(
            identity,
            CacheEntry {
                definition,
                fetched_at_ms,
            },
        );
    }

    pub fn invalidate(&self, identity: &EntityId) {
        if self.entries.remove(identity).is_some() {
            tracing::debug!(entity = %identity, "invalidated cached definition");
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::schema::{CacheFrequency, EntityKind};
    use strata_common::types::DdlTimestamp;

    fn def(name: &str, refresh_ms: u64) -> Arc<EntityDefinition> {
        Arc::new(EntityDefinition {
            identity: EntityId::new(name),
            kind: EntityKind::BaseTable,
            parent: None,
            columns: Vec::new(),
            pk_columns: Vec::new(),
            base_column_count: 0,
            append_only: false,
            refresh_interval: CacheFrequency::Millis(refresh_ms),
            auto_partition_sequence: None,
            last_ddl_timestamp: DdlTimestamp(1),
        })
    }

    #[test]
    fn lookup_returns_stale_entries_too() {
        let cache = StalenessCache::new();
        cache.store(def("t", 10), 0);
        let entry = cache.lookup(&EntityId::new("t")).unwrap();
        // entry is 1000ms old, way past the 10ms budget, but still served
        assert_eq!(entry.age_ms(1_000), 1_000);
        assert!(!entry.definition.refresh_interval.fresh_within(entry.age_ms(1_000)));
    }

    #[test]
    fn store_is_last_writer_wins() {
        let cache = StalenessCache::new();
        cache.store(def("t", 10), 5);
        cache.store(def("t", 99), 7);
        let entry = cache.lookup(&EntityId::new("t")).unwrap();
        assert_eq!(entry.fetched_at_ms, 7);
        assert_eq!(
            entry.definition.refresh_interval,
            CacheFrequency::Millis(99)
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = StalenessCache::new();
        cache.store(def("t", 10), 0);
        cache.invalidate(&EntityId::new("t"));
        assert!(cache.lookup(&EntityId::new("t")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn stats_count_hits_and_misses() {
        let cache = StalenessCache::new();
        assert!(cache.lookup(&EntityId::new("t")).is_none());
        cache.store(def("t", 10), 0);
        cache.lookup(&EntityId::new("t"));
        cache.lookup(&EntityId::new("t"));
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }
}
