//! In-memory stand-in for the dashboard's query cache.

use std::collections::HashMap;

use sync_core::{CacheKey, QueryCache};
use sync_logging::{sync_debug, sync_info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    pub value: Option<serde_json::Value>,
    pub stale: bool,
    /// A view is currently showing this query.
    pub observed: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryQueryCache {
    entries: HashMap<CacheKey, CacheEntry>,
    refetches: Vec<CacheKey>,
}

impl InMemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, key: CacheKey) {
        self.entries.entry(key).or_default().observed = true;
    }

    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Observed keys invalidated since the last call, in invalidation order.
    pub fn take_refetches(&mut self) -> Vec<CacheKey> {
        std::mem::take(&mut self.refetches)
    }
}

impl QueryCache for InMemoryQueryCache {
    fn invalidate(&mut self, key: &CacheKey) {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.stale = true;
        if entry.observed {
            sync_info!("Refetching {}", key);
            self.refetches.push(key.clone());
        } else {
            sync_debug!("Marked {} stale", key);
        }
    }

    fn overwrite(&mut self, key: &CacheKey, value: serde_json::Value) {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.value = Some(value);
        entry.stale = false;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn only_observed_keys_are_refetched() {
        let mut cache = InMemoryQueryCache::new();
        let list = CacheKey::entity_list("ACME");
        let detail = CacheKey::entity_detail("C1");
        cache.observe(list.clone());

        cache.invalidate(&list);
        cache.invalidate(&detail);

        assert_eq!(cache.take_refetches(), vec![list.clone()]);
        assert!(cache.take_refetches().is_empty());
        assert!(cache.entry(&detail).is_some_and(|e| e.stale && !e.observed));
    }

    #[test]
    fn overwrite_clears_staleness() {
        let mut cache = InMemoryQueryCache::new();
        let detail = CacheKey::entity_detail("C1");
        cache.invalidate(&detail);
        cache.overwrite(&detail, json!({ "followers": 10 }));

        let entry = cache.entry(&detail).cloned().unwrap_or_default();
        assert!(!entry.stale);
        assert_eq!(entry.value, Some(json!({ "followers": 10 })));
    }
}
