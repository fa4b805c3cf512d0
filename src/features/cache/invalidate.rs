//! Forced refresh of cached responses after a successful write.

use tracing::{debug, info, warn};

use super::store::CacheStore;
use crate::error::CatalogError;

/// Deletes cached API responses whose URL contains a resource marker.
///
/// Only partitions whose name starts with the configured prefix are swept.
pub struct CacheInvalidator<'a> {
    store: &'a dyn CacheStore,
    partition_prefix: String,
}

impl<'a> CacheInvalidator<'a> {
    #[must_use]
    pub fn new(store: &'a dyn CacheStore, partition_prefix: impl Into<String>) -> Self {
        Self {
            store,
            partition_prefix: partition_prefix.into(),
        }
    }

    /// Best-effort sweep. Failures are logged and swallowed.
    ///
    /// Returns the number of entries deleted (0 when the sweep failed).
    pub fn invalidate(&self, marker: &str) -> usize {
        match self.try_invalidate(marker) {
            Ok(removed) => {
                info!(marker, removed, "cache invalidated");
                removed
            }
            Err(e) => {
                warn!(marker, error = %e, "cache invalidation failed");
                0
            }
        }
    }

    /// Sweep every matching partition, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Cache` if the store cannot be enumerated or an
    /// entry cannot be deleted.
    pub fn try_invalidate(&self, marker: &str) -> Result<usize, CatalogError> {
        if marker.is_empty() {
            return Err(CatalogError::Cache(
                "refusing to invalidate with an empty marker".to_string(),
            ));
        }

        let mut removed = 0;
        for partition in self.store.partitions()? {
            if !partition.starts_with(&self.partition_prefix) {
                continue;
            }

            for url in self.store.keys(&partition)? {
                if url.contains(marker) && self.store.delete(&partition, &url)? {
                    debug!(%partition, %url, "cache entry deleted");
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cache::store::{CachedResponse, MemoryCacheStore};
    use serde_json::Value;

    fn seeded() -> MemoryCacheStore {
        let store = MemoryCacheStore::new();
        for (partition, url) in [
            ("api-cache-v1", "http://h/api/productos/"),
            ("api-cache-v1", "http://h/api/productos/7/"),
            ("api-cache-v1", "http://h/api/usuarios/"),
            ("api-cache-v0", "http://h/api/productos/?page=2"),
            ("static-assets", "http://h/api/productos/logo.png"),
        ] {
            store
                .put(partition, &CachedResponse::new(url, 200, Value::Null))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_invalidate_matching_entries_only() {
        let store = seeded();
        let invalidator = CacheInvalidator::new(&store, "api-cache");

        assert_eq!(invalidator.invalidate("/productos/"), 3);
        assert_eq!(store.keys("api-cache-v1").unwrap(), vec!["http://h/api/usuarios/"]);
        assert!(store.keys("api-cache-v0").unwrap().is_empty());
        // Partitions outside the naming convention are untouched.
        assert_eq!(store.keys("static-assets").unwrap().len(), 1);
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let store = seeded();
        let invalidator = CacheInvalidator::new(&store, "api-cache");

        invalidator.invalidate("/productos/");
        let after_once: Vec<_> = store
            .partitions()
            .unwrap()
            .into_iter()
            .map(|p| (p.clone(), store.keys(&p).unwrap()))
            .collect();

        assert_eq!(invalidator.invalidate("/productos/"), 0);
        let after_twice: Vec<_> = store
            .partitions()
            .unwrap()
            .into_iter()
            .map(|p| (p.clone(), store.keys(&p).unwrap()))
            .collect();

        assert_eq!(after_once, after_twice);
    }

    #[test]
    fn test_unavailable_cache_is_swallowed() {
        let store = MemoryCacheStore::unavailable();
        let invalidator = CacheInvalidator::new(&store, "api-cache");

        assert_eq!(invalidator.invalidate("/productos/"), 0);
        assert!(matches!(
            invalidator.try_invalidate("/productos/"),
            Err(CatalogError::Cache(_))
        ));
    }

    #[test]
    fn test_empty_marker_rejected() {
        let store = seeded();
        let invalidator = CacheInvalidator::new(&store, "api-cache");
        assert_eq!(invalidator.invalidate(""), 0);
        assert_eq!(store.keys("api-cache-v1").unwrap().len(), 3);
    }
}
