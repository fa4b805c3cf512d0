//! Partitioned, URL-keyed storage of API responses.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CatalogError;
use crate::storage::Database;

/// A stored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub body: Value,
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16, body: Value) -> Self {
        Self {
            url: url.into(),
            status,
            body,
            stored_at: Utc::now(),
        }
    }
}

/// Enumerate / read / write / delete access to the response cache.
///
/// Every failure is reported as `CatalogError::Cache`.
pub trait CacheStore {
    /// Names of all partitions holding at least one entry.
    fn partitions(&self) -> Result<Vec<String>, CatalogError>;

    /// Request URLs stored in one partition.
    fn keys(&self, partition: &str) -> Result<Vec<String>, CatalogError>;

    /// Delete one entry. Returns whether it existed.
    fn delete(&self, partition: &str, url: &str) -> Result<bool, CatalogError>;

    /// Store or replace an entry.
    fn put(&self, partition: &str, response: &CachedResponse) -> Result<(), CatalogError>;

    fn get(&self, partition: &str, url: &str) -> Result<Option<CachedResponse>, CatalogError>;
}

/// Cache store in the `http_cache` table.
pub struct SqliteCacheStore {
    db: Database,
}

impl SqliteCacheStore {
    #[must_use]
    pub const fn with_database(db: Database) -> Self {
        Self { db }
    }
}

impl CacheStore for SqliteCacheStore {
    fn partitions(&self) -> Result<Vec<String>, CatalogError> {
        let conn = self.db.connection();
        let mut stmt = conn
            .prepare("SELECT DISTINCT partition FROM http_cache ORDER BY partition")
            .map_err(|e| CatalogError::Cache(format!("Failed to prepare query: {e}")))?;

        let names = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<Result<Vec<String>, _>>())
            .map_err(|e| CatalogError::Cache(format!("Failed to list partitions: {e}")))?;

        Ok(names)
    }

    fn keys(&self, partition: &str) -> Result<Vec<String>, CatalogError> {
        let conn = self.db.connection();
        let mut stmt = conn
            .prepare("SELECT url FROM http_cache WHERE partition = ?1 ORDER BY url")
            .map_err(|e| CatalogError::Cache(format!("Failed to prepare query: {e}")))?;

        let urls = stmt
            .query_map([partition], |row| row.get(0))
            .and_then(|rows| rows.collect::<Result<Vec<String>, _>>())
            .map_err(|e| CatalogError::Cache(format!("Failed to list keys: {e}")))?;

        Ok(urls)
    }

    fn delete(&self, partition: &str, url: &str) -> Result<bool, CatalogError> {
        let rows = self
            .db
            .connection()
            .execute(
                "DELETE FROM http_cache WHERE partition = ?1 AND url = ?2",
                params![partition, url],
            )
            .map_err(|e| CatalogError::Cache(format!("Failed to delete entry: {e}")))?;

        Ok(rows > 0)
    }

    fn put(&self, partition: &str, response: &CachedResponse) -> Result<(), CatalogError> {
        let body = serde_json::to_string(&response.body)
            .map_err(|e| CatalogError::Cache(format!("Failed to encode body: {e}")))?;

        self.db
            .connection()
            .execute(
                r"INSERT OR REPLACE INTO http_cache (partition, url, status, body, stored_at)
                  VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    partition,
                    response.url,
                    response.status,
                    body,
                    response.stored_at.to_rfc3339()
                ],
            )
            .map_err(|e| CatalogError::Cache(format!("Failed to store entry: {e}")))?;

        Ok(())
    }

    fn get(&self, partition: &str, url: &str) -> Result<Option<CachedResponse>, CatalogError> {
        let row: Option<(u16, String, String)> = self
            .db
            .connection()
            .query_row(
                "SELECT status, body, stored_at FROM http_cache WHERE partition = ?1 AND url = ?2",
                params![partition, url],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| CatalogError::Cache(format!("Failed to read entry: {e}")))?;

        let Some((status, body, stored_at)) = row else {
            return Ok(None);
        };

        let body = serde_json::from_str(&body)
            .map_err(|e| CatalogError::Cache(format!("Corrupt cache entry for {url}: {e}")))?;
        let stored_at = DateTime::parse_from_rfc3339(&stored_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| CatalogError::Cache(format!("Corrupt cache timestamp for {url}: {e}")))?;

        Ok(Some(CachedResponse {
            url: url.to_string(),
            status,
            body,
            stored_at,
        }))
    }
}

type Partitions = BTreeMap<String, BTreeMap<String, CachedResponse>>;

/// In-memory cache store.
///
/// An unavailable store fails every call, the way a missing cache API would.
#[derive(Default)]
pub struct MemoryCacheStore {
    partitions: Mutex<Partitions>,
    unavailable: bool,
}

impl MemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            partitions: Mutex::default(),
            unavailable: true,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Partitions>, CatalogError> {
        if self.unavailable {
            return Err(CatalogError::Cache("cache storage is unavailable".to_string()));
        }
        self.partitions
            .lock()
            .map_err(|_| CatalogError::Cache("cache lock poisoned".to_string()))
    }
}

impl CacheStore for MemoryCacheStore {
    fn partitions(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn keys(&self, partition: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .lock()?
            .get(partition)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn delete(&self, partition: &str, url: &str) -> Result<bool, CatalogError> {
        Ok(self
            .lock()?
            .get_mut(partition)
            .is_some_and(|entries| entries.remove(url).is_some()))
    }

    fn put(&self, partition: &str, response: &CachedResponse) -> Result<(), CatalogError> {
        self.lock()?
            .entry(partition.to_string())
            .or_default()
            .insert(response.url.clone(), response.clone());
        Ok(())
    }

    fn get(&self, partition: &str, url: &str) -> Result<Option<CachedResponse>, CatalogError> {
        Ok(self
            .lock()?
            .get(partition)
            .and_then(|entries| entries.get(url))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exercise(store: &dyn CacheStore) {
        let list = CachedResponse::new("http://h/api/productos/", 200, json!([{"id": 1}]));
        let detail = CachedResponse::new("http://h/api/productos/1/", 200, json!({"id": 1}));
        store.put("api-cache-v1", &list).unwrap();
        store.put("api-cache-v1", &detail).unwrap();
        store.put("images", &CachedResponse::new("http://h/img.jpg", 200, Value::Null)).unwrap();

        assert_eq!(store.partitions().unwrap(), vec!["api-cache-v1", "images"]);
        assert_eq!(
            store.keys("api-cache-v1").unwrap(),
            vec!["http://h/api/productos/", "http://h/api/productos/1/"]
        );

        let loaded = store.get("api-cache-v1", "http://h/api/productos/1/").unwrap().unwrap();
        assert_eq!(loaded.body, json!({"id": 1}));
        assert_eq!(loaded.status, 200);

        assert!(store.delete("api-cache-v1", "http://h/api/productos/1/").unwrap());
        assert!(!store.delete("api-cache-v1", "http://h/api/productos/1/").unwrap());
        assert!(store.get("api-cache-v1", "http://h/api/productos/1/").unwrap().is_none());
        assert!(store.keys("missing").unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_cache_store() {
        let store = SqliteCacheStore::with_database(Database::open_in_memory().unwrap());
        exercise(&store);
    }

    #[test]
    fn test_memory_cache_store() {
        exercise(&MemoryCacheStore::new());
    }

    #[test]
    fn test_put_replaces() {
        let store = SqliteCacheStore::with_database(Database::open_in_memory().unwrap());
        store.put("p", &CachedResponse::new("u", 200, json!(1))).unwrap();
        store.put("p", &CachedResponse::new("u", 200, json!(2))).unwrap();

        assert_eq!(store.keys("p").unwrap().len(), 1);
        assert_eq!(store.get("p", "u").unwrap().unwrap().body, json!(2));
    }

    #[test]
    fn test_unavailable_store_fails_with_cache_error() {
        let store = MemoryCacheStore::unavailable();
        assert!(matches!(store.partitions(), Err(CatalogError::Cache(_))));
        assert!(matches!(
            store.put("p", &CachedResponse::new("u", 200, Value::Null)),
            Err(CatalogError::Cache(_))
        ));
    }
}
