//! Read-through cache for GET requests.

use serde_json::Value;
use tracing::{debug, warn};

use super::store::{CacheStore, CachedResponse};
use crate::api::{ApiClient, ApiRequest};
use crate::error::CatalogError;

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Cache,
    Network,
}

/// Serves reads from one cache partition, filling it on a miss.
///
/// This is the only component that writes cache entries. Cache failures
/// degrade to a network read and never fail the request.
pub struct CachedReader<'a> {
    api: &'a dyn ApiClient,
    store: &'a dyn CacheStore,
    partition: String,
}

impl<'a> CachedReader<'a> {
    #[must_use]
    pub fn new(api: &'a dyn ApiClient, store: &'a dyn CacheStore, partition: impl Into<String>) -> Self {
        Self {
            api,
            store,
            partition: partition.into(),
        }
    }

    /// Read an endpoint, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns the API client's error when a network read is needed and fails.
    pub fn get(&self, endpoint: &str) -> Result<(Value, ReadSource), CatalogError> {
        let url = self.api.url_for(endpoint)?;

        match self.store.get(&self.partition, &url) {
            Ok(Some(hit)) => {
                debug!(%url, "cache hit");
                return Ok((hit.body, ReadSource::Cache));
            }
            Ok(None) => debug!(%url, "cache miss"),
            Err(e) => warn!(%url, error = %e, "cache read failed"),
        }

        self.fetch(endpoint, &url).map(|body| (body, ReadSource::Network))
    }

    /// Read an endpoint from the network and replace its cache entry.
    ///
    /// # Errors
    ///
    /// Returns the API client's error.
    pub fn refresh(&self, endpoint: &str) -> Result<Value, CatalogError> {
        let url = self.api.url_for(endpoint)?;
        self.fetch(endpoint, &url)
    }

    fn fetch(&self, endpoint: &str, url: &str) -> Result<Value, CatalogError> {
        let body = self.api.send(&ApiRequest::get(endpoint))?;

        if let Err(e) = self
            .store
            .put(&self.partition, &CachedResponse::new(url, 200, body.clone()))
        {
            warn!(%url, error = %e, "cache write failed");
        }

        Ok(body)
    }
}
