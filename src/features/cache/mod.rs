//! Local API response cache: storage, invalidation and read-through.

pub mod invalidate;
pub mod reader;
pub mod store;

pub use invalidate::CacheInvalidator;
pub use reader::{CachedReader, ReadSource};
pub use store::{CacheStore, CachedResponse, MemoryCacheStore, SqliteCacheStore};
