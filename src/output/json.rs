//! JSON output formatting for catalog-sync.

use serde::Serialize;
use serde_json::json;

use crate::api::EntityKind;
use crate::error::CatalogError;
use crate::features::cache::CachedResponse;
use crate::features::queue::QueuedOperation;

/// Format queued operations as JSON
///
/// # Errors
///
/// Returns `CatalogError::Parse` if JSON serialization fails.
pub fn format_operations_json(operations: &[QueuedOperation]) -> Result<String, CatalogError> {
    let output = json!({
        "count": operations.len(),
        "items": operations
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format entities returned by the API as JSON
///
/// # Errors
///
/// Returns `CatalogError::Parse` if JSON serialization fails.
pub fn format_entities_json(
    kind: EntityKind,
    items: &[serde_json::Value],
    from_cache: bool,
) -> Result<String, CatalogError> {
    let output = json!({
        "kind": kind,
        "count": items.len(),
        "cached": from_cache,
        "items": items
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format cache entries grouped by partition as JSON
///
/// # Errors
///
/// Returns `CatalogError::Parse` if JSON serialization fails.
pub fn format_cache_entries_json(
    partitions: &[(String, Vec<CachedResponse>)],
) -> Result<String, CatalogError> {
    let output: Vec<_> = partitions
        .iter()
        .map(|(name, entries)| {
            json!({
                "partition": name,
                "count": entries.len(),
                "urls": entries.iter().map(|e| &e.url).collect::<Vec<_>>(),
            })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `CatalogError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, CatalogError> {
    Ok(serde_json::to_string_pretty(value)?)
}
