//! Output formatting for catalog-sync.
//!
//! Every formatter renders either human-readable colored text or pretty JSON.

mod json;
mod pretty;

use serde_json::Value;

use crate::api::EntityKind;
use crate::cli::args::OutputFormat;
use crate::error::CatalogError;
use crate::features::cache::CachedResponse;
use crate::features::dispatch::MutationOutcome;
use crate::features::queue::QueuedOperation;

pub use json::*;
pub use pretty::*;

/// Items of a list response; paginated bodies carry them under `results`.
#[must_use]
pub fn list_items(body: &Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.clone(),
            _ => vec![body.clone()],
        },
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Format a list of entities based on output format
///
/// # Errors
///
/// Returns `CatalogError::Parse` if JSON serialization fails.
pub fn format_entities(
    kind: EntityKind,
    body: &Value,
    from_cache: bool,
    format: OutputFormat,
) -> Result<String, CatalogError> {
    let items = list_items(body);
    match format {
        OutputFormat::Pretty => Ok(format_entities_pretty(kind, &items, from_cache)),
        OutputFormat::Json => format_entities_json(kind, &items, from_cache),
    }
}

/// Format a single entity based on output format
///
/// # Errors
///
/// Returns `CatalogError::Parse` if JSON serialization fails.
pub fn format_entity(item: &Value, format: OutputFormat) -> Result<String, CatalogError> {
    match format {
        OutputFormat::Pretty => Ok(format_entity_pretty(item)),
        OutputFormat::Json => to_json(item),
    }
}

/// Format a mutation outcome based on output format
///
/// # Errors
///
/// Returns `CatalogError::Parse` if JSON serialization fails.
pub fn format_outcome(
    kind: EntityKind,
    outcome: &MutationOutcome,
    format: OutputFormat,
) -> Result<String, CatalogError> {
    match format {
        OutputFormat::Pretty => Ok(format_outcome_pretty(kind, outcome)),
        OutputFormat::Json => to_json(outcome),
    }
}

/// Format queued operations based on output format
///
/// # Errors
///
/// Returns `CatalogError::Parse` if JSON serialization fails.
pub fn format_operations(
    operations: &[QueuedOperation],
    format: OutputFormat,
) -> Result<String, CatalogError> {
    match format {
        OutputFormat::Pretty => Ok(format_operations_pretty(operations)),
        OutputFormat::Json => format_operations_json(operations),
    }
}

/// Format cache entries based on output format
///
/// # Errors
///
/// Returns `CatalogError::Parse` if JSON serialization fails.
pub fn format_cache_entries(
    partitions: &[(String, Vec<CachedResponse>)],
    format: OutputFormat,
) -> Result<String, CatalogError> {
    match format {
        OutputFormat::Pretty => Ok(format_cache_entries_pretty(partitions)),
        OutputFormat::Json => format_cache_entries_json(partitions),
    }
}
