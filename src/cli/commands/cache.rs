//! Response cache command implementation.

use colored::Colorize;

use super::context::Context;
use crate::api::EntityKind;
use crate::cli::args::{CacheCommands, OutputFormat};
use crate::error::CatalogError;
use crate::features::cache::{CacheInvalidator, CacheStore, CachedResponse};
use crate::output::{format_cache_entries, to_json};

/// Execute cache subcommands.
///
/// # Errors
///
/// Returns `CatalogError::Cache` if the cache cannot be read or swept.
pub fn cache(ctx: &Context, cmd: CacheCommands) -> Result<String, CatalogError> {
    let store = ctx.cache_store()?;

    match cmd {
        CacheCommands::List => {
            let mut partitions = Vec::new();
            for name in store.partitions()? {
                let mut entries: Vec<CachedResponse> = Vec::new();
                for url in store.keys(&name)? {
                    if let Some(entry) = store.get(&name, &url)? {
                        entries.push(entry);
                    }
                }
                partitions.push((name, entries));
            }
            format_cache_entries(&partitions, ctx.format)
        }
        CacheCommands::Invalidate { marker } => {
            let marker = resolve_marker(&marker);
            let invalidator = CacheInvalidator::new(&store, &ctx.config.cache.partition_prefix);
            // Explicit requests report failures instead of swallowing them.
            let removed = invalidator.try_invalidate(&marker)?;

            match ctx.format {
                OutputFormat::Json => to_json(&serde_json::json!({
                    "marker": marker,
                    "removed": removed,
                })),
                OutputFormat::Pretty => Ok(format!(
                    "{} Removed {} cached responses matching {}",
                    "✓".green(),
                    removed,
                    marker.cyan()
                )),
            }
        }
    }
}

/// An entity kind name stands for its resource marker.
fn resolve_marker(raw: &str) -> String {
    raw.parse::<EntityKind>()
        .map_or_else(|_| raw.to_string(), EntityKind::cache_marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_marker() {
        assert_eq!(resolve_marker("product"), "/productos/");
        assert_eq!(resolve_marker("/roles/"), "/roles/");
    }
}
