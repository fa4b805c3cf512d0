//! Operation queue command implementation.

use chrono::Utc;
use colored::Colorize;

use super::context::Context;
use crate::cli::args::{OutputFormat, QueueCommands};
use crate::error::CatalogError;
use crate::features::cache::CacheInvalidator;
use crate::features::image::Base64Codec;
use crate::features::queue::{
    format_replay_report, OperationStore, QueueReplayer, ReplayConfig, SqliteOperationStore,
};
use crate::output::{format_operations, to_json};

/// Execute queue subcommands.
///
/// # Errors
///
/// Returns an error if the queue cannot be read or updated, or a replay
/// cannot reach the API.
pub fn queue(ctx: &Context, cmd: QueueCommands) -> Result<String, CatalogError> {
    let store = ctx.operation_store()?;

    match cmd {
        QueueCommands::Status => show_status(&store, ctx.format),
        QueueCommands::List { limit } => {
            let mut operations = store.peek_all()?;
            if let Some(limit) = limit {
                operations.truncate(limit);
            }
            format_operations(&operations, ctx.format)
        }
        QueueCommands::Run {
            continue_on_error,
            dry_run,
            limit,
        } => run_replay(
            ctx,
            &store,
            ReplayConfig {
                stop_on_error: !continue_on_error,
                dry_run,
                limit,
            },
        ),
        QueueCommands::Remove { id } => remove_operation(&store, id, ctx.format),
        QueueCommands::Clear { force } => clear_operations(&store, force, ctx.format),
    }
}

/// Show queue status.
fn show_status(store: &SqliteOperationStore, format: OutputFormat) -> Result<String, CatalogError> {
    let stats = store.stats()?;

    match format {
        OutputFormat::Json => {
            let data = serde_json::json!({
                "pending": stats.pending,
                "bound_refs": stats.bound_refs,
                "oldest_pending": stats.oldest_pending.map(|t| t.to_rfc3339()),
            });
            to_json(&data)
        }
        OutputFormat::Pretty => {
            let mut lines = Vec::new();

            lines.push("Operation Queue Status".bold().to_string());
            lines.push("─".repeat(40));

            lines.push(format!(
                "  Pending:    {} {}",
                stats.pending,
                if stats.pending > 0 {
                    "operations waiting".dimmed()
                } else {
                    "".dimmed()
                }
            ));

            lines.push(format!(
                "  References: {} {}",
                stats.bound_refs,
                "queued creates resolved".dimmed()
            ));

            if let Some(oldest) = stats.oldest_pending {
                let age = Utc::now().signed_duration_since(oldest);
                let age_str = if age.num_hours() > 0 {
                    format!("{} hours ago", age.num_hours())
                } else if age.num_minutes() > 0 {
                    format!("{} minutes ago", age.num_minutes())
                } else {
                    "just now".to_string()
                };
                lines.push(format!("  Oldest:     {}", age_str.dimmed()));
            }

            if stats.pending > 0 {
                lines.push(String::new());
                lines.push(
                    "Run 'catalog-sync queue run' to send pending operations"
                        .dimmed()
                        .to_string(),
                );
            }

            Ok(lines.join("\n"))
        }
    }
}

/// Replay queued operations.
fn run_replay(
    ctx: &Context,
    store: &SqliteOperationStore,
    config: ReplayConfig,
) -> Result<String, CatalogError> {
    let api = ctx.api()?;
    let cache = ctx.cache_store()?;
    let invalidator = CacheInvalidator::new(&cache, &ctx.config.cache.partition_prefix);

    let report = QueueReplayer::new(&api, store, &invalidator, &Base64Codec)
        .with_config(config)
        .run()?;

    match ctx.format {
        OutputFormat::Json => to_json(&report),
        OutputFormat::Pretty => Ok(format_replay_report(&report)),
    }
}

/// Remove one operation without replaying it.
fn remove_operation(
    store: &SqliteOperationStore,
    id: i64,
    format: OutputFormat,
) -> Result<String, CatalogError> {
    let Some(operation) = store.get(id)? else {
        return Err(CatalogError::NotFound(format!("queued operation #{id}")));
    };
    store.remove(id)?;

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "removed": operation })),
        OutputFormat::Pretty => Ok(format!(
            "{} Removed #{} {}",
            "✓".green(),
            id,
            operation.summary()
        )),
    }
}

/// Clear the queue.
fn clear_operations(
    store: &SqliteOperationStore,
    force: bool,
    format: OutputFormat,
) -> Result<String, CatalogError> {
    if !force {
        let pending = store.pending_count()?;
        return Err(CatalogError::Validation(format!(
            "clearing drops {pending} queued write(s) for good; pass --force to confirm"
        )));
    }

    let removed = store.clear()?;

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "cleared": removed })),
        OutputFormat::Pretty => Ok(format!("{} Cleared {} operations", "✓".green(), removed)),
    }
}
