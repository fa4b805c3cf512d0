//! Replays queued operations against the API once connectivity returns.
//!
//! Operations are sent in enqueue order. A successful replay removes the
//! record, binds the server id of a queued create to its client reference,
//! and invalidates the entity's cached responses. Failed records stay in the
//! queue unchanged, and when the run continues past them every later
//! operation on the same entity is held back.

use std::collections::HashSet;

use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use super::operation::QueuedOperation;
use super::store::OperationStore;
use crate::api::{response_id, Action, ApiClient, ApiRequest};
use crate::error::CatalogError;
use crate::features::cache::CacheInvalidator;
use crate::features::dispatch::replay_body;
use crate::features::image::BinaryTextCodec;

/// Configuration for a replay run.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Whether to stop at the first failed or blocked operation
    pub stop_on_error: bool,
    /// Report what would be sent without sending
    pub dry_run: bool,
    /// Maximum number of operations to look at
    pub limit: Option<usize>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            dry_run: false,
            limit: None,
        }
    }
}

/// Outcome of one queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStatus {
    Replayed,
    Failed,
    /// Targets a create that has no server id yet, or an entity whose
    /// earlier operation did not replay.
    Blocked,
    /// Dry run.
    Skipped,
}

/// Result of replaying a single operation.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayResult {
    pub id: i64,
    pub summary: String,
    pub status: ReplayStatus,
    pub error: Option<String>,
    /// HTTP status of a rejected request
    pub http_status: Option<u16>,
    /// Server id bound to the operation's client reference
    pub server_id: Option<String>,
}

impl ReplayResult {
    fn new(operation: &QueuedOperation, status: ReplayStatus) -> Self {
        Self {
            id: operation.id.unwrap_or(0),
            summary: operation.summary(),
            status,
            error: None,
            http_status: None,
            server_id: None,
        }
    }

    fn failed(operation: &QueuedOperation, error: &CatalogError) -> Self {
        Self {
            error: Some(error.to_string()),
            http_status: error.status(),
            ..Self::new(operation, ReplayStatus::Failed)
        }
    }
}

/// Result of a replay run.
#[derive(Debug, Default, Serialize)]
pub struct ReplayReport {
    pub replayed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub skipped: usize,
    /// The run ended before the queue was exhausted
    pub stopped_early: bool,
    pub results: Vec<ReplayResult>,
}

impl ReplayReport {
    /// Add a result.
    pub fn add(&mut self, result: ReplayResult) {
        match result.status {
            ReplayStatus::Replayed => self.replayed += 1,
            ReplayStatus::Failed => self.failed += 1,
            ReplayStatus::Blocked => self.blocked += 1,
            ReplayStatus::Skipped => self.skipped += 1,
        }
        self.results.push(result);
    }

    /// Check if nothing failed or was blocked.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.blocked == 0
    }

    /// Get total operations processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.replayed + self.failed + self.blocked + self.skipped
    }
}

/// Drains the operation queue in FIFO order.
pub struct QueueReplayer<'a> {
    api: &'a dyn ApiClient,
    queue: &'a dyn OperationStore,
    invalidator: &'a CacheInvalidator<'a>,
    codec: &'a dyn BinaryTextCodec,
    config: ReplayConfig,
}

impl<'a> QueueReplayer<'a> {
    #[must_use]
    pub fn new(
        api: &'a dyn ApiClient,
        queue: &'a dyn OperationStore,
        invalidator: &'a CacheInvalidator<'a>,
        codec: &'a dyn BinaryTextCodec,
    ) -> Self {
        Self {
            api,
            queue,
            invalidator,
            codec,
            config: ReplayConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Replay every pending operation, oldest first.
    ///
    /// A transport failure always ends the run; other failures end it when
    /// `stop_on_error` is set.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if the queue cannot be read or updated.
    pub fn run(&self) -> Result<ReplayReport, CatalogError> {
        let pending = self.queue.peek_all()?;
        let limit = self.config.limit.unwrap_or(usize::MAX);
        let mut report = ReplayReport::default();
        let mut held: HashSet<String> = HashSet::new();

        for (index, operation) in pending.iter().enumerate() {
            if index >= limit {
                report.stopped_early = true;
                break;
            }

            let keys = self.entity_keys(operation)?;
            let (result, fatal) = if keys.iter().any(|key| held.contains(key)) {
                let mut result = ReplayResult::new(operation, ReplayStatus::Blocked);
                result.error = Some("an earlier operation on this entity did not replay".to_string());
                (result, false)
            } else {
                self.replay_one(operation)?
            };

            let unfinished = matches!(result.status, ReplayStatus::Failed | ReplayStatus::Blocked);
            if unfinished {
                held.extend(keys);
            }
            let stop = fatal || (self.config.stop_on_error && unfinished);
            report.add(result);

            if stop {
                report.stopped_early = index + 1 < pending.len();
                break;
            }
        }

        info!(
            replayed = report.replayed,
            failed = report.failed,
            blocked = report.blocked,
            "replay finished"
        );
        Ok(report)
    }

    /// Replay one operation. The flag is set when the run cannot continue.
    fn replay_one(&self, operation: &QueuedOperation) -> Result<(ReplayResult, bool), CatalogError> {
        let Some(id) = operation.id else {
            return Err(CatalogError::Persistence(
                "queued operation has no id".to_string(),
            ));
        };

        let endpoint = match self.resolve_endpoint(operation)? {
            Some(endpoint) => endpoint,
            None => {
                let mut result = ReplayResult::new(operation, ReplayStatus::Blocked);
                result.error = Some(format!(
                    "waiting for pending:{}",
                    operation.target_ref.as_deref().unwrap_or("?")
                ));
                return Ok((result, false));
            }
        };

        if self.config.dry_run {
            return Ok((ReplayResult::new(operation, ReplayStatus::Skipped), false));
        }

        let body = match replay_body(
            operation.entity_kind,
            operation.action,
            &operation.payload,
            self.codec,
        ) {
            Ok(body) => body,
            Err(e) => {
                warn!(id, error = %e, "queued payload cannot be replayed");
                return Ok((ReplayResult::failed(operation, &e), false));
            }
        };

        let request = ApiRequest {
            method: operation.method,
            endpoint,
            body,
        };

        let response = match self.api.send(&request) {
            Ok(response) => response,
            Err(e) => {
                warn!(id, error = %e, "replay failed");
                let fatal = e.is_transport();
                return Ok((ReplayResult::failed(operation, &e), fatal));
            }
        };

        let mut result = ReplayResult::new(operation, ReplayStatus::Replayed);
        if let Some(client_ref) = &operation.client_ref {
            let Some(server_id) = response_id(&response) else {
                // Without an id the pending references could never resolve.
                warn!(id, %client_ref, "create response carried no id");
                let mut result = ReplayResult::new(operation, ReplayStatus::Failed);
                result.error = Some(format!(
                    "create response carried no id to bind to pending:{client_ref}"
                ));
                return Ok((result, false));
            };
            self.queue.bind_reference(client_ref, &server_id)?;
            result.server_id = Some(server_id);
        }

        self.queue.remove(id)?;
        self.invalidator
            .invalidate(&operation.entity_kind.cache_marker());
        info!(id, op = %operation.summary(), "operation replayed");

        Ok((result, false))
    }

    /// Identities of the entity an operation touches: its client reference,
    /// and for updates and deletes the resolved member endpoint.
    fn entity_keys(&self, operation: &QueuedOperation) -> Result<Vec<String>, CatalogError> {
        let mut keys = Vec::new();
        if let Some(client_ref) = operation.client_ref.as_ref().or(operation.target_ref.as_ref()) {
            keys.push(format!("pending:{client_ref}"));
        }
        if operation.action != Action::Create {
            if let Some(endpoint) = self.resolve_endpoint(operation)? {
                keys.push(endpoint);
            }
        }
        Ok(keys)
    }

    /// Endpoint with any pending placeholder filled in, or `None` if the
    /// referenced create has not been replayed yet.
    fn resolve_endpoint(&self, operation: &QueuedOperation) -> Result<Option<String>, CatalogError> {
        if !operation.needs_resolution() {
            return Ok(Some(operation.endpoint.clone()));
        }

        let Some(target_ref) = &operation.target_ref else {
            return Ok(None);
        };

        Ok(self
            .queue
            .resolve_reference(target_ref)?
            .map(|server_id| operation.resolved_endpoint(&server_id)))
    }
}

/// Format a replay report for display.
#[must_use]
pub fn format_replay_report(report: &ReplayReport) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Replay completed: {} operations", report.total()));
    lines.push("─".repeat(40));

    if report.replayed > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} replayed", report.replayed).green()
        ));
    }

    if report.failed > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} failed", report.failed).red()
        ));
    }

    if report.blocked > 0 {
        lines.push(format!(
            "  {} {}",
            "…".yellow(),
            format!("{} blocked", report.blocked).yellow()
        ));
    }

    if report.skipped > 0 {
        lines.push(format!(
            "  {} {}",
            "○".yellow(),
            format!("{} skipped (dry run)", report.skipped).yellow()
        ));
    }

    if report.stopped_early {
        lines.push("  Stopped early; remaining operations are still queued.".dimmed().to_string());
    }

    let errors: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.error.is_some())
        .take(3)
        .collect();

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for err in errors {
            lines.push(format!(
                "  - #{} {}: {}",
                err.id,
                err.summary,
                err.error.as_deref().unwrap_or("Unknown error")
            ));
        }
    }

    lines.join("\n")
}
