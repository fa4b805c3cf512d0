//! Durable storage for queued operations.
//!
//! The [`OperationStore`] trait is the seam the dispatcher and the replayer
//! depend on; [`SqliteOperationStore`] persists across restarts and
//! [`MemoryOperationStore`] backs tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::operation::QueuedOperation;
use crate::error::CatalogError;
use crate::storage::Database;

/// Append / enumerate / remove access to pending operations.
///
/// Enumeration order is enqueue order. Operations are never edited in place.
pub trait OperationStore {
    /// Append an operation and assign its id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if the operation could not be stored.
    fn enqueue(&self, operation: &mut QueuedOperation) -> Result<i64, CatalogError>;

    /// All pending operations, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if storage cannot be read.
    fn peek_all(&self) -> Result<Vec<QueuedOperation>, CatalogError>;

    /// Delete one operation after a successful replay. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if the delete fails.
    fn remove(&self, id: i64) -> Result<bool, CatalogError>;

    /// Record the server id assigned to a queued create.
    ///
    /// Bindings outlive the operations that reference them, so a
    /// `pending:<ref>` keeps resolving after its create has replayed. Only
    /// clearing the queue drops them.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if the binding cannot be stored.
    fn bind_reference(&self, client_ref: &str, server_id: &str) -> Result<(), CatalogError>;

    /// Server id bound to a client reference, if the create has been replayed.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if storage cannot be read.
    fn resolve_reference(&self, client_ref: &str) -> Result<Option<String>, CatalogError>;

    /// Number of pending operations.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if storage cannot be read.
    fn pending_count(&self) -> Result<usize, CatalogError> {
        Ok(self.peek_all()?.len())
    }

    /// Whether a create carrying this client reference is still queued.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if storage cannot be read.
    fn has_pending_create(&self, client_ref: &str) -> Result<bool, CatalogError> {
        Ok(self
            .peek_all()?
            .iter()
            .any(|op| op.client_ref.as_deref() == Some(client_ref)))
    }
}

/// Queue statistics.
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Number of pending operations
    pub pending: i64,
    /// Number of bound client references
    pub bound_refs: i64,
    /// Oldest pending operation timestamp
    pub oldest_pending: Option<DateTime<Utc>>,
}

/// SQLite-backed operation store.
pub struct SqliteOperationStore {
    db: Database,
}

impl SqliteOperationStore {
    /// Create a store over an existing database connection.
    #[must_use]
    pub const fn with_database(db: Database) -> Self {
        Self { db }
    }

    /// Get a specific operation by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, id: i64) -> Result<Option<QueuedOperation>, CatalogError> {
        let conn = self.db.connection();

        let raw = conn
            .query_row(
                r"SELECT id, entity_kind, action, endpoint, method, payload,
                         client_ref, target_ref, created_at
                  FROM operation_queue
                  WHERE id = ?1",
                [id],
                RawOperation::from_row,
            )
            .optional()
            .map_err(|e| CatalogError::Persistence(format!("Failed to query operation: {e}")))?;

        raw.map(RawOperation::into_operation).transpose()
    }

    /// Get queue statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stats(&self) -> Result<QueueStats, CatalogError> {
        let conn = self.db.connection();

        let pending: i64 = conn
            .query_row("SELECT COUNT(*) FROM operation_queue", [], |row| row.get(0))
            .map_err(|e| CatalogError::Persistence(format!("Failed to count pending: {e}")))?;

        let bound_refs: i64 = conn
            .query_row("SELECT COUNT(*) FROM client_refs", [], |row| row.get(0))
            .map_err(|e| CatalogError::Persistence(format!("Failed to count refs: {e}")))?;

        let oldest_pending: Option<String> = conn
            .query_row(
                "SELECT created_at FROM operation_queue ORDER BY id ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CatalogError::Persistence(format!("Failed to get oldest pending: {e}")))?;

        Ok(QueueStats {
            pending,
            bound_refs,
            oldest_pending: oldest_pending
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|t| t.with_timezone(&Utc)),
        })
    }

    /// Drop every pending operation and reference binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> Result<usize, CatalogError> {
        let conn = self.db.connection();

        let rows = conn
            .execute("DELETE FROM operation_queue", [])
            .map_err(|e| CatalogError::Persistence(format!("Failed to clear queue: {e}")))?;
        conn.execute("DELETE FROM client_refs", [])
            .map_err(|e| CatalogError::Persistence(format!("Failed to clear refs: {e}")))?;

        Ok(rows)
    }
}

impl OperationStore for SqliteOperationStore {
    fn enqueue(&self, operation: &mut QueuedOperation) -> Result<i64, CatalogError> {
        let conn = self.db.connection();
        let payload = serde_json::to_string(&operation.payload)
            .map_err(|e| CatalogError::Persistence(format!("Failed to encode payload: {e}")))?;

        conn.execute(
            r"INSERT INTO operation_queue
              (entity_kind, action, endpoint, method, payload, client_ref, target_ref, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                operation.entity_kind.to_string(),
                operation.action.as_str(),
                operation.endpoint,
                operation.method.as_str(),
                payload,
                operation.client_ref,
                operation.target_ref,
                operation.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| CatalogError::Persistence(format!("Failed to enqueue operation: {e}")))?;

        let id = conn.last_insert_rowid();
        operation.id = Some(id);
        debug!(id, op = %operation.summary(), "operation persisted");
        Ok(id)
    }

    fn peek_all(&self) -> Result<Vec<QueuedOperation>, CatalogError> {
        let conn = self.db.connection();

        let mut stmt = conn
            .prepare(
                r"SELECT id, entity_kind, action, endpoint, method, payload,
                         client_ref, target_ref, created_at
                  FROM operation_queue
                  ORDER BY id ASC",
            )
            .map_err(|e| CatalogError::Persistence(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], RawOperation::from_row)
            .map_err(|e| CatalogError::Persistence(format!("Failed to query queue: {e}")))?;

        let mut operations = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| CatalogError::Persistence(e.to_string()))?;
            operations.push(raw.into_operation()?);
        }

        Ok(operations)
    }

    fn remove(&self, id: i64) -> Result<bool, CatalogError> {
        let conn = self.db.connection();

        let rows = conn
            .execute("DELETE FROM operation_queue WHERE id = ?1", [id])
            .map_err(|e| CatalogError::Persistence(format!("Failed to remove operation: {e}")))?;

        Ok(rows > 0)
    }

    fn bind_reference(&self, client_ref: &str, server_id: &str) -> Result<(), CatalogError> {
        let conn = self.db.connection();

        conn.execute(
            "INSERT OR REPLACE INTO client_refs (client_ref, server_id) VALUES (?1, ?2)",
            params![client_ref, server_id],
        )
        .map_err(|e| CatalogError::Persistence(format!("Failed to bind reference: {e}")))?;

        Ok(())
    }

    fn resolve_reference(&self, client_ref: &str) -> Result<Option<String>, CatalogError> {
        let conn = self.db.connection();

        conn.query_row(
            "SELECT server_id FROM client_refs WHERE client_ref = ?1",
            [client_ref],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CatalogError::Persistence(format!("Failed to resolve reference: {e}")))
    }

    fn pending_count(&self) -> Result<usize, CatalogError> {
        let count: i64 = self
            .db
            .connection()
            .query_row("SELECT COUNT(*) FROM operation_queue", [], |row| row.get(0))
            .map_err(|e| CatalogError::Persistence(format!("Failed to count pending: {e}")))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn has_pending_create(&self, client_ref: &str) -> Result<bool, CatalogError> {
        let count: i64 = self
            .db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM operation_queue WHERE client_ref = ?1",
                [client_ref],
                |row| row.get(0),
            )
            .map_err(|e| CatalogError::Persistence(format!("Failed to look up reference: {e}")))?;

        Ok(count > 0)
    }
}

/// Column values as stored, before parsing into domain types.
struct RawOperation {
    id: i64,
    entity_kind: String,
    action: String,
    endpoint: String,
    method: String,
    payload: String,
    client_ref: Option<String>,
    target_ref: Option<String>,
    created_at: String,
}

impl RawOperation {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            entity_kind: row.get(1)?,
            action: row.get(2)?,
            endpoint: row.get(3)?,
            method: row.get(4)?,
            payload: row.get(5)?,
            client_ref: row.get(6)?,
            target_ref: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_operation(self) -> Result<QueuedOperation, CatalogError> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                CatalogError::Persistence(format!("Operation {} has a bad timestamp: {e}", self.id))
            })?;

        Ok(QueuedOperation {
            id: Some(self.id),
            entity_kind: self.entity_kind.parse()?,
            action: self.action.parse()?,
            endpoint: self.endpoint,
            method: self.method.parse()?,
            payload: serde_json::from_str(&self.payload).map_err(|e| {
                CatalogError::Persistence(format!("Operation {} has a bad payload: {e}", self.id))
            })?,
            client_ref: self.client_ref,
            target_ref: self.target_ref,
            created_at,
        })
    }
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    operations: Vec<QueuedOperation>,
    refs: HashMap<String, String>,
}

/// In-memory operation store.
///
/// An optional capacity makes `enqueue` fail once full, the way a storage
/// quota would.
#[derive(Default)]
pub struct MemoryOperationStore {
    state: Mutex<MemoryState>,
    capacity: Option<usize>,
}

impl MemoryOperationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses appends beyond `capacity` operations.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::default(),
            capacity: Some(capacity),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, CatalogError> {
        self.state
            .lock()
            .map_err(|_| CatalogError::Persistence("operation store lock poisoned".to_string()))
    }
}

impl OperationStore for MemoryOperationStore {
    fn enqueue(&self, operation: &mut QueuedOperation) -> Result<i64, CatalogError> {
        let mut state = self.lock()?;

        if self.capacity.is_some_and(|cap| state.operations.len() >= cap) {
            return Err(CatalogError::Persistence("storage quota exceeded".to_string()));
        }

        state.next_id += 1;
        let id = state.next_id;
        operation.id = Some(id);
        state.operations.push(operation.clone());
        Ok(id)
    }

    fn peek_all(&self) -> Result<Vec<QueuedOperation>, CatalogError> {
        Ok(self.lock()?.operations.clone())
    }

    fn remove(&self, id: i64) -> Result<bool, CatalogError> {
        let mut state = self.lock()?;
        let before = state.operations.len();
        state.operations.retain(|op| op.id != Some(id));
        Ok(state.operations.len() < before)
    }

    fn bind_reference(&self, client_ref: &str, server_id: &str) -> Result<(), CatalogError> {
        self.lock()?
            .refs
            .insert(client_ref.to_string(), server_id.to_string());
        Ok(())
    }

    fn resolve_reference(&self, client_ref: &str) -> Result<Option<String>, CatalogError> {
        Ok(self.lock()?.refs.get(client_ref).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Action, EntityKind, HttpMethod};
    use serde_json::{json, Map, Value};

    fn create_test_store() -> SqliteOperationStore {
        SqliteOperationStore::with_database(Database::open_in_memory().unwrap())
    }

    fn product_create(name: &str) -> QueuedOperation {
        let payload = json!({"nombre": name, "precio": 10.0});
        QueuedOperation::new(
            EntityKind::Product,
            Action::Create,
            "productos/".into(),
            payload.as_object().cloned().unwrap(),
        )
    }

    fn product_delete(id: &str) -> QueuedOperation {
        QueuedOperation::new(
            EntityKind::Product,
            Action::Delete,
            format!("productos/{id}/"),
            Map::new(),
        )
    }

    #[test]
    fn test_enqueue_and_get() {
        let store = create_test_store();

        let mut op = product_create("Lamp");
        let id = store.enqueue(&mut op).unwrap();
        assert_eq!(op.id, Some(id));

        let loaded = store.get(id).unwrap().unwrap();
        assert_eq!(loaded.action, Action::Create);
        assert_eq!(loaded.method, HttpMethod::Post);
        assert_eq!(loaded.payload["nombre"], "Lamp");
        assert_eq!(loaded.created_at.timestamp(), op.created_at.timestamp());
    }

    #[test]
    fn test_peek_all_is_fifo() {
        let store = create_test_store();

        let mut first = product_create("First");
        let mut second = product_delete("3");
        let mut third = product_create("Third");
        store.enqueue(&mut first).unwrap();
        store.enqueue(&mut second).unwrap();
        store.enqueue(&mut third).unwrap();

        let pending = store.peek_all().unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].payload["nombre"], "First");
        assert_eq!(pending[1].action, Action::Delete);
        assert_eq!(pending[2].payload["nombre"], "Third");
    }

    #[test]
    fn test_remove() {
        let store = create_test_store();

        let mut op = product_delete("7");
        let id = store.enqueue(&mut op).unwrap();

        assert!(store.remove(id).unwrap());
        assert!(!store.remove(id).unwrap());
        assert!(store.get(id).unwrap().is_none());
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_references() {
        let store = create_test_store();

        let mut op = product_create("Lamp").with_client_ref("ref-1");
        store.enqueue(&mut op).unwrap();
        assert!(store.has_pending_create("ref-1").unwrap());
        assert!(!store.has_pending_create("ref-2").unwrap());

        assert_eq!(store.resolve_reference("ref-1").unwrap(), None);
        store.bind_reference("ref-1", "42").unwrap();
        assert_eq!(store.resolve_reference("ref-1").unwrap(), Some("42".to_string()));
    }

    #[test]
    fn test_stats_and_clear() {
        let store = create_test_store();

        let mut a = product_create("A");
        let mut b = product_create("B");
        store.enqueue(&mut a).unwrap();
        store.enqueue(&mut b).unwrap();
        store.bind_reference("x", "1").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.bound_refs, 1);
        assert!(stats.oldest_pending.is_some());

        assert_eq!(store.clear().unwrap(), 2);
        let stats = store.stats().unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.bound_refs, 0);
        assert_eq!(store.resolve_reference("x").unwrap(), None);
    }

    #[test]
    fn test_binding_outlives_replayed_create() {
        let store = create_test_store();

        let mut op = product_create("Lamp").with_client_ref("ref-1");
        let id = store.enqueue(&mut op).unwrap();
        store.bind_reference("ref-1", "42").unwrap();
        store.remove(id).unwrap();

        assert!(!store.has_pending_create("ref-1").unwrap());
        assert_eq!(store.resolve_reference("ref-1").unwrap().as_deref(), Some("42"));
    }

    #[test]
    fn test_corrupt_payload_is_persistence_error() {
        let store = create_test_store();

        let mut op = product_delete("7");
        let id = store.enqueue(&mut op).unwrap();
        store
            .db
            .connection()
            .execute("UPDATE operation_queue SET payload = 'not json' WHERE id = ?1", [id])
            .unwrap();

        let err = store.peek_all().unwrap_err();
        assert!(matches!(err, CatalogError::Persistence(ref msg) if msg.contains("bad payload")));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.db");

        {
            let store = SqliteOperationStore::with_database(Database::open_at(&path).unwrap());
            let mut op = product_create("Lamp");
            store.enqueue(&mut op).unwrap();
        }

        let store = SqliteOperationStore::with_database(Database::open_at(&path).unwrap());
        let pending = store.peek_all().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload["nombre"], "Lamp");
    }

    #[test]
    fn test_back_to_back_enqueues_from_two_connections() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.db");

        let one = SqliteOperationStore::with_database(Database::open_at(&path).unwrap());
        let two = SqliteOperationStore::with_database(Database::open_at(&path).unwrap());

        for i in 0..5 {
            let mut a = product_create(&format!("a{i}"));
            let mut b = product_create(&format!("b{i}"));
            one.enqueue(&mut a).unwrap();
            two.enqueue(&mut b).unwrap();
        }

        let names: Vec<Value> = one
            .peek_all()
            .unwrap()
            .into_iter()
            .map(|op| op.payload["nombre"].clone())
            .collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "a0");
        assert_eq!(names[1], "b0");
        assert_eq!(names[9], "b4");
    }

    #[test]
    fn test_memory_store_fifo_and_quota() {
        let store = MemoryOperationStore::with_capacity(1);

        let mut first = product_create("First");
        store.enqueue(&mut first).unwrap();

        let mut second = product_create("Second");
        let err = store.enqueue(&mut second).unwrap_err();
        assert!(matches!(err, CatalogError::Persistence(_)));
        assert!(second.id.is_none());

        assert_eq!(store.pending_count().unwrap(), 1);
        assert!(store.remove(first.id.unwrap()).unwrap());
        assert_eq!(store.pending_count().unwrap(), 0);
    }
}
