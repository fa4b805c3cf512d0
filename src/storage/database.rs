//! `SQLite` database connection.
//!
//! The database is stored at `~/.catalog-sync/catalog.db` and contains tables for:
//! - The durable operation queue
//! - Client reference bindings for queued creates
//! - The HTTP response cache

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::CatalogError;

use super::migrations;

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at a specific path.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| {
            CatalogError::Persistence(format!("Failed to open database {}: {e}", path.display()))
        })?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| CatalogError::Persistence(format!("Failed to set busy timeout: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| CatalogError::Persistence(format!("Failed to enable WAL: {e}")))?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CatalogError::Persistence(format!("Failed to open in-memory database: {e}"))
        })?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    fn migrate(&self) -> Result<(), CatalogError> {
        migrations::run(&self.conn)
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, CatalogError> {
        migrations::get_version(&self.conn)
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
