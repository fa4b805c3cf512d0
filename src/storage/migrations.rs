//! Database migrations for catalog-sync.
//!
//! Each migration upgrades the schema by one version. Migrations are run
//! automatically when the database is opened.

use rusqlite::Connection;

use crate::error::CatalogError;

/// Current schema version.
const CURRENT_VERSION: i32 = 1;

/// Get the current schema version from the database.
///
/// Returns 0 if no version has been set (new database).
pub fn get_version(conn: &Connection) -> Result<i32, CatalogError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| CatalogError::Persistence(format!("Failed to get schema version: {e}")))
}

fn set_version(conn: &Connection, version: i32) -> Result<(), CatalogError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| CatalogError::Persistence(format!("Failed to set schema version: {e}")))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), CatalogError> {
    let current = get_version(conn)?;

    if current >= CURRENT_VERSION {
        return Ok(());
    }

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> Result<(), CatalogError> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(CatalogError::Persistence(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Creates tables for:
/// - `operation_queue`: deferred writes, FIFO by autoincrement id
/// - `client_refs`: server ids assigned to creates that were queued offline
/// - `http_cache`: URL-keyed API responses grouped into named partitions
fn migrate_v1(conn: &Connection) -> Result<(), CatalogError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS operation_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_kind TEXT NOT NULL,
            action TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            method TEXT NOT NULL,
            payload TEXT NOT NULL,
            client_ref TEXT,
            target_ref TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_operation_queue_client_ref
        ON operation_queue(client_ref);

        CREATE TABLE IF NOT EXISTS client_refs (
            client_ref TEXT PRIMARY KEY,
            server_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS http_cache (
            partition TEXT NOT NULL,
            url TEXT NOT NULL,
            status INTEGER NOT NULL,
            body TEXT NOT NULL,
            stored_at TEXT NOT NULL,
            PRIMARY KEY (partition, url)
        );
        ",
    )
    .map_err(|e| CatalogError::Persistence(format!("Migration v1 failed: {e}")))
}
