//! Storage layer for catalog-sync.
//!
//! This module provides SQLite-based persistence for:
//! - The durable operation queue (offline writes)
//! - The HTTP response cache

mod database;
mod migrations;

pub use database::Database;
