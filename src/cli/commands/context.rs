//! Shared state for command execution: paths, settings and collaborators.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::api::HttpApiClient;
use crate::cli::args::OutputFormat;
use crate::config::{Config, Paths};
use crate::error::CatalogError;
use crate::features::cache::SqliteCacheStore;
use crate::features::connectivity::{self, Connectivity};
use crate::features::queue::SqliteOperationStore;
use crate::storage::Database;

/// Everything a command needs, resolved once from flags and `config.yaml`.
pub struct Context {
    pub paths: Paths,
    pub config: Config,
    pub format: OutputFormat,
    connectivity_override: Option<bool>,
}

impl Context {
    /// Resolve the data directory and load settings.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Config` if the home directory is unknown or the
    /// config file is invalid.
    pub fn load(
        home: Option<PathBuf>,
        format: Option<OutputFormat>,
        connectivity_override: Option<bool>,
    ) -> Result<Self, CatalogError> {
        let paths = match home {
            Some(root) => Paths::with_root(root),
            None => Paths::new()?,
        };
        let config = Config::load_from_path(&paths.config_file)?;
        let format = format.unwrap_or(config.general.default_output);

        Ok(Self {
            paths,
            config,
            format,
            connectivity_override,
        })
    }

    fn database(&self) -> Result<Database, CatalogError> {
        self.paths.ensure_dirs()?;
        Database::open_at(&self.paths.database)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if the database cannot be opened.
    pub fn operation_store(&self) -> Result<SqliteOperationStore, CatalogError> {
        Ok(SqliteOperationStore::with_database(self.database()?))
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Persistence` if the database cannot be opened.
    pub fn cache_store(&self) -> Result<SqliteCacheStore, CatalogError> {
        Ok(SqliteCacheStore::with_database(self.database()?))
    }

    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn api(&self) -> Result<HttpApiClient, CatalogError> {
        HttpApiClient::new(&self.config.api)
    }

    /// # Errors
    ///
    /// Returns an error if auto mode cannot parse the base URL.
    pub fn connectivity(&self) -> Result<Box<dyn Connectivity>, CatalogError> {
        connectivity::from_config(
            &self.config.connectivity,
            &self.config.api.base_url,
            self.connectivity_override,
        )
    }
}

/// Parse repeated `key=value` arguments.
///
/// Values that parse as JSON keep their type (`precio=10.00` is a number);
/// anything else is sent as a string.
///
/// # Errors
///
/// Returns `CatalogError::Validation` for an argument without `=` or with an
/// empty key.
pub fn parse_fields(raw: &[String]) -> Result<Map<String, Value>, CatalogError> {
    let mut fields = Map::new();

    for arg in raw {
        let Some((key, value)) = arg.split_once('=') else {
            return Err(CatalogError::Validation(format!(
                "field '{arg}' must be written as key=value"
            )));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(CatalogError::Validation(format!("field '{arg}' has an empty key")));
        }

        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        fields.insert(key.to_string(), value);
    }

    Ok(fields)
}

/// Parse `WIDTHxHEIGHT`.
///
/// # Errors
///
/// Returns `CatalogError::Validation` if the size is malformed.
pub fn parse_display(raw: &str) -> Result<(f64, f64), CatalogError> {
    let invalid = || CatalogError::Validation(format!("display size must be WIDTHxHEIGHT: '{raw}'"));

    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(invalid)?;
    let w: f64 = w.trim().parse().map_err(|_| invalid())?;
    let h: f64 = h.trim().parse().map_err(|_| invalid())?;
    Ok((w, h))
}
