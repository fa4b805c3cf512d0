//! Path resolution for catalog-sync configuration and data files.
//!
//! All data is stored in `~/.catalog-sync/` unless overridden:
//! - `config.yaml` - Main configuration file
//! - `catalog.db` - SQLite database for the operation queue and response cache
//! - `previews/` - Local preview files for cropped images

use std::path::PathBuf;

use crate::error::CatalogError;

/// Paths to catalog-sync configuration and data directories.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.catalog-sync/`
    pub root: PathBuf,
    /// Config file: `~/.catalog-sync/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.catalog-sync/catalog.db`
    pub database: PathBuf,
    /// Preview directory: `~/.catalog-sync/previews/`
    pub previews: PathBuf,
}

impl Paths {
    /// Create paths based on the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, CatalogError> {
        let home = std::env::var("HOME").map_err(|_| {
            CatalogError::Config("Could not determine home directory".to_string())
        })?;

        Ok(Self::with_root(PathBuf::from(home).join(".catalog-sync")))
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("catalog.db"),
            previews: root.join("previews"),
            root,
        }
    }

    /// Ensure all directories exist, creating them if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), CatalogError> {
        for dir in [&self.root, &self.previews] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    CatalogError::Config(format!(
                        "Failed to create directory {}: {e}",
                        dir.display()
                    ))
                })?;
            }
        }

        Ok(())
    }
}
