//! Local preview references for image bytes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::warn;
use url::Url;

use crate::error::CatalogError;

/// Hands out URLs that display a blob locally until revoked.
pub trait BlobUrlFactory {
    /// Make `bytes` addressable and return the reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be stored.
    fn create(&self, bytes: &[u8], mime: &str) -> Result<String, CatalogError>;

    /// Release a reference. Unknown references are ignored.
    fn revoke(&self, url: &str);
}

/// Writes previews into a directory and returns `file://` URLs.
#[derive(Debug, Clone)]
pub struct FsBlobUrlFactory {
    dir: PathBuf,
}

impl FsBlobUrlFactory {
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/jpeg" => "jpg",
        _ => "bin",
    }
}

impl BlobUrlFactory for FsBlobUrlFactory {
    fn create(&self, bytes: &[u8], mime: &str) -> Result<String, CatalogError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), extension_for(mime)));
        std::fs::write(&path, bytes)?;

        Url::from_file_path(&path)
            .map(String::from)
            .map_err(|()| CatalogError::Config(format!("preview path is not absolute: {}", path.display())))
    }

    fn revoke(&self, url: &str) {
        let Some(path) = Url::parse(url).ok().and_then(|u| u.to_file_path().ok()) else {
            return;
        };
        // Only files this factory created.
        if !path.starts_with(&self.dir) {
            return;
        }
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "failed to remove preview");
        }
    }
}

/// Keeps blobs in memory under `blob:memory/<n>` references.
#[derive(Default)]
pub struct MemoryBlobUrls {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    counter: std::sync::atomic::AtomicU64,
}

impl MemoryBlobUrls {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of references not yet revoked.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.blobs.lock().map_or(0, |b| b.len())
    }

    /// Bytes behind a live reference.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(url).cloned()
    }
}

impl BlobUrlFactory for MemoryBlobUrls {
    fn create(&self, bytes: &[u8], _mime: &str) -> Result<String, CatalogError> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let url = format!("blob:memory/{n}");
        self.blobs
            .lock()
            .map_err(|_| CatalogError::Config("preview store lock poisoned".to_string()))?
            .insert(url.clone(), bytes.to_vec());
        Ok(url)
    }

    fn revoke(&self, url: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.remove(url);
        }
    }
}
