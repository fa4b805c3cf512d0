//! Interactive crop sessions producing normalized images.
//!
//! Flow: [`ImagePipeline::select`] validates the file and opens a
//! [`CropSession`]; [`CropSession::frame`] receives the displayed size and
//! places the initial crop; the caller may [`adjust`](CropSession::adjust)
//! it; [`commit`](CropSession::commit) renders. Dropping or cancelling the
//! session releases the source preview.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tracing::{debug, info};

use super::geometry::{initial_crop, AspectRatio, CropRect, DisplayGeometry, PixelRegion};
use super::preview::BlobUrlFactory;
use super::render::{RasterRenderer, OUTPUT_MIME};
use super::validate::{validate_source, ImageMime, DEFAULT_MAX_BYTES};
use crate::error::CatalogError;

/// Default output encoding quality.
pub const DEFAULT_QUALITY: u8 = 92;

/// An image ready to attach to a create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub filename: String,
    pub mime: String,
    /// Local preview reference.
    pub preview_url: Option<String>,
}

/// Generates upload filenames from a strictly increasing millisecond clock.
#[derive(Debug, Default)]
pub struct FileNamer {
    last: AtomicI64,
}

impl FileNamer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// `<prefix>-<millis>.jpg`, never repeating within this namer.
    pub fn next(&self, prefix: &str) -> String {
        let now = Utc::now().timestamp_millis();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current + 1);
            match self
                .last
                .compare_exchange(current, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return format!("{prefix}-{candidate}.jpg"),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Entry point of image normalization.
pub struct ImagePipeline<'a> {
    renderer: &'a dyn RasterRenderer,
    previews: &'a dyn BlobUrlFactory,
    namer: FileNamer,
    max_bytes: usize,
    quality: u8,
    filename_prefix: String,
}

impl<'a> ImagePipeline<'a> {
    #[must_use]
    pub fn new(renderer: &'a dyn RasterRenderer, previews: &'a dyn BlobUrlFactory) -> Self {
        Self {
            renderer,
            previews,
            namer: FileNamer::new(),
            max_bytes: DEFAULT_MAX_BYTES,
            quality: DEFAULT_QUALITY,
            filename_prefix: "image".to_string(),
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, max_bytes: usize, quality: u8) -> Self {
        self.max_bytes = max_bytes;
        self.quality = quality;
        self
    }

    #[must_use]
    pub fn with_filename_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = prefix.into();
        self
    }

    /// Validate a user-selected file and open a crop session for it.
    ///
    /// Nothing is created when validation fails.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a bad size or type, or a decode
    /// error if the header cannot be read.
    pub fn select(&self, bytes: Vec<u8>, aspect: AspectRatio) -> Result<CropSession<'_>, CatalogError> {
        let mime = validate_source(&bytes, self.max_bytes)?;
        let (natural_width, natural_height) = self.renderer.dimensions(&bytes)?;
        let source_preview = self.previews.create(&bytes, mime.as_str())?;

        debug!(%mime, natural_width, natural_height, %aspect, "image selected");

        Ok(CropSession {
            pipeline: self,
            source: bytes,
            mime,
            natural: (natural_width, natural_height),
            aspect,
            geometry: None,
            crop: None,
            source_preview: Some(source_preview),
        })
    }
}

/// Crop state for one selected image.
pub struct CropSession<'p> {
    pipeline: &'p ImagePipeline<'p>,
    source: Vec<u8>,
    mime: ImageMime,
    natural: (u32, u32),
    aspect: AspectRatio,
    geometry: Option<DisplayGeometry>,
    crop: Option<CropRect>,
    source_preview: Option<String>,
}

impl CropSession<'_> {
    #[must_use]
    pub const fn mime(&self) -> ImageMime {
        self.mime
    }

    #[must_use]
    pub const fn natural_size(&self) -> (u32, u32) {
        self.natural
    }

    #[must_use]
    pub const fn aspect(&self) -> AspectRatio {
        self.aspect
    }

    /// Current crop rectangle in display units.
    #[must_use]
    pub const fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    /// Preview reference of the unmodified source.
    #[must_use]
    pub fn source_preview(&self) -> Option<&str> {
        self.source_preview.as_deref()
    }

    /// Record the displayed size and place the initial centered crop.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a non-positive display size.
    pub fn frame(&mut self, display_width: f64, display_height: f64) -> Result<CropRect, CatalogError> {
        let geometry =
            DisplayGeometry::new(self.natural.0, self.natural.1, display_width, display_height)?;
        let rect = initial_crop(display_width, display_height, self.aspect);
        self.geometry = Some(geometry);
        self.crop = Some(rect);
        Ok(rect)
    }

    /// Frame the image as displayed at its natural size.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if the image has a zero dimension.
    pub fn frame_natural(&mut self) -> Result<CropRect, CatalogError> {
        self.frame(f64::from(self.natural.0), f64::from(self.natural.1))
    }

    /// Replace the crop rectangle after a drag or resize.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if the session has not been framed
    /// or the rectangle is degenerate.
    pub fn adjust(&mut self, rect: CropRect) -> Result<CropRect, CatalogError> {
        let geometry = self.geometry.ok_or_else(|| {
            CatalogError::Validation("crop cannot be adjusted before the image is framed".to_string())
        })?;
        let clamped = rect.clamped_to(geometry.display_width, geometry.display_height)?;
        self.crop = Some(clamped);
        Ok(clamped)
    }

    /// Source-pixel region the current crop covers.
    #[must_use]
    pub fn source_region(&self) -> Option<PixelRegion> {
        Some(self.geometry?.to_source(&self.crop?))
    }

    /// Render the current crop. Returns `Ok(None)` when no crop exists yet.
    ///
    /// Each commit produces a fresh image with its own filename.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or creating the preview fails.
    pub fn commit(&self) -> Result<Option<NormalizedImage>, CatalogError> {
        let Some(region) = self.source_region() else {
            debug!("commit ignored: no crop rectangle");
            return Ok(None);
        };

        let (width, height) = self.aspect.output_dimensions();
        let pipeline = self.pipeline;
        let bytes = pipeline
            .renderer
            .render(&self.source, region, width, height, pipeline.quality)?;
        let preview_url = pipeline.previews.create(&bytes, OUTPUT_MIME)?;
        let filename = pipeline.namer.next(&pipeline.filename_prefix);

        info!(%filename, ?region, width, height, size = bytes.len(), "image normalized");

        Ok(Some(NormalizedImage {
            bytes,
            width,
            height,
            filename,
            mime: OUTPUT_MIME.to_string(),
            preview_url: Some(preview_url),
        }))
    }

    /// Abandon the crop without producing output.
    pub fn cancel(self) {
        debug!("crop cancelled");
    }
}

impl Drop for CropSession<'_> {
    fn drop(&mut self) {
        if let Some(url) = self.source_preview.take() {
            self.pipeline.previews.revoke(&url);
        }
    }
}
