//! Raster backend: decode a source, render a region of it at a fixed size.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageReader;

use super::geometry::PixelRegion;
use crate::error::CatalogError;

/// MIME type of everything the renderer produces.
pub const OUTPUT_MIME: &str = "image/jpeg";

/// Renders source regions into fixed-size encoded images.
pub trait RasterRenderer {
    /// Natural `(width, height)` of an encoded source image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image header cannot be read.
    fn dimensions(&self, source: &[u8]) -> Result<(u32, u32), CatalogError>;

    /// Render `region` of `source` into a `width` x `height` image encoded
    /// at `quality` (1-100).
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or encoding fails.
    fn render(
        &self,
        source: &[u8],
        region: PixelRegion,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, CatalogError>;
}

/// [`RasterRenderer`] on the `image` crate: Lanczos3 resampling, JPEG output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRenderer;

impl RasterRenderer for ImageRenderer {
    fn dimensions(&self, source: &[u8]) -> Result<(u32, u32), CatalogError> {
        let reader = ImageReader::new(Cursor::new(source)).with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }

    fn render(
        &self,
        source: &[u8],
        region: PixelRegion,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, CatalogError> {
        let decoded = image::load_from_memory(source)?;
        let cropped = decoded.crop_imm(region.x, region.y, region.width, region.height);
        let resized = cropped.resize_exact(width, height, FilterType::Lanczos3);

        // JPEG has no alpha channel.
        let rgb = resized.to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
        Ok(out)
    }
}
