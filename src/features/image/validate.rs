//! Source image validation, done before any crop state exists.

use image::ImageFormat;

use crate::error::CatalogError;

/// Largest accepted source file (5 MiB).
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Image types accepted as crop sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Jpeg,
    Png,
    WebP,
}

impl ImageMime {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    /// MIME type of a filename extension, for decoding queued images.
    #[must_use]
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageMime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check size, then content type, of a user-selected file.
///
/// The type is sniffed from the bytes rather than trusted from a filename.
///
/// # Errors
///
/// Returns `CatalogError::Validation` if the file is empty, larger than
/// `max_bytes`, or not a JPEG, PNG or WEBP image.
pub fn validate_source(bytes: &[u8], max_bytes: usize) -> Result<ImageMime, CatalogError> {
    if bytes.is_empty() {
        return Err(CatalogError::Validation("image file is empty".to_string()));
    }

    if bytes.len() > max_bytes {
        return Err(CatalogError::Validation(format!(
            "image is {} bytes; the limit is {max_bytes} bytes",
            bytes.len()
        )));
    }

    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Ok(ImageMime::Jpeg),
        Ok(ImageFormat::Png) => Ok(ImageMime::Png),
        Ok(ImageFormat::WebP) => Ok(ImageMime::WebP),
        Ok(other) => Err(CatalogError::Validation(format!(
            "unsupported image type {other:?}; expected JPEG, PNG or WEBP"
        ))),
        Err(_) => Err(CatalogError::Validation(
            "file is not a recognised image".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];
    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_rejects_oversized_jpeg() {
        let mut bytes = vec![0u8; 10 * 1024 * 1024];
        bytes[..4].copy_from_slice(&JPEG_MAGIC);

        let err = validate_source(&bytes, DEFAULT_MAX_BYTES).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[test]
    fn test_accepts_known_types() {
        assert_eq!(validate_source(&JPEG_MAGIC, DEFAULT_MAX_BYTES).unwrap(), ImageMime::Jpeg);
        assert_eq!(validate_source(&PNG_MAGIC, DEFAULT_MAX_BYTES).unwrap(), ImageMime::Png);

        let mut webp = b"RIFF\0\0\0\0WEBPVP8 ".to_vec();
        webp.extend_from_slice(&[0u8; 16]);
        assert_eq!(validate_source(&webp, DEFAULT_MAX_BYTES).unwrap(), ImageMime::WebP);
    }

    #[test]
    fn test_rejects_other_types() {
        let gif = b"GIF89a\x01\x00\x01\x00";
        assert!(validate_source(gif, DEFAULT_MAX_BYTES).is_err());
        assert!(validate_source(b"hello world", DEFAULT_MAX_BYTES).is_err());
        assert!(validate_source(&[], DEFAULT_MAX_BYTES).is_err());
    }

    #[test]
    fn test_limit_is_inclusive() {
        let mut bytes = vec![0u8; 64];
        bytes[..4].copy_from_slice(&JPEG_MAGIC);
        assert!(validate_source(&bytes, 64).is_ok());
        assert!(validate_source(&bytes, 63).is_err());
    }

    #[test]
    fn test_mime_from_filename() {
        assert_eq!(ImageMime::from_filename("p-1.JPG"), Some(ImageMime::Jpeg));
        assert_eq!(ImageMime::from_filename("a.webp"), Some(ImageMime::WebP));
        assert_eq!(ImageMime::from_filename("noext"), None);
    }
}
