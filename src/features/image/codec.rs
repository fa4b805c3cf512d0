//! Binary-to-text encoding for images stored in queued payloads.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::CatalogError;

/// Converts binary payloads to and from a JSON-safe text form.
pub trait BinaryTextCodec {
    fn encode(&self, bytes: &[u8]) -> String;

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if `text` is not valid for this codec.
    fn decode(&self, text: &str) -> Result<Vec<u8>, CatalogError>;
}

/// Standard padded base64. Decoding also accepts a `data:<mime>;base64,` prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec;

impl BinaryTextCodec for Base64Codec {
    fn encode(&self, bytes: &[u8]) -> String {
        BASE64.encode(bytes)
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, CatalogError> {
        let body = match text.split_once(";base64,") {
            Some((prefix, body)) if prefix.starts_with("data:") => body,
            _ => text,
        };

        BASE64
            .decode(body.trim())
            .map_err(|e| CatalogError::Validation(format!("invalid base64 image data: {e}")))
    }
}
