//! Error types for catalog-sync.

use thiserror::Error;

/// Errors produced by the mutation pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Local validation failed (image type/size, form field, entity reference).
    /// Never reaches the network.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote API answered with a non-2xx status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The durable operation queue could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The local response cache could not be swept.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The request never produced a response (DNS, refused, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl CatalogError {
    /// HTTP status carried by an API error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure means the server was never reached.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Process exit code for the binary.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Api { .. } | Self::Transport(_) => 3,
            Self::Persistence(_) => 4,
            Self::NotFound(_) => 5,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_status() {
        let err = CatalogError::Api {
            status: 409,
            message: "has dependent records".to_string(),
        };
        assert_eq!(err.status(), Some(409));
        assert_eq!(
            err.to_string(),
            "API error (HTTP 409): has dependent records"
        );
    }

    #[test]
    fn test_non_api_errors_have_no_status() {
        assert_eq!(CatalogError::Validation("x".into()).status(), None);
        assert_eq!(CatalogError::Persistence("x".into()).status(), None);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CatalogError::Validation("x".into()).exit_code(), 2);
        assert_eq!(CatalogError::Persistence("x".into()).exit_code(), 4);
        assert_eq!(CatalogError::Config("x".into()).exit_code(), 1);
    }
}
