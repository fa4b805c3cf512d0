//! Payloads and results of mutations, and their wire and queue encodings.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::api::{Action, EntityKind, FilePart, RequestBody};
use crate::error::CatalogError;
use crate::features::image::{BinaryTextCodec, ImageMime, NormalizedImage, OUTPUT_MIME};
use crate::features::queue::IMAGE_FILENAME_KEY;

/// Form fields of a create or update, plus an optional normalized image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPayload {
    pub fields: Map<String, Value>,
    pub image: Option<NormalizedImage>,
}

impl EntityPayload {
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            image: None,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: NormalizedImage) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.image.is_none()
    }

    /// Local checks run before any network or queue activity.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for bad fields or an image on an
    /// entity that cannot carry one.
    pub fn validate(&self, kind: EntityKind, action: Action) -> Result<(), CatalogError> {
        kind.validate_fields(action, &self.fields)?;

        if self.image.is_some() && kind.image_field().is_none() {
            return Err(CatalogError::Validation(format!("{kind} does not accept an image")));
        }

        if action == Action::Update && self.is_empty() {
            return Err(CatalogError::Validation("nothing to update".to_string()));
        }

        Ok(())
    }

    /// Request body for an immediate write: multipart with an image, JSON otherwise.
    #[must_use]
    pub fn request_body(&self, kind: EntityKind) -> RequestBody {
        match (&self.image, kind.image_field()) {
            (Some(image), Some(field)) => RequestBody::Multipart {
                fields: self.fields.clone(),
                file: FilePart {
                    field: field.to_string(),
                    filename: image.filename.clone(),
                    mime: image.mime.clone(),
                    bytes: image.bytes.clone(),
                },
            },
            _ => RequestBody::Json(Value::Object(self.fields.clone())),
        }
    }

    /// Text-only payload for the queue; the image becomes encoded text plus a
    /// filename hint.
    #[must_use]
    pub fn queued_fields(&self, kind: EntityKind, codec: &dyn BinaryTextCodec) -> Map<String, Value> {
        let mut fields = self.fields.clone();
        if let (Some(image), Some(field)) = (&self.image, kind.image_field()) {
            fields.insert(field.to_string(), Value::String(codec.encode(&image.bytes)));
            fields.insert(
                IMAGE_FILENAME_KEY.to_string(),
                Value::String(image.filename.clone()),
            );
        }
        fields
    }
}

/// Rebuild the request body of a queued operation.
///
/// # Errors
///
/// Returns `CatalogError::Persistence` for a payload that is not an object,
/// or `CatalogError::Validation` if the stored image text cannot be decoded.
pub fn replay_body(
    kind: EntityKind,
    action: Action,
    payload: &Value,
    codec: &dyn BinaryTextCodec,
) -> Result<RequestBody, CatalogError> {
    if action == Action::Delete {
        return Ok(RequestBody::Empty);
    }

    let Value::Object(stored) = payload else {
        return Err(CatalogError::Persistence(format!(
            "queued payload is not an object: {payload}"
        )));
    };

    let mut fields = stored.clone();
    let filename = fields
        .remove(IMAGE_FILENAME_KEY)
        .and_then(|v| v.as_str().map(str::to_string));

    let image_text = kind.image_field().and_then(|field| match fields.get(field) {
        Some(Value::String(text)) => Some((field, text.clone())),
        _ => None,
    });

    let Some((field, text)) = image_text else {
        return Ok(RequestBody::Json(Value::Object(fields)));
    };
    fields.remove(field);

    let bytes = codec.decode(&text)?;
    let filename = filename.unwrap_or_else(|| "image.jpg".to_string());
    let mime = ImageMime::from_filename(&filename).map_or(OUTPUT_MIME, ImageMime::as_str);

    Ok(RequestBody::Multipart {
        fields,
        file: FilePart {
            field: field.to_string(),
            filename,
            mime: mime.to_string(),
            bytes,
        },
    })
}

/// How a mutation ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The server applied the write; its response body.
    Completed { result: Value },
    /// The write was stored for later replay. No server result exists yet.
    Queued {
        operation_id: i64,
        /// Reference usable as `pending:<ref>` for a queued create.
        client_ref: Option<String>,
    },
}

impl MutationOutcome {
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}
