//! The record persisted for one deferred write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{Action, EntityKind, HttpMethod, PENDING_PLACEHOLDER};

/// Payload key carrying the original filename of a text-encoded image.
pub const IMAGE_FILENAME_KEY: &str = "imageFilename";

/// A deferred write, self-describing enough to be replayed on its own.
///
/// Records are immutable once enqueued: the replayer either removes them
/// after a successful replay or leaves them untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// Storage id, assigned on enqueue. Increases with enqueue order.
    pub id: Option<i64>,
    /// Entity the write targets (bookkeeping only).
    pub entity_kind: EntityKind,
    pub action: Action,
    /// Endpoint relative to the API base URL. May contain the pending placeholder.
    pub endpoint: String,
    pub method: HttpMethod,
    /// Field values; images are stored as text plus an `imageFilename` hint.
    pub payload: Value,
    /// Reference handed out for a queued create, later bound to the server id.
    pub client_ref: Option<String>,
    /// Reference the endpoint placeholder stands for.
    pub target_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QueuedOperation {
    /// Build an operation; the HTTP method follows from the action.
    #[must_use]
    pub fn new(
        entity_kind: EntityKind,
        action: Action,
        endpoint: String,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            id: None,
            entity_kind,
            action,
            endpoint,
            method: action.method(),
            payload: Value::Object(payload),
            client_ref: None,
            target_ref: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_client_ref(mut self, client_ref: impl Into<String>) -> Self {
        self.client_ref = Some(client_ref.into());
        self
    }

    #[must_use]
    pub fn with_target_ref(mut self, target_ref: impl Into<String>) -> Self {
        self.target_ref = Some(target_ref.into());
        self
    }

    /// Whether the endpoint still waits on a server id from an earlier create.
    #[must_use]
    pub fn needs_resolution(&self) -> bool {
        self.endpoint.contains(PENDING_PLACEHOLDER)
    }

    /// Endpoint with the pending placeholder replaced by a server id.
    #[must_use]
    pub fn resolved_endpoint(&self, server_id: &str) -> String {
        self.endpoint.replace(PENDING_PLACEHOLDER, server_id)
    }

    /// Filename hint of an attached image, if any.
    #[must_use]
    pub fn image_filename(&self) -> Option<&str> {
        self.payload.get(IMAGE_FILENAME_KEY).and_then(Value::as_str)
    }

    /// One-line description for listings and logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} {} {}", self.action, self.entity_kind, self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_method_inferred_from_action() {
        let create = QueuedOperation::new(
            EntityKind::Product,
            Action::Create,
            "productos/".into(),
            payload(json!({"nombre": "Lamp"})),
        );
        assert_eq!(create.method, HttpMethod::Post);

        let delete =
            QueuedOperation::new(EntityKind::Product, Action::Delete, "productos/7/".into(), Map::new());
        assert_eq!(delete.method, HttpMethod::Delete);
        assert!(delete.id.is_none());
    }

    #[test]
    fn test_pending_resolution() {
        let op = QueuedOperation::new(
            EntityKind::Product,
            Action::Update,
            format!("productos/{PENDING_PLACEHOLDER}/"),
            Map::new(),
        )
        .with_target_ref("abc");

        assert!(op.needs_resolution());
        assert_eq!(op.resolved_endpoint("42"), "productos/42/");
        assert_eq!(op.target_ref.as_deref(), Some("abc"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let op = QueuedOperation::new(
            EntityKind::Product,
            Action::Create,
            "productos/".into(),
            payload(json!({"nombre": "Lamp", "imageFilename": "p-1.jpg"})),
        );

        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["entityKind"], "product");
        assert_eq!(json["method"], "POST");
        assert!(json.get("createdAt").is_some());
        assert_eq!(op.image_filename(), Some("p-1.jpg"));
    }
}
