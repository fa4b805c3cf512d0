//! Request and entity types shared by the dispatcher, the queue and the HTTP client.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CatalogError;

/// Placeholder in a queued endpoint standing for a not-yet-assigned server id.
pub const PENDING_PLACEHOLDER: &str = "{pending}";

/// Prefix marking an entity reference as a client reference (`pending:<uuid>`).
pub const PENDING_PREFIX: &str = "pending:";

/// Catalog entities the pipeline can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    User,
    Role,
    Category,
}

impl EntityKind {
    /// REST resource name on the remote API.
    #[must_use]
    pub const fn resource(self) -> &'static str {
        match self {
            Self::Product => "productos",
            Self::User => "usuarios",
            Self::Role => "roles",
            Self::Category => "categorias",
        }
    }

    /// Substring identifying this resource family in cached URLs.
    #[must_use]
    pub fn cache_marker(self) -> String {
        format!("/{}/", self.resource())
    }

    /// Collection endpoint, used for create and list.
    #[must_use]
    pub fn collection_endpoint(self) -> String {
        format!("{}/", self.resource())
    }

    /// Member endpoint, used for update, delete and show.
    #[must_use]
    pub fn member_endpoint(self, id: &str) -> String {
        format!("{}/{id}/", self.resource())
    }

    /// Multipart field carrying the image, for entities that have one.
    #[must_use]
    pub const fn image_field(self) -> Option<&'static str> {
        match self {
            Self::Product => Some("imagen"),
            Self::User | Self::Role | Self::Category => None,
        }
    }

    /// Fields that must be present and non-empty on create.
    #[must_use]
    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Product => &["nombre", "precio"],
            Self::User => &["username", "email"],
            Self::Role | Self::Category => &["nombre"],
        }
    }

    /// Check the form fields of a create or update before anything leaves the device.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` naming the first offending field.
    pub fn validate_fields(self, action: Action, fields: &Map<String, Value>) -> Result<(), CatalogError> {
        if action == Action::Create {
            for name in self.required_fields() {
                match fields.get(*name) {
                    None | Some(Value::Null) => {
                        return Err(CatalogError::Validation(format!(
                            "{self} requires field '{name}'"
                        )));
                    }
                    Some(Value::String(s)) if s.trim().is_empty() => {
                        return Err(CatalogError::Validation(format!(
                            "field '{name}' must not be empty"
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        if self == Self::Product {
            if let Some(price) = fields.get("precio") {
                match price.as_f64() {
                    Some(p) if p >= 0.0 => {}
                    _ => {
                        return Err(CatalogError::Validation(
                            "field 'precio' must be a non-negative number".to_string(),
                        ));
                    }
                }
            }
        }

        if let Some(image_field) = self.image_field() {
            if fields.contains_key(image_field) {
                return Err(CatalogError::Validation(format!(
                    "field '{image_field}' must be attached as a normalized image"
                )));
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Product => "product",
            Self::User => "user",
            Self::Role => "role",
            Self::Category => "category",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for EntityKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(Self::Product),
            "user" => Ok(Self::User),
            "role" => Ok(Self::Role),
            "category" => Ok(Self::Category),
            other => Err(CatalogError::Persistence(format!("Unknown entity kind: {other}"))),
        }
    }
}

/// Write action of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    /// HTTP verb the action maps to.
    #[must_use]
    pub const fn method(self) -> HttpMethod {
        match self {
            Self::Create => HttpMethod::Post,
            Self::Update => HttpMethod::Patch,
            Self::Delete => HttpMethod::Delete,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(CatalogError::Persistence(format!("Unknown action: {other}"))),
        }
    }
}

/// HTTP verbs used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(CatalogError::Persistence(format!("Unknown HTTP method: {other}"))),
        }
    }
}

/// Identifies the target of an update or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    /// Identifier assigned by the server.
    Server(String),
    /// Client reference of a create that was queued offline.
    Pending(String),
}

impl EntityRef {
    /// Parse `pending:<ref>` or a plain server id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for an empty id or reference.
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let raw = raw.trim();
        let parsed = raw
            .strip_prefix(PENDING_PREFIX)
            .map_or_else(|| Self::Server(raw.to_string()), |r| Self::Pending(r.to_string()));

        let inner = match &parsed {
            Self::Server(s) | Self::Pending(s) => s,
        };
        if inner.is_empty() {
            return Err(CatalogError::Validation(format!("empty entity id: '{raw}'")));
        }
        if inner.contains('/') {
            return Err(CatalogError::Validation(format!("invalid entity id: '{raw}'")));
        }
        Ok(parsed)
    }
}

impl From<i64> for EntityRef {
    fn from(id: i64) -> Self {
        Self::Server(id.to_string())
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Pending(r) => write!(f, "{PENDING_PREFIX}{r}"),
        }
    }
}

/// Binary file attached to a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Body of a request to the remote API.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart {
        fields: Map<String, Value>,
        file: FilePart,
    },
}

/// A single request against the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the configured base URL.
    pub endpoint: String,
    pub body: RequestBody,
}

impl ApiRequest {
    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            endpoint: endpoint.into(),
            body: RequestBody::Empty,
        }
    }
}

/// Extract the server-assigned id from a create response.
#[must_use]
pub fn response_id(response: &Value) -> Option<String> {
    match response.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
