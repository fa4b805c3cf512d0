use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::api::types::{ApiRequest, HttpMethod, RequestBody};
use crate::config::ApiConfig;
use crate::error::CatalogError;

/// The remote catalog API.
///
/// Implementations return the decoded JSON body on 2xx and
/// `CatalogError::Api` with the status preserved otherwise.
#[cfg_attr(test, mockall::automock)]
pub trait ApiClient {
    /// Send one request and wait for the response.
    fn send(&self, request: &ApiRequest) -> Result<Value, CatalogError>;

    /// Absolute URL a relative endpoint resolves to.
    fn url_for(&self, endpoint: &str) -> Result<String, CatalogError>;
}

/// Blocking HTTP client for the catalog REST API.
pub struct HttpApiClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpApiClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, CatalogError> {
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("catalog-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Base URL every endpoint is resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, endpoint: &str) -> Result<Url, CatalogError> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }

    fn builder(&self, method: HttpMethod, url: Url) -> RequestBuilder {
        let builder = match method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self.http.post(url),
            HttpMethod::Patch => self.http.patch(url),
            HttpMethod::Delete => self.http.delete(url),
        };

        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl ApiClient for HttpApiClient {
    fn send(&self, request: &ApiRequest) -> Result<Value, CatalogError> {
        let url = self.resolve(&request.endpoint)?;
        debug!(method = %request.method, %url, "sending request");

        let builder = self.builder(request.method, url);
        let builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart { fields, file } => {
                let mut form = Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), form_text(value));
                }
                let part = Part::bytes(file.bytes.clone())
                    .file_name(file.filename.clone())
                    .mime_str(&file.mime)?;
                form = form.part(file.field.clone(), part);
                builder.multipart(form)
            }
        };

        let response = builder.send()?;
        let status = response.status();
        let text = response.text()?;
        debug!(status = status.as_u16(), "received response");

        if status.is_success() {
            Ok(parse_body(&text))
        } else {
            Err(CatalogError::Api {
                status: status.as_u16(),
                message: error_message(&text, status.canonical_reason()),
            })
        }
    }

    fn url_for(&self, endpoint: &str) -> Result<String, CatalogError> {
        Ok(self.resolve(endpoint)?.to_string())
    }
}

/// Multipart text value of a JSON field. Strings are sent unquoted.
fn form_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Human-readable message from an error body.
///
/// Looks for the usual `detail` / `message` / `error` keys, falling back to
/// the raw text and then to the status reason.
fn error_message(text: &str, reason: Option<&str>) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        for key in ["detail", "message", "error"] {
            if let Some(Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
        return Value::Object(map).to_string();
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        reason.unwrap_or("request failed").to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base: &str) -> HttpApiClient {
        HttpApiClient::new(&ApiConfig {
            base_url: base.to_string(),
            token: None,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_relative_endpoint() {
        let api = client("https://shop.example.com/api/");
        assert_eq!(
            api.url_for("productos/7/").unwrap(),
            "https://shop.example.com/api/productos/7/"
        );
        assert_eq!(
            api.url_for("/productos/").unwrap(),
            "https://shop.example.com/api/productos/"
        );
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let api = client("https://shop.example.com/api");
        assert_eq!(api.base_url().as_str(), "https://shop.example.com/api/");
    }

    #[test]
    fn test_error_message_prefers_detail() {
        let msg = error_message(r#"{"detail": "Producto con pedidos"}"#, Some("Conflict"));
        assert_eq!(msg, "Producto con pedidos");
    }

    #[test]
    fn test_error_message_falls_back() {
        assert_eq!(error_message("", Some("Conflict")), "Conflict");
        assert_eq!(error_message("boom", None), "boom");
        assert_eq!(
            error_message(r#"{"nombre": ["required"]}"#, None),
            r#"{"nombre":["required"]}"#
        );
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(r#"{"id": 1}"#), json!({"id": 1}));
        assert_eq!(parse_body("ok"), json!("ok"));
    }

    #[test]
    fn test_form_text() {
        assert_eq!(form_text(&json!("Lamp")), "Lamp");
        assert_eq!(form_text(&json!(10.5)), "10.5");
        assert_eq!(form_text(&json!(true)), "true");
    }
}
