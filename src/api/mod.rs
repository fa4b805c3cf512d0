//! Remote catalog API: request types and the HTTP client.

pub mod client;
pub mod types;

#[cfg(test)]
pub use client::MockApiClient;
pub use client::{ApiClient, HttpApiClient};
pub use types::{
    response_id, Action, ApiRequest, EntityKind, EntityRef, FilePart, HttpMethod, RequestBody,
    PENDING_PLACEHOLDER, PENDING_PREFIX,
};
