//! Single entry point for creates, updates and deletes.

use tracing::{debug, info};
use uuid::Uuid;

use super::payload::{EntityPayload, MutationOutcome};
use crate::api::{Action, ApiClient, ApiRequest, EntityKind, EntityRef, RequestBody, PENDING_PLACEHOLDER};
use crate::error::CatalogError;
use crate::features::cache::CacheInvalidator;
use crate::features::connectivity::Connectivity;
use crate::features::image::BinaryTextCodec;
use crate::features::queue::{OperationStore, QueuedOperation};

/// Where an update or delete is aimed once pending references are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Server(String),
    /// A queued create with no server id yet.
    Unbound(String),
}

/// Sends a mutation now when online, queues it otherwise.
///
/// Every call ends in a server result, a queued acknowledgement, or an error.
/// Nothing is retried here.
pub struct MutationDispatcher<'a> {
    api: &'a dyn ApiClient,
    connectivity: &'a dyn Connectivity,
    queue: &'a dyn OperationStore,
    invalidator: &'a CacheInvalidator<'a>,
    codec: &'a dyn BinaryTextCodec,
}

impl<'a> MutationDispatcher<'a> {
    #[must_use]
    pub fn new(
        api: &'a dyn ApiClient,
        connectivity: &'a dyn Connectivity,
        queue: &'a dyn OperationStore,
        invalidator: &'a CacheInvalidator<'a>,
        codec: &'a dyn BinaryTextCodec,
    ) -> Self {
        Self {
            api,
            connectivity,
            queue,
            invalidator,
            codec,
        }
    }

    /// Create an entity.
    ///
    /// A queued create carries a fresh client reference which later updates
    /// and deletes can target as `pending:<ref>`.
    ///
    /// # Errors
    ///
    /// `Validation` for bad fields, `Api`/`Transport` from an immediate write,
    /// `Persistence` if the offline write cannot be stored.
    pub fn create_entity(
        &self,
        kind: EntityKind,
        payload: &EntityPayload,
    ) -> Result<MutationOutcome, CatalogError> {
        payload.validate(kind, Action::Create)?;
        let endpoint = kind.collection_endpoint();

        if self.connectivity.is_online() {
            return self.send_now(kind, Action::Create, endpoint, payload.request_body(kind));
        }

        let operation = QueuedOperation::new(
            kind,
            Action::Create,
            endpoint,
            payload.queued_fields(kind, self.codec),
        )
        .with_client_ref(Uuid::new_v4().to_string());
        self.enqueue(operation)
    }

    /// Update an entity by server id or pending reference.
    ///
    /// # Errors
    ///
    /// As [`create_entity`](Self::create_entity), plus `Validation` for an
    /// unknown pending reference or an empty payload.
    pub fn update_entity(
        &self,
        kind: EntityKind,
        target: &EntityRef,
        payload: &EntityPayload,
    ) -> Result<MutationOutcome, CatalogError> {
        payload.validate(kind, Action::Update)?;

        match self.resolve_target(target)? {
            Target::Server(id) if self.connectivity.is_online() => self.send_now(
                kind,
                Action::Update,
                kind.member_endpoint(&id),
                payload.request_body(kind),
            ),
            Target::Server(id) => self.enqueue(QueuedOperation::new(
                kind,
                Action::Update,
                kind.member_endpoint(&id),
                payload.queued_fields(kind, self.codec),
            )),
            Target::Unbound(client_ref) => self.enqueue(
                QueuedOperation::new(
                    kind,
                    Action::Update,
                    kind.member_endpoint(PENDING_PLACEHOLDER),
                    payload.queued_fields(kind, self.codec),
                )
                .with_target_ref(client_ref),
            ),
        }
    }

    /// Delete an entity by server id or pending reference.
    ///
    /// # Errors
    ///
    /// As [`update_entity`](Self::update_entity).
    pub fn delete_entity(
        &self,
        kind: EntityKind,
        target: &EntityRef,
    ) -> Result<MutationOutcome, CatalogError> {
        match self.resolve_target(target)? {
            Target::Server(id) if self.connectivity.is_online() => {
                self.send_now(kind, Action::Delete, kind.member_endpoint(&id), RequestBody::Empty)
            }
            Target::Server(id) => self.enqueue(QueuedOperation::new(
                kind,
                Action::Delete,
                kind.member_endpoint(&id),
                serde_json::Map::new(),
            )),
            Target::Unbound(client_ref) => self.enqueue(
                QueuedOperation::new(
                    kind,
                    Action::Delete,
                    kind.member_endpoint(PENDING_PLACEHOLDER),
                    serde_json::Map::new(),
                )
                .with_target_ref(client_ref),
            ),
        }
    }

    fn resolve_target(&self, target: &EntityRef) -> Result<Target, CatalogError> {
        match target {
            EntityRef::Server(id) => Ok(Target::Server(id.clone())),
            EntityRef::Pending(client_ref) => {
                if let Some(id) = self.queue.resolve_reference(client_ref)? {
                    debug!(%client_ref, %id, "pending reference already bound");
                    return Ok(Target::Server(id));
                }
                if self.queue.has_pending_create(client_ref)? {
                    return Ok(Target::Unbound(client_ref.clone()));
                }
                Err(CatalogError::Validation(format!(
                    "unknown pending reference '{client_ref}'"
                )))
            }
        }
    }

    fn send_now(
        &self,
        kind: EntityKind,
        action: Action,
        endpoint: String,
        body: RequestBody,
    ) -> Result<MutationOutcome, CatalogError> {
        info!(%kind, %action, %endpoint, "online: sending immediately");

        let request = ApiRequest {
            method: action.method(),
            endpoint,
            body,
        };
        let result = self.api.send(&request)?;

        self.invalidator.invalidate(&kind.cache_marker());
        Ok(MutationOutcome::Completed { result })
    }

    fn enqueue(&self, mut operation: QueuedOperation) -> Result<MutationOutcome, CatalogError> {
        let operation_id = self.queue.enqueue(&mut operation)?;
        info!(id = operation_id, op = %operation.summary(), "offline: operation queued");

        Ok(MutationOutcome::Queued {
            operation_id,
            client_ref: operation.client_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HttpMethod, MockApiClient};
    use crate::features::cache::{CacheStore, CachedResponse, MemoryCacheStore};
    use crate::features::connectivity::{MockConnectivity, StaticConnectivity};
    use crate::features::image::{Base64Codec, NormalizedImage};
    use crate::features::queue::MemoryOperationStore;
    use serde_json::{json, Map, Value};

    const PARTITION: &str = "api-cache-v1";

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn seeded_cache() -> MemoryCacheStore {
        let cache = MemoryCacheStore::new();
        for url in ["http://h/api/productos/", "http://h/api/productos/7/", "http://h/api/roles/"] {
            cache.put(PARTITION, &CachedResponse::new(url, 200, Value::Null)).unwrap();
        }
        cache
    }

    fn no_network() -> MockApiClient {
        let mut api = MockApiClient::new();
        api.expect_send().never();
        api
    }

    #[test]
    fn test_offline_create_lamp_is_queued() {
        let api = no_network();
        let mut connectivity = MockConnectivity::new();
        connectivity.expect_is_online().times(1).return_const(false);
        let queue = MemoryOperationStore::new();
        let cache = seeded_cache();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let payload = EntityPayload::new(fields(json!({"nombre": "Lamp", "precio": 10.00})));
        let outcome = dispatcher.create_entity(EntityKind::Product, &payload).unwrap();
        assert!(outcome.is_queued());

        let pending = queue.peek_all().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].action, Action::Create);
        assert_eq!(pending[0].method, HttpMethod::Post);
        assert_eq!(pending[0].endpoint, "productos/");
        assert_eq!(pending[0].payload["nombre"], "Lamp");
        assert_eq!(pending[0].payload["precio"], json!(10.0));
        assert!(pending[0].client_ref.is_some());

        // Queued path leaves the cache alone.
        assert_eq!(cache.keys(PARTITION).unwrap().len(), 3);
    }

    #[test]
    fn test_online_delete_conflict_surfaces_status() {
        let mut api = MockApiClient::new();
        api.expect_send()
            .withf(|r| r.method == HttpMethod::Delete && r.endpoint == "productos/7/")
            .times(1)
            .returning(|_| {
                Err(CatalogError::Api {
                    status: 409,
                    message: "Producto con pedidos asociados".into(),
                })
            });
        let connectivity = StaticConnectivity(true);
        let queue = MemoryOperationStore::new();
        let cache = seeded_cache();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let err = dispatcher
            .delete_entity(EntityKind::Product, &EntityRef::from(7))
            .unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert_eq!(cache.keys(PARTITION).unwrap().len(), 3);
        assert_eq!(queue.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_online_success_invalidates_resource_family() {
        let mut api = MockApiClient::new();
        api.expect_send()
            .withf(|r| {
                r.method == HttpMethod::Patch
                    && r.endpoint == "productos/7/"
                    && matches!(&r.body, RequestBody::Json(v) if v["precio"] == json!(12.5))
            })
            .times(1)
            .returning(|_| Ok(json!({"id": 7, "precio": 12.5})));
        let connectivity = StaticConnectivity(true);
        let queue = MemoryOperationStore::new();
        let cache = seeded_cache();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let payload = EntityPayload::new(fields(json!({"precio": 12.5})));
        let outcome = dispatcher
            .update_entity(EntityKind::Product, &EntityRef::from(7), &payload)
            .unwrap();

        assert_eq!(
            outcome,
            MutationOutcome::Completed {
                result: json!({"id": 7, "precio": 12.5})
            }
        );
        assert_eq!(cache.keys(PARTITION).unwrap(), vec!["http://h/api/roles/"]);
        assert_eq!(queue.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_invalidation_failure_does_not_fail_write() {
        let mut api = MockApiClient::new();
        api.expect_send().returning(|_| Ok(json!({"id": 1})));
        let connectivity = StaticConnectivity(true);
        let queue = MemoryOperationStore::new();
        let cache = MemoryCacheStore::unavailable();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let payload = EntityPayload::new(fields(json!({"nombre": "Ropa"})));
        assert!(dispatcher.create_entity(EntityKind::Category, &payload).is_ok());
    }

    #[test]
    fn test_online_create_with_image_is_multipart() {
        let mut api = MockApiClient::new();
        api.expect_send()
            .withf(|r| {
                matches!(&r.body, RequestBody::Multipart { file, .. }
                    if file.field == "imagen" && file.filename == "producto-1.jpg")
            })
            .times(1)
            .returning(|_| Ok(json!({"id": 3})));
        let connectivity = StaticConnectivity(true);
        let queue = MemoryOperationStore::new();
        let cache = MemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let payload = EntityPayload::new(fields(json!({"nombre": "Lamp", "precio": 10})))
            .with_image(NormalizedImage {
                bytes: vec![1, 2, 3],
                width: 800,
                height: 800,
                filename: "producto-1.jpg".into(),
                mime: "image/jpeg".into(),
                preview_url: None,
            });
        dispatcher.create_entity(EntityKind::Product, &payload).unwrap();
    }

    #[test]
    fn test_validation_happens_before_anything_else() {
        let api = no_network();
        let mut connectivity = MockConnectivity::new();
        connectivity.expect_is_online().never();
        let queue = MemoryOperationStore::new();
        let cache = MemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let payload = EntityPayload::new(fields(json!({"nombre": "Lamp", "precio": -1})));
        let err = dispatcher.create_entity(EntityKind::Product, &payload).unwrap_err();

        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(queue.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_offline_writes_keep_fifo_order() {
        let api = no_network();
        let connectivity = StaticConnectivity(false);
        let queue = MemoryOperationStore::new();
        let cache = MemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        dispatcher
            .create_entity(
                EntityKind::User,
                &EntityPayload::new(fields(json!({"username": "ana", "email": "ana@example.com"}))),
            )
            .unwrap();
        dispatcher
            .delete_entity(EntityKind::Role, &EntityRef::from(4))
            .unwrap();

        let pending = queue.peek_all().unwrap();
        assert_eq!(pending[0].endpoint, "usuarios/");
        assert_eq!(pending[1].endpoint, "roles/4/");
        assert_eq!(pending[1].method, HttpMethod::Delete);
        assert!(pending[0].id < pending[1].id);
    }

    #[test]
    fn test_queue_failure_propagates() {
        let api = no_network();
        let connectivity = StaticConnectivity(false);
        let queue = MemoryOperationStore::with_capacity(0);
        let cache = MemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let err = dispatcher
            .delete_entity(EntityKind::Product, &EntityRef::from(7))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Persistence(_)));
    }

    #[test]
    fn test_offline_image_is_text_encoded() {
        let api = no_network();
        let connectivity = StaticConnectivity(false);
        let queue = MemoryOperationStore::new();
        let cache = MemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let payload = EntityPayload::new(fields(json!({"nombre": "Lamp", "precio": 10})))
            .with_image(NormalizedImage {
                bytes: vec![0xFF, 0xD8, 0x00, 0x10],
                width: 800,
                height: 800,
                filename: "producto-2.jpg".into(),
                mime: "image/jpeg".into(),
                preview_url: None,
            });
        dispatcher.create_entity(EntityKind::Product, &payload).unwrap();

        let op = &queue.peek_all().unwrap()[0];
        assert_eq!(op.payload["imagen"], "/9gAEA==");
        assert_eq!(op.image_filename(), Some("producto-2.jpg"));
    }

    #[test]
    fn test_update_of_pending_create_is_queued_with_placeholder() {
        let api = no_network();
        let mut connectivity = MockConnectivity::new();
        connectivity.expect_is_online().return_const(false);
        let queue = MemoryOperationStore::new();
        let cache = MemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let created = dispatcher
            .create_entity(
                EntityKind::Product,
                &EntityPayload::new(fields(json!({"nombre": "Lamp", "precio": 10}))),
            )
            .unwrap();
        let MutationOutcome::Queued {
            client_ref: Some(client_ref),
            ..
        } = created
        else {
            panic!("expected a queued create");
        };

        dispatcher
            .update_entity(
                EntityKind::Product,
                &EntityRef::Pending(client_ref.clone()),
                &EntityPayload::new(fields(json!({"precio": 11}))),
            )
            .unwrap();

        let pending = queue.peek_all().unwrap();
        assert_eq!(pending[1].endpoint, "productos/{pending}/");
        assert_eq!(pending[1].target_ref.as_deref(), Some(client_ref.as_str()));
        assert!(pending[1].client_ref.is_none());
    }

    #[test]
    fn test_unbound_pending_reference_queues_even_online() {
        let api = no_network();
        let connectivity = StaticConnectivity(true);
        let queue = MemoryOperationStore::new();
        let mut create = QueuedOperation::new(
            EntityKind::Product,
            Action::Create,
            "productos/".into(),
            fields(json!({"nombre": "Lamp", "precio": 10})),
        )
        .with_client_ref("ref-1");
        queue.enqueue(&mut create).unwrap();
        let cache = MemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let outcome = dispatcher
            .delete_entity(EntityKind::Product, &EntityRef::Pending("ref-1".into()))
            .unwrap();
        assert!(outcome.is_queued());
        assert_eq!(queue.pending_count().unwrap(), 2);
    }

    #[test]
    fn test_bound_pending_reference_uses_server_id() {
        let mut api = MockApiClient::new();
        api.expect_send()
            .withf(|r| r.endpoint == "productos/42/")
            .times(1)
            .returning(|_| Ok(Value::Null));
        let connectivity = StaticConnectivity(true);
        let queue = MemoryOperationStore::new();
        queue.bind_reference("ref-1", "42").unwrap();
        let cache = MemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let outcome = dispatcher
            .delete_entity(EntityKind::Product, &EntityRef::Pending("ref-1".into()))
            .unwrap();
        assert!(!outcome.is_queued());
    }

    #[test]
    fn test_unknown_pending_reference_rejected() {
        let api = no_network();
        let connectivity = StaticConnectivity(false);
        let queue = MemoryOperationStore::new();
        let cache = MemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(&cache, "api-cache");
        let dispatcher = MutationDispatcher::new(&api, &connectivity, &queue, &invalidator, &Base64Codec);

        let err = dispatcher
            .delete_entity(EntityKind::Product, &EntityRef::Pending("nope".into()))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(queue.pending_count().unwrap(), 0);
    }
}
