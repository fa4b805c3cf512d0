//! Entity commands: create, update, delete, list, show.

use tracing::debug;

use super::context::{parse_fields, Context};
use super::image::{load_image, release_preview};
use crate::api::{ApiClient, EntityKind, EntityRef};
use crate::cli::args::{CreateArgs, UpdateArgs};
use crate::error::CatalogError;
use crate::features::cache::{CacheInvalidator, CacheStore, CachedReader, ReadSource};
use crate::features::dispatch::{EntityPayload, MutationDispatcher, MutationOutcome};
use crate::features::image::Base64Codec;
use crate::features::queue::OperationStore;
use crate::output::{format_entities, format_entity, format_outcome};

/// Collaborators of a mutation, opened for one command.
struct Mutations {
    api: Box<dyn ApiClient>,
    connectivity: Box<dyn crate::features::connectivity::Connectivity>,
    queue: Box<dyn OperationStore>,
    cache: Box<dyn CacheStore>,
}

impl Mutations {
    fn open(ctx: &Context) -> Result<Self, CatalogError> {
        Ok(Self {
            api: Box::new(ctx.api()?),
            connectivity: ctx.connectivity()?,
            queue: Box::new(ctx.operation_store()?),
            cache: Box::new(ctx.cache_store()?),
        })
    }

    fn dispatch<F>(&self, ctx: &Context, f: F) -> Result<MutationOutcome, CatalogError>
    where
        F: FnOnce(&MutationDispatcher<'_>) -> Result<MutationOutcome, CatalogError>,
    {
        let invalidator = CacheInvalidator::new(self.cache.as_ref(), &ctx.config.cache.partition_prefix);
        let dispatcher = MutationDispatcher::new(
            self.api.as_ref(),
            self.connectivity.as_ref(),
            self.queue.as_ref(),
            &invalidator,
            &Base64Codec,
        );
        f(&dispatcher)
    }
}

fn image_prefix(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Product => "producto",
        EntityKind::User | EntityKind::Role | EntityKind::Category => "image",
    }
}

fn build_payload(
    ctx: &Context,
    kind: EntityKind,
    fields: &[String],
    image: &crate::cli::args::ImageOptions,
) -> Result<EntityPayload, CatalogError> {
    let payload = EntityPayload::new(parse_fields(fields)?);
    Ok(match load_image(ctx, image, image_prefix(kind))? {
        Some(normalized) => payload.with_image(normalized),
        None => payload,
    })
}

/// Execute create.
///
/// # Errors
///
/// Returns validation, API, transport or persistence errors from the dispatcher.
pub fn create(ctx: &Context, args: &CreateArgs) -> Result<String, CatalogError> {
    let payload = build_payload(ctx, args.kind, &args.fields, &args.image)?;
    let outcome = Mutations::open(ctx)
        .and_then(|m| m.dispatch(ctx, |d| d.create_entity(args.kind, &payload)));
    release_preview(ctx, payload.image.as_ref());

    format_outcome(args.kind, &outcome?, ctx.format)
}

/// Execute update.
///
/// # Errors
///
/// Returns validation, API, transport or persistence errors from the dispatcher.
pub fn update(ctx: &Context, args: &UpdateArgs) -> Result<String, CatalogError> {
    let target = EntityRef::parse(&args.id)?;
    let payload = build_payload(ctx, args.kind, &args.fields, &args.image)?;
    let outcome = Mutations::open(ctx)
        .and_then(|m| m.dispatch(ctx, |d| d.update_entity(args.kind, &target, &payload)));
    release_preview(ctx, payload.image.as_ref());

    format_outcome(args.kind, &outcome?, ctx.format)
}

/// Execute delete.
///
/// # Errors
///
/// Returns validation, API, transport or persistence errors from the dispatcher.
pub fn delete(ctx: &Context, kind: EntityKind, id: &str) -> Result<String, CatalogError> {
    let target = EntityRef::parse(id)?;
    let mutations = Mutations::open(ctx)?;

    let outcome = mutations.dispatch(ctx, |d| d.delete_entity(kind, &target))?;
    format_outcome(kind, &outcome, ctx.format)
}

/// Execute list.
///
/// # Errors
///
/// Returns the API client's error when the list is not cached and cannot be fetched.
pub fn list(ctx: &Context, kind: EntityKind, refresh: bool) -> Result<String, CatalogError> {
    let (body, from_cache) = read(ctx, &kind.collection_endpoint(), refresh)?;
    format_entities(kind, &body, from_cache, ctx.format)
}

/// Execute show.
///
/// # Errors
///
/// Returns `CatalogError::Validation` for a pending reference, or the API
/// client's error.
pub fn show(ctx: &Context, kind: EntityKind, id: &str, refresh: bool) -> Result<String, CatalogError> {
    let EntityRef::Server(id) = EntityRef::parse(id)? else {
        return Err(CatalogError::Validation(
            "a pending entity has no server copy yet; see 'queue list'".to_string(),
        ));
    };

    let (body, _) = read(ctx, &kind.member_endpoint(&id), refresh)?;
    format_entity(&body, ctx.format)
}

fn read(ctx: &Context, endpoint: &str, refresh: bool) -> Result<(serde_json::Value, bool), CatalogError> {
    let api = ctx.api()?;
    let cache = ctx.cache_store()?;
    let reader = CachedReader::new(&api, &cache, &ctx.config.cache.partition);

    if refresh {
        debug!(endpoint, "refresh requested");
        return Ok((reader.refresh(endpoint)?, false));
    }

    let (body, source) = reader.get(endpoint)?;
    Ok((body, source == ReadSource::Cache))
}
