//! Mutation dispatch: immediate when online, queued when offline.

pub mod dispatcher;
pub mod payload;

pub use dispatcher::MutationDispatcher;
pub use payload::{replay_body, EntityPayload, MutationOutcome};
