//! catalog-sync - offline-tolerant writes against a product catalog API
//!
//! Mutations (create, update, delete) go straight to the remote API when it
//! is reachable and into a durable local queue when it is not. Images are
//! normalized to a fixed size before they are attached, and cached API
//! responses are invalidated after every successful write.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod output;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::CatalogError;
pub use features::dispatch::{EntityPayload, MutationDispatcher, MutationOutcome};
