//! Feature implementations for catalog-sync.
//!
//! - Image normalization (validate, crop, render)
//! - Connectivity oracle
//! - Durable operation queue and replay
//! - Mutation dispatcher
//! - Response cache and invalidation

pub mod cache;
pub mod connectivity;
pub mod dispatch;
pub mod image;
pub mod queue;
