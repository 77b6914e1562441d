//! Query cache shared by every view.
//!
//! This module provides:
//! - Entries keyed by (collection, filter), stored as JSON
//! - Cache-first reads with explicit staleness
//! - A static mutation → collection table driving invalidation, so sibling
//!   views that read the same collection under different filters stay coherent

mod client;
mod invalidation;
mod key;
mod layer;
mod storage;
mod traits;

pub use client::CachedGateway;
pub use key::Collection;
pub use layer::CacheLayer;
