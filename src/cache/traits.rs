//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};

/// Anything that can sit in the cache.
///
/// Entries are stored as JSON, so a cached value only needs to survive a
/// serde round trip.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Cacheable for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}
