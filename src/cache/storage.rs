//! Cache storage trait and the in-process implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::key::{Collection, QueryKey};

/// A single cached query result.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  /// The serialized result
  pub data: Value,
  /// When the result was stored
  pub cached_at: DateTime<Utc>,
  /// Set by invalidation; the next read goes to the network
  pub stale: bool,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Get the entry for a key.
  fn get(&self, key: &QueryKey) -> Result<Option<CachedEntry>>;

  /// Store a fresh result, replacing whatever the key held.
  fn put(&self, key: &QueryKey, data: Value) -> Result<()>;

  /// Mark every entry of a collection stale, whatever its filter.
  /// Returns how many entries were marked.
  fn mark_stale(&self, collection: Collection) -> Result<usize>;

  /// Drop everything.
  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Selected by `cache.enabled: false`; every read goes to the network.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &QueryKey) -> Result<Option<CachedEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _key: &QueryKey, _data: Value) -> Result<()> {
    Ok(()) // Discard
  }

  fn mark_stale(&self, _collection: Collection) -> Result<usize> {
    Ok(0)
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// Process-scoped key→entry map. Lives until the process exits or is cleared.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<BTreeMap<QueryKey, CachedEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<QueryKey, CachedEntry>>> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl CacheStorage for MemoryStorage {
  fn get(&self, key: &QueryKey) -> Result<Option<CachedEntry>> {
    Ok(self.lock()?.get(key).cloned())
  }

  fn put(&self, key: &QueryKey, data: Value) -> Result<()> {
    let entry = CachedEntry {
      data,
      cached_at: Utc::now(),
      stale: false,
    };
    self.lock()?.insert(key.clone(), entry);
    Ok(())
  }

  fn mark_stale(&self, collection: Collection) -> Result<usize> {
    let mut entries = self.lock()?;
    let mut marked = 0;
    for (key, entry) in entries.iter_mut() {
      if key.collection == collection {
        entry.stale = true;
        marked += 1;
      }
    }
    Ok(marked)
  }

  fn clear(&self) -> Result<()> {
    self.lock()?.clear();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gateway::ListFilter;
  use serde_json::json;

  #[test]
  fn test_put_then_get() {
    let storage = MemoryStorage::new();
    let key = QueryKey::all(Collection::Habits);
    storage.put(&key, json!([1, 2])).unwrap();

    let entry = storage.get(&key).unwrap().unwrap();
    assert_eq!(entry.data, json!([1, 2]));
    assert!(!entry.stale);
  }

  #[test]
  fn test_mark_stale_hits_every_variant_and_nothing_else() {
    let storage = MemoryStorage::new();
    let all = QueryKey::all(Collection::Tasks);
    let todo = QueryKey::new(Collection::Tasks, ListFilter::status("todo"));
    let meals = QueryKey::all(Collection::Meals);
    for key in [&all, &todo, &meals] {
      storage.put(key, json!([])).unwrap();
    }

    assert_eq!(storage.mark_stale(Collection::Tasks).unwrap(), 2);
    assert!(storage.get(&all).unwrap().unwrap().stale);
    assert!(storage.get(&todo).unwrap().unwrap().stale);
    assert!(!storage.get(&meals).unwrap().unwrap().stale);
  }

  #[test]
  fn test_put_clears_stale_flag() {
    let storage = MemoryStorage::new();
    let key = QueryKey::all(Collection::Contacts);
    storage.put(&key, json!([])).unwrap();
    storage.mark_stale(Collection::Contacts).unwrap();
    storage.put(&key, json!([{"id": 1}])).unwrap();
    assert!(!storage.get(&key).unwrap().unwrap().stale);
  }

  #[test]
  fn test_noop_always_misses() {
    let storage = NoopStorage;
    let key = QueryKey::all(Collection::Sleep);
    storage.put(&key, json!([])).unwrap();
    assert!(storage.get(&key).unwrap().is_none());
  }

  #[test]
  fn test_clear() {
    let storage = MemoryStorage::new();
    let key = QueryKey::all(Collection::Settings);
    storage.put(&key, json!({})).unwrap();
    storage.clear().unwrap();
    assert!(storage.get(&key).unwrap().is_none());
  }
}
