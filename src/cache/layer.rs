//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::config::Config;
use crate::gateway::GatewayError;

use super::invalidation::Mutation;
use super::key::{Collection, QueryKey};
use super::storage::{CacheStorage, CachedEntry, MemoryStorage, NoopStorage};
use super::traits::Cacheable;

/// Cache layer that manages caching logic and network fetching.
///
/// Sits between the views and the gateway. Reads are cache-first; writes go
/// through [`mutate`](Self::mutate), which invalidates the affected
/// collections once the write succeeds.
///
/// Concurrent fetches of one key are not de-duplicated and are not ordered:
/// whichever response is stored last wins. A response whose collection was
/// invalidated while it was in flight is returned but not stored.
#[derive(Clone)]
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  /// How long before cached data is considered stale; `None` means only
  /// invalidation makes an entry stale
  stale_time: Option<Duration>,
  /// Bumped on every invalidation of a collection, so watchers can tell
  /// their data went stale without polling storage
  epochs: Arc<Mutex<BTreeMap<Collection, u64>>>,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: impl CacheStorage + 'static) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: None,
      epochs: Arc::new(Mutex::new(BTreeMap::new())),
    }
  }

  /// In-memory cache, or a pass-through one when `cache.enabled` is off.
  pub fn from_config(config: &Config) -> Self {
    let layer = if config.cache.enabled {
      Self::new(MemoryStorage::new())
    } else {
      debug!("cache disabled");
      Self::new(NoopStorage)
    };
    layer.with_stale_time(config.stale_after())
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Option<Duration>) -> Self {
    self.stale_time = stale_time;
    self
  }

  fn is_stale(&self, entry: &CachedEntry) -> bool {
    if entry.stale {
      return true;
    }
    match self.stale_time {
      Some(stale_time) => Utc::now() - entry.cached_at >= stale_time,
      None => false,
    }
  }

  /// Fetch with a cache-first strategy.
  ///
  /// 1. Fresh entry - return it
  /// 2. Missing or stale - call the fetcher and store its result
  /// 3. Fetcher failed - return the error, leave the cache as it was
  pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<T>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, GatewayError>>,
  {
    if let Some(entry) = self.storage.get(key)? {
      if !self.is_stale(&entry) {
        match serde_json::from_value::<T>(entry.data) {
          Ok(data) => {
            debug!(%key, "cache hit");
            return Ok(data);
          }
          Err(e) => warn!(%key, error = %e, "cached entry did not decode, refetching"),
        }
      }
    }

    debug!(%key, "cache miss");
    let started = self.epoch(key.collection);
    let data = fetcher().await?;
    if self.epoch(key.collection) != started {
      debug!(%key, "invalidated while fetching, not stored");
      return Ok(data);
    }
    let value =
      serde_json::to_value(&data).map_err(|e| eyre!("Failed to serialize {}: {}", key, e))?;
    self.storage.put(key, value)?;
    Ok(data)
  }

  /// Run a write and, if it succeeds, invalidate what it affects.
  /// A failed write invalidates nothing.
  pub async fn mutate<T, F, Fut>(&self, mutation: Mutation, op: F) -> Result<T>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, GatewayError>>,
  {
    let out = op().await?;
    self.invalidate(mutation)?;
    Ok(out)
  }

  /// Mark every variant of every collection the mutation affects as stale.
  pub fn invalidate(&self, mutation: Mutation) -> Result<usize> {
    let mut marked = 0;
    for collection in mutation.invalidates() {
      marked += self.invalidate_collection(*collection)?;
    }
    debug!(?mutation, marked, "invalidated");
    Ok(marked)
  }

  pub fn invalidate_collection(&self, collection: Collection) -> Result<usize> {
    let marked = self.storage.mark_stale(collection)?;
    self.bump(collection);
    Ok(marked)
  }

  /// Drop every entry (manual reload).
  pub fn clear(&self) -> Result<()> {
    self.storage.clear()?;
    for collection in Collection::ALL {
      self.bump(*collection);
    }
    debug!("cache cleared");
    Ok(())
  }

  /// Invalidation counter for a collection.
  pub fn epoch(&self, collection: Collection) -> u64 {
    let epochs = self.epochs.lock().unwrap_or_else(PoisonError::into_inner);
    epochs.get(&collection).copied().unwrap_or(0)
  }

  fn bump(&self, collection: Collection) {
    let mut epochs = self.epochs.lock().unwrap_or_else(PoisonError::into_inner);
    *epochs.entry(collection).or_insert(0) += 1;
  }
}

impl Default for CacheLayer {
  fn default() -> Self {
    Self::new(MemoryStorage::new())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::CacheConfig;
  use crate::gateway::ListFilter;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration as StdDuration;

  fn todo_key() -> QueryKey {
    QueryKey::new(Collection::Tasks, ListFilter::status("todo"))
  }

  /// Whether a read of `key` would be served without a network call.
  fn is_fresh(cache: &CacheLayer, key: &QueryKey) -> bool {
    cache
      .storage
      .get(key)
      .unwrap()
      .map(|entry| !cache.is_stale(&entry))
      .unwrap_or(false)
  }

  fn stored<T: Cacheable>(cache: &CacheLayer, key: &QueryKey) -> Option<T> {
    cache
      .storage
      .get(key)
      .unwrap()
      .map(|entry| serde_json::from_value(entry.data).unwrap())
  }

  async fn counted_fetch(cache: &CacheLayer, key: &QueryKey, counter: &Arc<AtomicU32>) -> Vec<u32> {
    let counter = Arc::clone(counter);
    cache
      .fetch(key, || async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, GatewayError>(vec![n])
      })
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_second_read_is_served_from_cache() {
    let cache = CacheLayer::default();
    let counter = Arc::new(AtomicU32::new(0));
    let key = QueryKey::all(Collection::Habits);

    let first = counted_fetch(&cache, &key, &counter).await;
    let second = counted_fetch(&cache, &key, &counter).await;

    assert_eq!(first, vec![0]);
    assert_eq!(second, vec![0]);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_mutation_invalidates_filtered_and_unfiltered_variants() {
    let cache = CacheLayer::default();
    let counter = Arc::new(AtomicU32::new(0));
    let all = QueryKey::all(Collection::Tasks);
    let todo = todo_key();

    counted_fetch(&cache, &all, &counter).await;
    counted_fetch(&cache, &todo, &counter).await;
    assert!(is_fresh(&cache, &all));
    assert!(is_fresh(&cache, &todo));

    cache
      .mutate(Mutation::UpdateTaskStatus, || async {
        Ok::<_, GatewayError>(())
      })
      .await
      .unwrap();

    assert!(!is_fresh(&cache, &all));
    assert!(!is_fresh(&cache, &todo));

    assert_eq!(counted_fetch(&cache, &all, &counter).await, vec![2]);
    assert_eq!(counted_fetch(&cache, &todo, &counter).await, vec![3]);
    assert_eq!(counter.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn test_every_mutation_stales_all_variants_of_its_collections() {
    for mutation in Mutation::ALL {
      let cache = CacheLayer::default();
      let counter = Arc::new(AtomicU32::new(0));
      for collection in mutation.invalidates() {
        let keys = [
          QueryKey::all(*collection),
          QueryKey::new(*collection, ListFilter::status("x")),
          QueryKey::new(
            *collection,
            ListFilter {
              plan_id: Some(1),
              ..ListFilter::none()
            },
          ),
        ];
        for key in &keys {
          counted_fetch(&cache, key, &counter).await;
        }
        cache.invalidate(*mutation).unwrap();
        for key in &keys {
          assert!(!is_fresh(&cache, key), "{:?} left {} fresh", mutation, key);
        }
      }
    }
  }

  #[tokio::test]
  async fn test_unrelated_collection_stays_fresh() {
    let cache = CacheLayer::default();
    let counter = Arc::new(AtomicU32::new(0));
    let meals = QueryKey::all(Collection::Meals);
    counted_fetch(&cache, &meals, &counter).await;

    cache.invalidate(Mutation::CreateTask).unwrap();
    assert!(is_fresh(&cache, &meals));
  }

  #[tokio::test]
  async fn test_failed_mutation_invalidates_nothing() {
    let cache = CacheLayer::default();
    let counter = Arc::new(AtomicU32::new(0));
    let all = QueryKey::all(Collection::Tasks);
    counted_fetch(&cache, &all, &counter).await;
    let epoch = cache.epoch(Collection::Tasks);

    let result = cache
      .mutate(Mutation::CreateTask, || async {
        Err::<(), _>(GatewayError::Status { status: 500 })
      })
      .await;

    assert!(result.is_err());
    assert!(is_fresh(&cache, &all));
    assert_eq!(cache.epoch(Collection::Tasks), epoch);
  }

  #[tokio::test]
  async fn test_failed_fetch_keeps_status_and_caches_nothing() {
    let cache = CacheLayer::default();
    let key = QueryKey::all(Collection::Contacts);

    let err = cache
      .fetch(&key, || async {
        Err::<Vec<u32>, _>(GatewayError::Status { status: 500 })
      })
      .await
      .unwrap_err();

    let gateway_err = err.downcast_ref::<GatewayError>().unwrap();
    assert_eq!(gateway_err.status(), Some(500));
    assert!(stored::<Vec<u32>>(&cache, &key).is_none());
  }

  #[tokio::test]
  async fn test_concurrent_fetches_last_response_wins() {
    let cache = CacheLayer::default();
    let key = QueryKey::all(Collection::Tasks);

    // The first request is slower, so its (older) answer lands last.
    let slow = cache.fetch(&key, || async {
      tokio::time::sleep(StdDuration::from_millis(50)).await;
      Ok::<_, GatewayError>(vec!["first".to_string()])
    });
    let fast = cache.fetch(&key, || async {
      tokio::time::sleep(StdDuration::from_millis(5)).await;
      Ok::<_, GatewayError>(vec!["second".to_string()])
    });
    let (slow, fast) = tokio::join!(slow, fast);

    assert_eq!(slow.unwrap(), vec!["first".to_string()]);
    assert_eq!(fast.unwrap(), vec!["second".to_string()]);
    assert_eq!(
      stored::<Vec<String>>(&cache, &key),
      Some(vec!["first".to_string()])
    );
  }

  #[tokio::test]
  async fn test_fetch_spanning_an_invalidation_is_not_stored() {
    let cache = CacheLayer::default();
    let key = todo_key();

    let before_write = cache.fetch(&key, || async {
      tokio::time::sleep(StdDuration::from_millis(50)).await;
      Ok::<_, GatewayError>(vec!["old".to_string()])
    });
    let write = async {
      tokio::time::sleep(StdDuration::from_millis(5)).await;
      cache
        .mutate(Mutation::UpdateTaskStatus, || async {
          Ok::<_, GatewayError>(())
        })
        .await
    };
    let (old, written) = tokio::join!(before_write, write);
    written.unwrap();

    // The caller still gets its answer, but the next read goes to the network
    assert_eq!(old.unwrap(), vec!["old".to_string()]);
    assert!(stored::<Vec<String>>(&cache, &key).is_none());
    let fresh = cache
      .fetch(&key, || async { Ok::<_, GatewayError>(vec!["new".to_string()]) })
      .await
      .unwrap();
    assert_eq!(fresh, vec!["new".to_string()]);
  }

  #[tokio::test]
  async fn test_zero_stale_time_always_refetches() {
    let cache = CacheLayer::default().with_stale_time(Some(Duration::zero()));
    let counter = Arc::new(AtomicU32::new(0));
    let key = QueryKey::all(Collection::Sleep);

    counted_fetch(&cache, &key, &counter).await;
    counted_fetch(&cache, &key, &counter).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_disabled_cache_never_caches() {
    let config = Config {
      cache: CacheConfig {
        enabled: false,
        stale_after_secs: None,
      },
      ..Config::default()
    };
    let cache = CacheLayer::from_config(&config);
    let counter = Arc::new(AtomicU32::new(0));
    let key = QueryKey::all(Collection::Events);

    counted_fetch(&cache, &key, &counter).await;
    counted_fetch(&cache, &key, &counter).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_config_stale_time_is_applied() {
    let config = Config {
      cache: CacheConfig {
        enabled: true,
        stale_after_secs: Some(0),
      },
      ..Config::default()
    };
    let cache = CacheLayer::from_config(&config);
    let counter = Arc::new(AtomicU32::new(0));
    let key = QueryKey::all(Collection::Habits);

    counted_fetch(&cache, &key, &counter).await;
    counted_fetch(&cache, &key, &counter).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_clear_empties_and_bumps_epochs() {
    let cache = CacheLayer::default();
    let counter = Arc::new(AtomicU32::new(0));
    let key = QueryKey::all(Collection::Settings);
    counted_fetch(&cache, &key, &counter).await;
    let before = cache.epoch(Collection::Settings);

    cache.clear().unwrap();
    assert!(stored::<Vec<u32>>(&cache, &key).is_none());
    assert!(cache.epoch(Collection::Settings) > before);
  }
}
