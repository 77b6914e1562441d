//! Async query abstraction for data fetching in views.
//!
//! Inspired by TanStack Query, this module provides a `Query<T>` type that
//! encapsulates async data fetching, loading states, and error handling, and
//! an `Action<T>` type for the writes a view performs.
//!
//! # Example
//!
//! ```ignore
//! let store = store.clone();
//! let mut query = Query::new(move || {
//!     let store = store.clone();
//!     async move { store.tasks(&ListFilter::status("todo")).await.map_err(|e| e.to_string()) }
//! })
//! .watching(cache.clone(), Collection::Tasks);
//!
//! // Start fetching
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::mpsc;

use crate::cache::{CacheLayer, Collection};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, String>> + Send + Sync>;

/// Ties a query to the cache collections it reads, so an invalidation of any
/// of them triggers a refetch on the next poll.
struct Watch {
  cache: CacheLayer,
  collections: Vec<Collection>,
  /// Sum of the collections' epochs when the current fetch started
  seen: u64,
}

impl Watch {
  fn current(&self) -> u64 {
    self.collections.iter().map(|c| self.cache.epoch(*c)).sum()
  }
}

/// Async query for data fetching with state management.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure)
/// - Loading/success/error states
/// - Async result handling via channels
/// - Refetching when a watched cache collection is invalidated
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  /// Data from the last success, kept on screen while a refetch runs
  previous: Option<T>,
  watch: Option<Watch>,
}

impl<T> Query<T> {
  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query succeeded, or the previous data while a
  /// refetch is in flight.
  pub fn data(&self) -> Option<&T> {
    match &self.state {
      QueryState::Success(data) => Some(data),
      QueryState::Loading => self.previous.as_ref(),
      _ => None,
    }
  }

  /// Check if the query is currently loading.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Check if the query succeeded.
  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error message if the query failed.
  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It is called on
  /// `fetch()` and again whenever a watched collection is invalidated.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      previous: None,
      watch: None,
    }
  }

  /// Refetch whenever `collection` is invalidated in `cache`.
  pub fn watching(mut self, cache: CacheLayer, collection: Collection) -> Self {
    match &mut self.watch {
      Some(watch) => watch.collections.push(collection),
      None => {
        self.watch = Some(Watch {
          cache,
          collections: vec![collection],
          seen: 0,
        })
      }
    }
    self
  }

  /// Start fetching data if not already loading.
  ///
  /// This is a no-op if the query is already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived, an error occurred, or
  /// a watched collection was invalidated and a refetch started).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return self.refetch_if_invalidated(),
    };

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.previous = None;
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.previous = None;
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.state = QueryState::Error("Query was cancelled".to_string());
        self.previous = None;
        self.receiver = None;
        true
      }
    }
  }

  fn refetch_if_invalidated(&mut self) -> bool {
    if matches!(self.state, QueryState::Idle) {
      return false;
    }
    let invalidated = match &self.watch {
      Some(watch) => watch.current() != watch.seen,
      None => false,
    };
    if invalidated {
      self.start_fetch();
    }
    invalidated
  }

  /// Internal: start the fetch operation. A fetch still in flight is
  /// abandoned by dropping its receiver.
  fn start_fetch(&mut self) {
    if let Some(watch) = &mut self.watch {
      watch.seen = watch.current();
    }

    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    if let QueryState::Success(data) = std::mem::replace(&mut self.state, QueryState::Loading) {
      self.previous = Some(data);
    }

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("watching", &self.watch.as_ref().map(|w| w.collections.clone()))
      .finish_non_exhaustive()
  }
}

/// The state of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
  Idle,
  Pending,
}

/// A single in-flight write (create, update, recipe run).
///
/// Unlike `Query`, the outcome is handed to the caller exactly once by
/// `poll()` and not kept: the view decides whether it becomes a notice, an
/// inline message, or nothing.
pub struct Action<T> {
  state: ActionState,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
}

impl<T: Send + 'static> Action<T> {
  pub fn new() -> Self {
    Self {
      state: ActionState::Idle,
      receiver: None,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.state == ActionState::Pending
  }

  /// Start a write. A second call while one is pending is ignored; returns
  /// whether the future was started.
  pub fn run<Fut>(&mut self, future: Fut) -> bool
  where
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    if self.is_pending() {
      return false;
    }
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = ActionState::Pending;
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
    true
  }

  /// Take the outcome of the pending write, if it has settled.
  pub fn poll(&mut self) -> Option<Result<T, String>> {
    let receiver = self.receiver.as_mut()?;
    let outcome = match receiver.try_recv() {
      Ok(result) => result,
      Err(mpsc::error::TryRecvError::Empty) => return None,
      Err(mpsc::error::TryRecvError::Disconnected) => Err("Request was cancelled".to_string()),
    };
    self.receiver = None;
    self.state = ActionState::Idle;
    Some(outcome)
  }
}

impl<T: Send + 'static> Default for Action<T> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("request failed: 500".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("request failed: 500"));
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok::<_, String>(42)
    });

    query.fetch();
    assert!(query.is_loading());

    // Second fetch should be no-op
    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_invalidation_abandons_pending_fetch() {
    let cache = CacheLayer::default();
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, String>(n)
      }
    })
    .watching(cache.clone(), Collection::Tasks);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&0));

    // Previous data stays visible while the refetch runs
    cache.invalidate_collection(Collection::Tasks).unwrap();
    assert!(query.poll());
    assert!(query.is_loading());
    assert_eq!(query.data(), Some(&0));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_accessors_work_for_any_item_type() {
    fn count<T>(query: &Query<Vec<T>>) -> usize {
      query.data().map(|v| v.len()).unwrap_or(0)
    }
    let mut query = Query::new(|| async { Ok::<_, String>(vec!["a", "b"]) });
    assert_eq!(count(&query), 0);
    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(count(&query), 2);
  }

  #[tokio::test]
  async fn test_watched_query_refetches_after_invalidation() {
    let cache = CacheLayer::default();
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();
    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst)) }
    })
    .watching(cache.clone(), Collection::Tasks);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&0));

    // Nothing invalidated: polling is quiet
    assert!(!query.poll());

    cache.invalidate_collection(Collection::Tasks).unwrap();
    assert!(query.poll());
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&1));
    assert!(!query.poll());
  }

  #[tokio::test]
  async fn test_unrelated_invalidation_is_ignored() {
    let cache = CacheLayer::default();
    let mut query =
      Query::new(|| async { Ok::<_, String>(1) }).watching(cache.clone(), Collection::Meals);
    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    cache.invalidate_collection(Collection::Tasks).unwrap();
    assert!(!query.poll());
  }

  #[tokio::test]
  async fn test_idle_watched_query_stays_idle() {
    let cache = CacheLayer::default();
    let mut query =
      Query::new(|| async { Ok::<_, String>(1) }).watching(cache.clone(), Collection::Tasks);
    cache.invalidate_collection(Collection::Tasks).unwrap();
    assert!(!query.poll());
    assert!(matches!(query.state(), QueryState::Idle));
  }

  #[tokio::test]
  async fn test_action_yields_outcome_once() {
    let mut action: Action<i32> = Action::new();
    assert!(action.run(async { Ok(5) }));
    assert!(action.is_pending());
    // A second write while pending is refused
    assert!(!action.run(async { Ok(6) }));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(action.poll(), Some(Ok(5)));
    assert_eq!(action.poll(), None);
    assert!(!action.is_pending());
  }

  #[tokio::test]
  async fn test_action_error() {
    let mut action: Action<()> = Action::new();
    action.run(async { Err("request failed: 500".to_string()) });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(action.poll(), Some(Err("request failed: 500".to_string())));
  }
}
