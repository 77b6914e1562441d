//! Gateway with transparent caching, shared by every view.

use color_eyre::Result;

use crate::gateway::types::{
  BiblePlan, BibleReading, CalendarEvent, Contact, Deleted, Habit, HabitLog, Meal, MemoryEvent,
  NewContact, NewHabitLog, NewMeal, NewMemoryEvent, NewNurtureCycle, NewReflection, NewSkinLog,
  NewSkinProduct, NewTask, NurtureCycle, NurtureCyclePatch, ProfileUpdate, Reflection, Settings,
  SkinLog, SkinProduct, SkinRoutine, SleepLog, Task, TaskStatus, UserProfile,
};
use crate::gateway::{Gateway, ListFilter};

use super::invalidation::Mutation;
use super::key::{Collection, QueryKey};
use super::layer::CacheLayer;

/// Gateway with transparent caching support.
///
/// Reads go through the cache under a `(collection, filter)` key. Writes call
/// the gateway and, on success only, invalidate every collection the write
/// affects. Agent and recipe calls are not cached; use [`gateway`](Self::gateway).
#[derive(Clone)]
pub struct CachedGateway {
  inner: Gateway,
  cache: CacheLayer,
}

impl CachedGateway {
  pub fn new(inner: Gateway, cache: CacheLayer) -> Self {
    Self { inner, cache }
  }

  pub fn gateway(&self) -> &Gateway {
    &self.inner
  }

  pub fn cache(&self) -> &CacheLayer {
    &self.cache
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  pub async fn tasks(&self, filter: &ListFilter) -> Result<Vec<Task>> {
    let key = QueryKey::new(Collection::Tasks, filter.clone());
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        let filter = key.filter.clone();
        async move { inner.get_tasks(&filter).await }
      })
      .await
  }

  pub async fn events(&self, range: &ListFilter) -> Result<Vec<CalendarEvent>> {
    let key = QueryKey::new(Collection::Events, range.clone());
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        let range = key.filter.clone();
        async move { inner.get_events(&range).await }
      })
      .await
  }

  pub async fn habits(&self) -> Result<Vec<Habit>> {
    let key = QueryKey::all(Collection::Habits);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_habits().await }
      })
      .await
  }

  pub async fn meals(&self, range: &ListFilter) -> Result<Vec<Meal>> {
    let key = QueryKey::new(Collection::Meals, range.clone());
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        let range = key.filter.clone();
        async move { inner.get_meals(&range).await }
      })
      .await
  }

  pub async fn sleep_logs(&self, range: &ListFilter) -> Result<Vec<SleepLog>> {
    let key = QueryKey::new(Collection::Sleep, range.clone());
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        let range = key.filter.clone();
        async move { inner.get_sleep_logs(&range).await }
      })
      .await
  }

  pub async fn bible_plans(&self) -> Result<Vec<BiblePlan>> {
    let key = QueryKey::all(Collection::BiblePlans);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_bible_plans().await }
      })
      .await
  }

  pub async fn bible_readings(&self, filter: &ListFilter) -> Result<Vec<BibleReading>> {
    let key = QueryKey::new(Collection::BibleReadings, filter.clone());
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        let filter = key.filter.clone();
        async move { inner.get_bible_readings(&filter).await }
      })
      .await
  }

  pub async fn settings(&self) -> Result<Settings> {
    let key = QueryKey::all(Collection::Settings);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_settings().await }
      })
      .await
  }

  pub async fn profile(&self) -> Result<UserProfile> {
    let key = QueryKey::all(Collection::Profile);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_profile().await }
      })
      .await
  }

  pub async fn memory_events(&self) -> Result<Vec<MemoryEvent>> {
    let key = QueryKey::all(Collection::MemoryEvents);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_memory_events().await }
      })
      .await
  }

  pub async fn contacts(&self) -> Result<Vec<Contact>> {
    let key = QueryKey::all(Collection::Contacts);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_contacts().await }
      })
      .await
  }

  pub async fn nurture_cycles(&self) -> Result<Vec<NurtureCycle>> {
    let key = QueryKey::all(Collection::NurtureCycles);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_nurture_cycles().await }
      })
      .await
  }

  pub async fn skin_products(&self) -> Result<Vec<SkinProduct>> {
    let key = QueryKey::all(Collection::SkinProducts);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_skin_products().await }
      })
      .await
  }

  pub async fn skin_routines(&self) -> Result<Vec<SkinRoutine>> {
    let key = QueryKey::all(Collection::SkinRoutines);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_skin_routines().await }
      })
      .await
  }

  pub async fn skin_logs(&self, range: &ListFilter) -> Result<Vec<SkinLog>> {
    let key = QueryKey::new(Collection::SkinLogs, range.clone());
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        let range = key.filter.clone();
        async move { inner.get_skin_logs(&range).await }
      })
      .await
  }

  // ==========================================================================
  // Writes
  // ==========================================================================

  pub async fn create_task(&self, task: &NewTask) -> Result<Task> {
    self
      .cache
      .mutate(Mutation::CreateTask, || self.inner.create_task(task))
      .await
  }

  pub async fn update_task_status(&self, id: i64, status: TaskStatus) -> Result<Task> {
    self
      .cache
      .mutate(Mutation::UpdateTaskStatus, || {
        self.inner.update_task_status(id, status)
      })
      .await
  }

  pub async fn delete_task(&self, id: i64) -> Result<Deleted> {
    self
      .cache
      .mutate(Mutation::DeleteTask, || self.inner.delete_task(id))
      .await
  }

  pub async fn log_habit(&self, habit_id: i64, log: &NewHabitLog) -> Result<HabitLog> {
    self
      .cache
      .mutate(Mutation::LogHabit, || self.inner.log_habit(habit_id, log))
      .await
  }

  pub async fn create_meal(&self, meal: &NewMeal) -> Result<Meal> {
    self
      .cache
      .mutate(Mutation::CreateMeal, || self.inner.create_meal(meal))
      .await
  }

  pub async fn create_reflection(&self, reflection: &NewReflection) -> Result<Reflection> {
    self
      .cache
      .mutate(Mutation::CreateReflection, || {
        self.inner.create_bible_reflection(reflection)
      })
      .await
  }

  pub async fn update_settings(&self, settings: &Settings) -> Result<Settings> {
    self
      .cache
      .mutate(Mutation::UpdateSettings, || {
        self.inner.update_settings(settings)
      })
      .await
  }

  pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
    self
      .cache
      .mutate(Mutation::UpdateProfile, || self.inner.update_profile(update))
      .await
  }

  pub async fn create_memory_event(&self, event: &NewMemoryEvent) -> Result<MemoryEvent> {
    self
      .cache
      .mutate(Mutation::CreateMemoryEvent, || {
        self.inner.create_memory_event(event)
      })
      .await
  }

  pub async fn create_contact(&self, contact: &NewContact) -> Result<Contact> {
    self
      .cache
      .mutate(Mutation::CreateContact, || self.inner.create_contact(contact))
      .await
  }

  pub async fn create_nurture_cycle(&self, cycle: &NewNurtureCycle) -> Result<NurtureCycle> {
    self
      .cache
      .mutate(Mutation::CreateNurtureCycle, || {
        self.inner.create_nurture_cycle(cycle)
      })
      .await
  }

  pub async fn update_nurture_cycle(
    &self,
    id: i64,
    patch: &NurtureCyclePatch,
  ) -> Result<NurtureCycle> {
    self
      .cache
      .mutate(Mutation::UpdateNurtureCycle, || {
        self.inner.update_nurture_cycle(id, patch)
      })
      .await
  }

  pub async fn create_skin_product(&self, product: &NewSkinProduct) -> Result<SkinProduct> {
    self
      .cache
      .mutate(Mutation::CreateSkinProduct, || {
        self.inner.create_skin_product(product)
      })
      .await
  }

  pub async fn update_skin_product(&self, id: i64, product: &NewSkinProduct) -> Result<SkinProduct> {
    self
      .cache
      .mutate(Mutation::UpdateSkinProduct, || {
        self.inner.update_skin_product(id, product)
      })
      .await
  }

  pub async fn create_skin_log(&self, log: &NewSkinLog) -> Result<SkinLog> {
    self
      .cache
      .mutate(Mutation::CreateSkinLog, || self.inner.create_skin_log(log))
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gateway::GatewayError;
  use serde_json::json;
  use url::Url;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn task(id: i64, status: &str) -> serde_json::Value {
    json!({ "id": id, "title": format!("task {}", id), "status": status, "priority": 3 })
  }

  async fn store_for(server: &MockServer) -> CachedGateway {
    let base = Url::parse(&server.uri()).unwrap();
    let gateway = Gateway::with_endpoints(base.clone(), base, 1);
    CachedGateway::new(gateway, CacheLayer::default())
  }

  #[tokio::test]
  async fn test_status_update_refreshes_sibling_views() {
    let server = MockServer::start().await;
    let store = store_for(&server).await;

    // Dashboard reads tasks[status=todo], Plan reads the unfiltered list.
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .and(query_param("status", "todo"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([task(1, "todo")])))
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([task(1, "todo")])))
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(method("PATCH"))
      .and(path("/tasks/1/status"))
      .and(query_param("status", "done"))
      .respond_with(ResponseTemplate::new(200).set_body_json(task(1, "done")))
      .expect(1)
      .mount(&server)
      .await;

    store.tasks(&ListFilter::status("todo")).await.unwrap();
    store.tasks(&ListFilter::none()).await.unwrap();
    // Served from cache
    store.tasks(&ListFilter::status("todo")).await.unwrap();
    store.tasks(&ListFilter::none()).await.unwrap();

    // Completing from the plan view also stales the dashboard's key
    store.update_task_status(1, TaskStatus::Done).await.unwrap();

    store.tasks(&ListFilter::status("todo")).await.unwrap();
    store.tasks(&ListFilter::none()).await.unwrap();
    // MockServer verifies the expected call counts on drop
  }

  #[tokio::test]
  async fn test_failed_write_keeps_cache() {
    let server = MockServer::start().await;
    let store = store_for(&server).await;

    Mock::given(method("GET"))
      .and(path("/habits"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/habits/3/log"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    store.habits().await.unwrap();
    let err = store
      .log_habit(
        3,
        &NewHabitLog {
          date: "2024-05-01".into(),
          value: 1,
        },
      )
      .await
      .unwrap_err();
    assert_eq!(
      err.downcast_ref::<GatewayError>().and_then(|e| e.status()),
      Some(500)
    );
    store.habits().await.unwrap();
  }

  #[tokio::test]
  async fn test_reflection_does_not_touch_cached_readings() {
    let server = MockServer::start().await;
    let store = store_for(&server).await;

    Mock::given(method("GET"))
      .and(path("/bible/readings"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/bible/reflections"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": 9, "dt": "2024-05-01", "passage_ref": "John 3", "reflection_md": "..."
      })))
      .mount(&server)
      .await;

    store.bible_readings(&ListFilter::none()).await.unwrap();
    store
      .create_reflection(&NewReflection {
        dt: "2024-05-01".into(),
        passage_ref: "John 3".into(),
        reflection_md: "...".into(),
        tags: None,
      })
      .await
      .unwrap();
    store.bible_readings(&ListFilter::none()).await.unwrap();
  }
}
