use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

use super::error::GatewayError;
use super::filter::ListFilter;
use super::recipes::{
  BibleReflection, ChatReply, CodeReply, DailyDigest, MacroCoachAdvice, NextBestStep, Recipe,
  RecipeRequest, SkinCoachAdvice, UserRequest, WeeklyReview,
};
use super::types::{
  BiblePlan, BibleReading, CalendarEvent, Contact, Deleted, Habit, HabitLog, Meal, MemoryEvent,
  NewContact, NewHabitLog, NewMeal, NewMemoryEvent, NewNurtureCycle, NewReflection,
  NewSkinLog, NewSkinProduct, NewTask, NurtureCycle, NurtureCyclePatch, ProfileUpdate,
  Reflection, Settings, SkinLog, SkinProduct, SkinRoutine, SleepLog, Task, TaskStatus,
  UserProfile,
};

pub type GatewayResult<T> = Result<T, GatewayError>;

/// The only component that talks to the backends.
///
/// Each method is exactly one HTTP call against either the primary API or the
/// agent service. Calls are fire-once: no retry, no timeout, no backoff.
#[derive(Clone)]
pub struct Gateway {
  http: reqwest::Client,
  api_base: Url,
  agent_base: Url,
  user_id: i64,
}

impl Gateway {
  pub fn new(config: &Config) -> color_eyre::Result<Self> {
    let api_base = Url::parse(&config.api_url)
      .map_err(|e| color_eyre::eyre::eyre!("Invalid api_url {}: {}", config.api_url, e))?;
    let agent_base = Url::parse(&config.agent_url)
      .map_err(|e| color_eyre::eyre::eyre!("Invalid agent_url {}: {}", config.agent_url, e))?;
    Ok(Self::with_endpoints(api_base, agent_base, config.user_id))
  }

  pub fn with_endpoints(api_base: Url, agent_base: Url, user_id: i64) -> Self {
    Self {
      http: reqwest::Client::new(),
      api_base: as_directory(api_base),
      agent_base: as_directory(agent_base),
      user_id,
    }
  }

  // ==========================================================================
  // Tasks
  // ==========================================================================

  pub async fn get_tasks(&self, filter: &ListFilter) -> GatewayResult<Vec<Task>> {
    self.get(self.api_url("tasks", filter)?).await
  }

  pub async fn create_task(&self, task: &NewTask) -> GatewayResult<Task> {
    self.send(Method::POST, self.api_url("tasks", &ListFilter::none())?, task).await
  }

  /// Status-only update. The backend takes the status as a query parameter
  /// on a bodyless PATCH.
  pub async fn update_task_status(&self, id: i64, status: TaskStatus) -> GatewayResult<Task> {
    let url = self.api_url(
      &format!("tasks/{}/status", id),
      &ListFilter::status(status.as_str()),
    )?;
    self.execute(self.http.request(Method::PATCH, url)).await
  }

  pub async fn delete_task(&self, id: i64) -> GatewayResult<Deleted> {
    let url = self.api_url(&format!("tasks/{}", id), &ListFilter::none())?;
    self.execute(self.http.request(Method::DELETE, url)).await
  }

  // ==========================================================================
  // Calendar, habits, health
  // ==========================================================================

  pub async fn get_events(&self, range: &ListFilter) -> GatewayResult<Vec<CalendarEvent>> {
    self.get(self.api_url("calendars/events", range)?).await
  }

  pub async fn get_habits(&self) -> GatewayResult<Vec<Habit>> {
    self.get(self.api_url("habits", &ListFilter::none())?).await
  }

  pub async fn log_habit(&self, habit_id: i64, log: &NewHabitLog) -> GatewayResult<HabitLog> {
    let url = self.api_url(&format!("habits/{}/log", habit_id), &ListFilter::none())?;
    self.send(Method::POST, url, log).await
  }

  pub async fn get_meals(&self, range: &ListFilter) -> GatewayResult<Vec<Meal>> {
    self.get(self.api_url("meals", range)?).await
  }

  pub async fn create_meal(&self, meal: &NewMeal) -> GatewayResult<Meal> {
    self.send(Method::POST, self.api_url("meals", &ListFilter::none())?, meal).await
  }

  pub async fn get_sleep_logs(&self, range: &ListFilter) -> GatewayResult<Vec<SleepLog>> {
    self.get(self.api_url("sleep", range)?).await
  }

  // ==========================================================================
  // Bible
  // ==========================================================================

  pub async fn get_bible_plans(&self) -> GatewayResult<Vec<BiblePlan>> {
    self.get(self.api_url("bible/plans", &ListFilter::none())?).await
  }

  pub async fn get_bible_readings(&self, filter: &ListFilter) -> GatewayResult<Vec<BibleReading>> {
    self.get(self.api_url("bible/readings", filter)?).await
  }

  pub async fn create_bible_reflection(
    &self,
    reflection: &NewReflection,
  ) -> GatewayResult<Reflection> {
    let url = self.api_url("bible/reflections", &ListFilter::none())?;
    self.send(Method::POST, url, reflection).await
  }

  // ==========================================================================
  // Settings & profile
  // ==========================================================================

  pub async fn get_settings(&self) -> GatewayResult<Settings> {
    self.get(self.api_url("settings", &ListFilter::none())?).await
  }

  pub async fn update_settings(&self, settings: &Settings) -> GatewayResult<Settings> {
    self.send(Method::PUT, self.api_url("settings", &ListFilter::none())?, settings).await
  }

  pub async fn get_profile(&self) -> GatewayResult<UserProfile> {
    self.get(self.api_url("profile", &ListFilter::none())?).await
  }

  pub async fn update_profile(&self, update: &ProfileUpdate) -> GatewayResult<UserProfile> {
    self.send(Method::PUT, self.api_url("profile", &ListFilter::none())?, update).await
  }

  pub async fn get_memory_events(&self) -> GatewayResult<Vec<MemoryEvent>> {
    self.get(self.api_url("profile/memory", &ListFilter::none())?).await
  }

  pub async fn create_memory_event(&self, event: &NewMemoryEvent) -> GatewayResult<MemoryEvent> {
    let url = self.api_url("profile/memory", &ListFilter::none())?;
    self.send(Method::POST, url, event).await
  }

  // ==========================================================================
  // Relationships
  // ==========================================================================

  pub async fn get_contacts(&self) -> GatewayResult<Vec<Contact>> {
    self.get(self.api_url("contacts", &ListFilter::none())?).await
  }

  pub async fn create_contact(&self, contact: &NewContact) -> GatewayResult<Contact> {
    self.send(Method::POST, self.api_url("contacts", &ListFilter::none())?, contact).await
  }

  pub async fn get_nurture_cycles(&self) -> GatewayResult<Vec<NurtureCycle>> {
    let url = self.api_url("relationships/nurture-cycles", &ListFilter::none())?;
    self.get(url).await
  }

  pub async fn create_nurture_cycle(&self, cycle: &NewNurtureCycle) -> GatewayResult<NurtureCycle> {
    let url = self.api_url("relationships/nurture-cycles", &ListFilter::none())?;
    self.send(Method::POST, url, cycle).await
  }

  pub async fn update_nurture_cycle(
    &self,
    id: i64,
    patch: &NurtureCyclePatch,
  ) -> GatewayResult<NurtureCycle> {
    let url = self.api_url(
      &format!("relationships/nurture-cycles/{}", id),
      &ListFilter::none(),
    )?;
    self.send(Method::PATCH, url, patch).await
  }

  // ==========================================================================
  // Skin
  // ==========================================================================

  pub async fn get_skin_products(&self) -> GatewayResult<Vec<SkinProduct>> {
    self.get(self.api_url("skin/products", &ListFilter::none())?).await
  }

  pub async fn create_skin_product(&self, product: &NewSkinProduct) -> GatewayResult<SkinProduct> {
    let url = self.api_url("skin/products", &ListFilter::none())?;
    self.send(Method::POST, url, product).await
  }

  pub async fn update_skin_product(
    &self,
    id: i64,
    product: &NewSkinProduct,
  ) -> GatewayResult<SkinProduct> {
    let url = self.api_url(&format!("skin/products/{}", id), &ListFilter::none())?;
    self.send(Method::PUT, url, product).await
  }

  pub async fn get_skin_routines(&self) -> GatewayResult<Vec<SkinRoutine>> {
    self.get(self.api_url("skin/routines", &ListFilter::none())?).await
  }

  pub async fn get_skin_logs(&self, range: &ListFilter) -> GatewayResult<Vec<SkinLog>> {
    self.get(self.api_url("skin/logs", range)?).await
  }

  pub async fn create_skin_log(&self, log: &NewSkinLog) -> GatewayResult<SkinLog> {
    self.send(Method::POST, self.api_url("skin/logs", &ListFilter::none())?, log).await
  }

  // ==========================================================================
  // Agent
  // ==========================================================================

  /// Single recommendation, proxied by the primary API.
  pub async fn next_best_step(&self) -> GatewayResult<NextBestStep> {
    let url = self.api_url("agent/next-best-step", &ListFilter::none())?;
    self.send(Method::POST, url, &self.user_request()).await
  }

  pub async fn daily_digest(&self) -> GatewayResult<DailyDigest> {
    let url = self.agent_url("digest/daily")?;
    self.send(Method::POST, url, &self.user_request()).await
  }

  pub async fn weekly_review(&self) -> GatewayResult<WeeklyReview> {
    let url = self.agent_url("review/weekly")?;
    self.send(Method::POST, url, &self.user_request()).await
  }

  pub async fn run_recipe_as<T: DeserializeOwned>(
    &self,
    name: &str,
    params: &Value,
  ) -> GatewayResult<T> {
    let url = self.agent_url(&format!("recipes/{}", name))?;
    let body = RecipeRequest {
      user_id: self.user_id,
      params,
    };
    self.send(Method::POST, url, &body).await
  }

  pub async fn chat(&self, message: &str) -> GatewayResult<ChatReply> {
    let params = json!({ "message": message });
    self
      .run_recipe_as(Recipe::ChatAssistant.name(), &params)
      .await
  }

  /// Code assistant turn. With files selected the agent reads them; without,
  /// it answers from the project listing.
  pub async fn code_assist(&self, message: &str, files: &[String]) -> GatewayResult<CodeReply> {
    let operation = if files.is_empty() { "list" } else { "read" };
    let params = json!({ "message": message, "files": files, "operation": operation });
    self
      .run_recipe_as(Recipe::CodeAssistant.name(), &params)
      .await
  }

  pub async fn list_project_files(&self) -> GatewayResult<CodeReply> {
    let params = json!({ "message": "", "operation": "list" });
    self
      .run_recipe_as(Recipe::CodeAssistant.name(), &params)
      .await
  }

  pub async fn reflect_on_passage(&self, passage: &str) -> GatewayResult<BibleReflection> {
    let params = json!({ "passage": passage });
    self
      .run_recipe_as(Recipe::BibleReflector.name(), &params)
      .await
  }

  pub async fn macro_coach(&self, protein_g: i64, calories: i64) -> GatewayResult<MacroCoachAdvice> {
    let params = json!({ "targets": { "protein_g": protein_g, "calories": calories } });
    self.run_recipe_as(Recipe::MacroCoach.name(), &params).await
  }

  pub async fn skin_coach(&self) -> GatewayResult<SkinCoachAdvice> {
    self
      .run_recipe_as(Recipe::SkinCoach.name(), &json!({}))
      .await
  }

  // ==========================================================================
  // Plumbing
  // ==========================================================================

  fn user_request(&self) -> UserRequest {
    UserRequest {
      user_id: self.user_id,
    }
  }

  fn api_url(&self, path: &str, filter: &ListFilter) -> GatewayResult<Url> {
    let mut url = self.api_base.join(path)?;
    filter.apply(&mut url);
    Ok(url)
  }

  fn agent_url(&self, path: &str) -> GatewayResult<Url> {
    Ok(self.agent_base.join(path)?)
  }

  async fn get<T: DeserializeOwned>(&self, url: Url) -> GatewayResult<T> {
    self.execute(self.http.get(url)).await
  }

  async fn send<B, T>(&self, method: Method, url: Url, body: &B) -> GatewayResult<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    self.execute(self.http.request(method, url).json(body)).await
  }

  /// Issue one request and decode its JSON body. Any non-2xx status becomes
  /// [`GatewayError::Status`] without looking at the body.
  async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> GatewayResult<T> {
    let request = builder.build()?;
    let method = request.method().clone();
    let url = request.url().clone();
    debug!(%method, %url, "gateway request");

    let response = self.http.execute(request).await?;
    let status = response.status();
    if !status.is_success() {
      warn!(%method, %url, status = status.as_u16(), "gateway request failed");
      return Err(GatewayError::Status {
        status: status.as_u16(),
      });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
      warn!(%method, %url, error = %e, "gateway response did not decode");
      GatewayError::Decode(e.to_string())
    })
  }
}

/// Make sure relative joins append to the base path instead of replacing its
/// last segment.
fn as_directory(mut url: Url) -> Url {
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  url
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{body_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn gateway_for(server: &MockServer) -> Gateway {
    let base = Url::parse(&server.uri()).unwrap();
    Gateway::with_endpoints(base.clone(), base, 1)
  }

  fn task_json(id: i64, status: &str) -> Value {
    json!({ "id": id, "title": format!("task {}", id), "status": status, "priority": 1 })
  }

  #[tokio::test]
  async fn test_unfiltered_list_sends_no_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([task_json(1, "todo")])))
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let tasks = gateway.get_tasks(&ListFilter::none()).await.unwrap();
    assert_eq!(tasks.len(), 1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), None);
  }

  #[tokio::test]
  async fn test_status_filter_is_a_query_param() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .and(query_param("status", "todo"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([task_json(2, "todo")])))
      .expect(1)
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let tasks = gateway.get_tasks(&ListFilter::status("todo")).await.unwrap();
    assert_eq!(tasks[0].id, 2);
  }

  #[tokio::test]
  async fn test_open_date_range_omits_missing_bound() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/meals"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let range = ListFilter {
      start: Some("2026-10-17".to_string()),
      ..ListFilter::none()
    };
    gateway.get_meals(&range).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("start=2026-10-17"));
  }

  #[tokio::test]
  async fn test_task_status_update_uses_query_not_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
      .and(path("/tasks/5/status"))
      .and(query_param("status", "done"))
      .respond_with(ResponseTemplate::new(200).set_body_json(task_json(5, "done")))
      .expect(1)
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let task = gateway.update_task_status(5, TaskStatus::Done).await.unwrap();
    assert_eq!(task.status, TaskStatus::Done);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].body.is_empty());
  }

  #[tokio::test]
  async fn test_create_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/tasks"))
      .and(body_json(json!({ "title": "Stretch", "status": "todo", "priority": 5 })))
      .respond_with(ResponseTemplate::new(200).set_body_json(task_json(9, "todo")))
      .expect(1)
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let new_task = NewTask {
      title: "Stretch".to_string(),
      status: TaskStatus::Todo,
      priority: 5,
      notes: None,
      due_ts: None,
    };
    let task = gateway.create_task(&new_task).await.unwrap();
    assert_eq!(task.id, 9);
  }

  #[tokio::test]
  async fn test_server_error_exposes_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/contacts"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let err = gateway.get_contacts().await.unwrap_err();
    assert_eq!(err, GatewayError::Status { status: 500 });
    assert_eq!(err.status(), Some(500));
  }

  #[tokio::test]
  async fn test_not_found_is_treated_like_any_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/settings"))
      .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "nope"})))
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let err = gateway.get_settings().await.unwrap_err();
    assert_eq!(err.status(), Some(404));
  }

  #[tokio::test]
  async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/habits"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"not": "a list"})))
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let err = gateway.get_habits().await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)));
    assert_eq!(err.status(), None);
  }

  #[tokio::test]
  async fn test_unreachable_backend_is_transport_error() {
    let base = Url::parse("http://127.0.0.1:9").unwrap();
    let gateway = Gateway::with_endpoints(base.clone(), base, 1);
    let err = gateway.get_habits().await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
  }

  #[tokio::test]
  async fn test_recipe_body_carries_user_and_params() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/recipes/chat_assistant"))
      .and(body_json(json!({ "user_id": 1, "params": { "message": "hi" } })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "hello"})))
      .expect(1)
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let reply = gateway.chat("hi").await.unwrap();
    assert_eq!(reply.response, "hello");
  }

  #[tokio::test]
  async fn test_digest_goes_to_agent_base() {
    let api = MockServer::start().await;
    let agent = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/digest/daily"))
      .and(body_json(json!({ "user_id": 1 })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"plan": ["Walk"]})))
      .expect(1)
      .mount(&agent)
      .await;

    let gateway = Gateway::with_endpoints(
      Url::parse(&api.uri()).unwrap(),
      Url::parse(&agent.uri()).unwrap(),
      1,
    );
    let digest = gateway.daily_digest().await.unwrap();
    assert_eq!(digest.plan.len(), 1);
    assert!(api.received_requests().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_code_assist_picks_operation_from_files() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/recipes/code_assistant"))
      .and(body_json(json!({
        "user_id": 1,
        "params": { "message": "explain", "files": ["src/main.rs"], "operation": "read" }
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
      .expect(1)
      .mount(&server)
      .await;

    let gateway = gateway_for(&server).await;
    let reply = gateway
      .code_assist("explain", &["src/main.rs".to_string()])
      .await
      .unwrap();
    assert_eq!(reply.response, "ok");
  }

  #[test]
  fn test_base_with_path_keeps_prefix() {
    let base = as_directory(Url::parse("http://host/api").unwrap());
    assert_eq!(base.join("tasks").unwrap().as_str(), "http://host/api/tasks");
  }
}
