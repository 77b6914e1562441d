//! Records exchanged with the primary API.
//!
//! Identity is always assigned by the backend; `New*` types are request bodies
//! and never carry an id. Timestamps stay as the backend's ISO 8601 strings and
//! are parsed only where a derived value needs them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  #[default]
  Todo,
  Doing,
  Done,
}

impl TaskStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Todo => "todo",
      Self::Doing => "doing",
      Self::Done => "done",
    }
  }

  /// Column a task moves to when advanced on the plan board.
  pub fn next(self) -> Self {
    match self {
      Self::Todo => Self::Doing,
      Self::Doing | Self::Done => Self::Done,
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub id: i64,
  pub title: String,
  #[serde(default)]
  pub notes: Option<String>,
  #[serde(default)]
  pub due_ts: Option<String>,
  #[serde(default)]
  pub status: TaskStatus,
  #[serde(default)]
  pub priority: i32,
  #[serde(default)]
  pub project_id: Option<i64>,
  #[serde(default)]
  pub tags: Option<String>,
}

impl Task {
  pub fn is_high_priority(&self) -> bool {
    self.priority >= 4
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
  pub title: String,
  pub status: TaskStatus,
  pub priority: i32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_ts: Option<String>,
}

/// Body of a delete acknowledgement (`{"status": "deleted"}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Deleted {
  pub status: String,
}

// ============================================================================
// Calendar
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
  pub id: i64,
  #[serde(default)]
  pub calendar_id: Option<i64>,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  pub start_ts: String,
  #[serde(default)]
  pub end_ts: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default)]
  pub all_day: bool,
}

// ============================================================================
// Habits
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub target: Option<i64>,
  #[serde(default)]
  pub unit: Option<String>,
  #[serde(default = "default_true")]
  pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewHabitLog {
  pub date: String,
  pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitLog {
  pub id: i64,
  pub habit_id: i64,
  pub date: String,
  pub value: i64,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
  pub id: i64,
  pub name: String,
  /// Absent on some legacy rows; such meals never count toward a day.
  #[serde(default)]
  pub dt: Option<String>,
  #[serde(default)]
  pub calories: i64,
  #[serde(default)]
  pub protein_g: i64,
  #[serde(default)]
  pub carbs_g: i64,
  #[serde(default)]
  pub fat_g: i64,
  #[serde(default)]
  pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMeal {
  pub name: String,
  pub dt: String,
  pub calories: i64,
  pub protein_g: i64,
  pub carbs_g: i64,
  pub fat_g: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepLog {
  pub id: i64,
  pub date: String,
  pub duration_min: i64,
  #[serde(default)]
  pub quality: i64,
}

// ============================================================================
// Bible
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiblePlan {
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub plan_json: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibleReading {
  pub id: i64,
  #[serde(default)]
  pub plan_id: Option<i64>,
  pub dt: String,
  pub book: String,
  pub chapter: i64,
  #[serde(default)]
  pub verse_start: Option<i64>,
  #[serde(default)]
  pub verse_end: Option<i64>,
}

impl BibleReading {
  /// "John 3:1-21" style reference.
  pub fn reference(&self) -> String {
    match (self.verse_start, self.verse_end) {
      (Some(start), Some(end)) if end != start => {
        format!("{} {}:{}-{}", self.book, self.chapter, start, end)
      }
      (Some(start), _) => format!("{} {}:{}", self.book, self.chapter, start),
      _ => format!("{} {}", self.book, self.chapter),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReflection {
  pub dt: String,
  pub passage_ref: String,
  pub reflection_md: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
  pub id: i64,
  pub dt: String,
  pub passage_ref: String,
  pub reflection_md: String,
  #[serde(default)]
  pub tags: Option<String>,
}

// ============================================================================
// Settings & profile
// ============================================================================

/// Per-user settings singleton. Also the body of an update: unset fields are
/// left out so the backend keeps its current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ollama_model: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ollama_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub theme: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_day_of_week: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub privacy_lock: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
  #[serde(default)]
  pub id: Option<i64>,
  #[serde(default)]
  pub profile_json: Value,
  #[serde(default)]
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileUpdate {
  pub profile_json: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
  pub id: i64,
  pub question: String,
  pub answer: String,
  #[serde(default)]
  pub confidence: i64,
  #[serde(default)]
  pub context_tag: Option<String>,
  #[serde(default)]
  pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMemoryEvent {
  pub question: String,
  pub answer: String,
  pub confidence: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub context_tag: Option<String>,
}

// ============================================================================
// Relationships
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub birthday: Option<String>,
  #[serde(default)]
  pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewContact {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

/// Desired contact cadence for one contact (1:1 by `contact_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurtureCycle {
  pub id: i64,
  pub contact_id: i64,
  #[serde(default = "default_tie_strength")]
  pub tie_strength: String,
  pub cadence_days: i64,
  #[serde(default)]
  pub last_contact_dt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNurtureCycle {
  pub contact_id: i64,
  pub tie_strength: String,
  pub cadence_days: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_contact_dt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NurtureCyclePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tie_strength: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cadence_days: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_contact_dt: Option<String>,
}

// ============================================================================
// Skin
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinProduct {
  pub id: i64,
  pub name: String,
  /// cleanser, treat, moisturizer, spf, other
  pub step: String,
  #[serde(default)]
  pub active_json: Option<Value>,
  #[serde(default)]
  pub opened_at: Option<String>,
  /// Period after opening, in months
  #[serde(default)]
  pub pao_months: Option<u32>,
  #[serde(default)]
  pub notes: Option<String>,
  #[serde(default = "default_true")]
  pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSkinProduct {
  pub name: String,
  pub step: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub active_json: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub opened_at: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pao_months: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  pub is_active: bool,
}

impl From<&SkinProduct> for NewSkinProduct {
  fn from(p: &SkinProduct) -> Self {
    Self {
      name: p.name.clone(),
      step: p.step.clone(),
      active_json: p.active_json.clone(),
      opened_at: p.opened_at.clone(),
      pao_months: p.pao_months,
      notes: p.notes.clone(),
      is_active: p.is_active,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinRoutine {
  pub id: i64,
  pub name: String,
  /// AM or PM
  pub time_of_day: String,
  #[serde(default)]
  pub steps_json: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinLog {
  pub id: i64,
  pub dt: String,
  #[serde(default)]
  pub irritation: i64,
  #[serde(default)]
  pub dryness: i64,
  #[serde(default)]
  pub oiliness: i64,
  #[serde(default)]
  pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSkinLog {
  pub dt: String,
  pub irritation: i64,
  pub dryness: i64,
  pub oiliness: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

fn default_true() -> bool {
  true
}

fn default_tie_strength() -> String {
  "medium".to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_task_status_advances() {
    assert_eq!(TaskStatus::Todo.next(), TaskStatus::Doing);
    assert_eq!(TaskStatus::Doing.next(), TaskStatus::Done);
    assert_eq!(TaskStatus::Done.next(), TaskStatus::Done);
  }

  #[test]
  fn test_task_deserializes_backend_shape() {
    let task: Task = serde_json::from_value(json!({
      "id": 7,
      "user_id": 1,
      "title": "Call the plumber",
      "notes": null,
      "due_ts": "2026-10-18T09:00:00",
      "status": "doing",
      "priority": 4,
      "project_id": null,
      "tags": null,
      "created_at": "2026-10-01T12:00:00"
    }))
    .unwrap();
    assert_eq!(task.status, TaskStatus::Doing);
    assert!(task.is_high_priority());
  }

  #[test]
  fn test_settings_update_omits_unset_fields() {
    let update = Settings {
      theme: Some("dark".to_string()),
      ..Settings::default()
    };
    assert_eq!(serde_json::to_value(&update).unwrap(), json!({"theme": "dark"}));
  }

  #[test]
  fn test_reading_reference() {
    let reading = BibleReading {
      id: 1,
      plan_id: None,
      dt: "2026-10-17T07:00:00".to_string(),
      book: "John".to_string(),
      chapter: 3,
      verse_start: Some(1),
      verse_end: Some(21),
    };
    assert_eq!(reading.reference(), "John 3:1-21");
  }

  #[test]
  fn test_nurture_cycle_defaults_tie_strength() {
    let cycle: NurtureCycle = serde_json::from_value(json!({
      "id": 1, "contact_id": 2, "cadence_days": 14
    }))
    .unwrap();
    assert_eq!(cycle.tie_strength, "medium");
    assert_eq!(cycle.last_contact_dt, None);
  }
}
