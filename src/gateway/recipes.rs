//! Agent service request bodies and recipe replies.
//!
//! Recipes are free-form on the server side, so every reply field defaults
//! when missing. A reply that is not a JSON object at all still fails decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named recipes the dashboard knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipe {
  ChatAssistant,
  CodeAssistant,
  BibleReflector,
  MacroCoach,
  SkinCoach,
}

impl Recipe {
  pub fn name(self) -> &'static str {
    match self {
      Self::ChatAssistant => "chat_assistant",
      Self::CodeAssistant => "code_assistant",
      Self::BibleReflector => "bible_reflector",
      Self::MacroCoach => "macro_coach",
      Self::SkinCoach => "skin_coach",
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRequest {
  pub user_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeRequest<'a> {
  pub user_id: i64,
  pub params: &'a Value,
}

// ============================================================================
// Replies
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatReply {
  #[serde(default)]
  pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
  #[serde(default)]
  pub language: String,
  pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CodeReply {
  #[serde(default)]
  pub response: String,
  #[serde(default)]
  pub code_blocks: Vec<CodeBlock>,
  /// File tree listing, present for `list` operations
  #[serde(default)]
  pub structure: Option<String>,
  #[serde(default)]
  pub operation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NextBestStep {
  #[serde(default)]
  pub action: String,
  #[serde(default)]
  pub why: String,
  #[serde(default)]
  pub duration_min: Option<i64>,
  #[serde(default)]
  pub refs: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DigestHealth {
  #[serde(default)]
  pub macro_delta: String,
  #[serde(default)]
  pub workout_suggestion: String,
  #[serde(default)]
  pub sleep_note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DigestBible {
  #[serde(default)]
  pub next_passage: String,
  #[serde(default)]
  pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DailyDigest {
  #[serde(default)]
  pub plan: Vec<Value>,
  #[serde(default)]
  pub conflicts: Vec<Value>,
  #[serde(default)]
  pub blocks: Vec<Value>,
  #[serde(default)]
  pub health: Option<DigestHealth>,
  #[serde(default)]
  pub bible: Option<DigestBible>,
  #[serde(default)]
  pub journal_prompt: Option<String>,
  #[serde(default)]
  pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeeklyReview {
  #[serde(default)]
  pub wins: Vec<String>,
  #[serde(default)]
  pub improvements: Vec<String>,
  #[serde(default)]
  pub metrics: Value,
  #[serde(default)]
  pub goals_checkin: Vec<Value>,
  #[serde(default)]
  pub habit_notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BibleReflection {
  #[serde(default)]
  pub summary: String,
  #[serde(default)]
  pub three_questions: Vec<String>,
  #[serde(default)]
  pub prayer_points: Vec<String>,
  #[serde(default)]
  pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MacroEstimate {
  #[serde(default)]
  pub protein_g: f64,
  #[serde(default)]
  pub calories: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MealSuggestion {
  #[serde(default)]
  pub meal_name: String,
  #[serde(default)]
  pub recipe_hint: String,
  #[serde(default)]
  pub macro_estimate: MacroEstimate,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MacroCoachAdvice {
  #[serde(default)]
  pub protein_gap_g: f64,
  #[serde(default)]
  pub suggestions: Vec<MealSuggestion>,
  #[serde(default)]
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SkinCoachAdvice {
  #[serde(default)]
  pub suggestion: Option<String>,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub concern: Option<String>,
  #[serde(default)]
  pub routine: Vec<Value>,
  #[serde(default)]
  pub notes: Option<String>,
}

impl SkinCoachAdvice {
  /// Headline text: the suggestion, falling back to the message, then notes.
  pub fn headline(&self) -> &str {
    self
      .suggestion
      .as_deref()
      .or(self.message.as_deref())
      .or(self.notes.as_deref())
      .unwrap_or("")
  }
}

/// Render a digest plan item, which is either a string or an object with a
/// `title`/`action` field.
pub fn plan_item_label(item: &Value) -> String {
  if let Some(s) = item.as_str() {
    return s.to_string();
  }
  ["title", "action", "task", "name"]
    .iter()
    .find_map(|field| item.get(field).and_then(|v| v.as_str()))
    .map(String::from)
    .unwrap_or_else(|| item.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_digest_tolerates_partial_reply() {
    let digest: DailyDigest = serde_json::from_value(json!({
      "plan": [{"title": "Deep work"}],
      "journal_prompt": "What went well?"
    }))
    .unwrap();
    assert_eq!(digest.plan.len(), 1);
    assert!(digest.health.is_none());
    assert_eq!(digest.journal_prompt.as_deref(), Some("What went well?"));
  }

  #[test]
  fn test_plan_item_label() {
    assert_eq!(plan_item_label(&json!("Walk")), "Walk");
    assert_eq!(plan_item_label(&json!({"title": "Read"})), "Read");
    assert_eq!(plan_item_label(&json!({"action": "Rest"})), "Rest");
  }

  #[test]
  fn test_skin_headline_fallbacks() {
    let advice = SkinCoachAdvice {
      message: Some("Use SPF".to_string()),
      ..SkinCoachAdvice::default()
    };
    assert_eq!(advice.headline(), "Use SPF");
  }

  #[test]
  fn test_code_reply_with_blocks() {
    let reply: CodeReply = serde_json::from_value(json!({
      "response": "Here you go",
      "code_blocks": [{"language": "rust", "code": "fn main() {}"}],
      "files": {"src/main.rs": "..."},
      "operation": "read"
    }))
    .unwrap();
    assert_eq!(reply.code_blocks.len(), 1);
    assert_eq!(reply.code_blocks[0].language, "rust");
  }
}
