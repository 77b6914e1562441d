use crate::derive::ContactStatus;
use crate::gateway::types::TaskStatus;
use ratatui::prelude::Color;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a task status
pub fn status_color(status: TaskStatus) -> Color {
  match status {
    TaskStatus::Done => Color::Green,
    TaskStatus::Doing => Color::Yellow,
    TaskStatus::Todo => Color::White,
  }
}

pub fn contact_color(status: &ContactStatus) -> Color {
  match status {
    ContactStatus::Good { .. } => Color::Green,
    ContactStatus::DueSoon { .. } => Color::Yellow,
    ContactStatus::Overdue { .. } => Color::Red,
    ContactStatus::Unknown => Color::DarkGray,
  }
}

/// Date part of an ISO 8601 timestamp, for compact lists
pub fn short_date(ts: &str) -> &str {
  ts.get(..10).unwrap_or(ts)
}

/// `HH:MM` of an ISO 8601 date-time, empty for bare dates
pub fn short_time(ts: &str) -> &str {
  ts.get(11..16).unwrap_or("")
}
