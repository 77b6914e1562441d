use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use super::components::Notice;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Pop current view from stack (go back)
  Pop,
  /// Show a blocking notice over the view
  Notify(Notice),
}

/// Trait for view behavior
///
/// Views handle their own input modes (prompts, pickers) and return actions
/// for the App to execute. This creates a clean delegation chain:
/// App → View → Components
///
/// Views load data through `Query<T>` and write through `Action<T>`, and
/// poll both in `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to poll async work. A settled write may hand back
  /// a notice (confirmation or failure) for the App to show.
  fn tick(&mut self) -> Option<Notice> {
    None
  }

  /// Whether the view is capturing text input, so global keys like `:` and
  /// `q` must pass through to it
  fn is_editing(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  /// Override this to provide view-specific shortcuts
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

/// A view's shortcuts in header order.
pub fn visible_shortcuts(mut shortcuts: Vec<ShortcutInfo>) -> Vec<ShortcutInfo> {
  shortcuts.sort_by_key(|s| s.priority);
  shortcuts
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_visible_shortcuts_sorted() {
    let shortcuts = vec![
      ShortcutInfo::new("q", "back").with_priority(30),
      ShortcutInfo::new("x", "extra"),
      ShortcutInfo::new(":", "command").with_priority(10),
    ];
    assert_eq!(
      visible_shortcuts(shortcuts)
        .iter()
        .map(|s| s.key)
        .collect::<Vec<_>>(),
      vec![":", "q", "x"]
    );
  }
}
