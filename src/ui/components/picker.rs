use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};

/// Events emitted by a picker that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent<T> {
  Selected(T),
  Cancelled,
}

/// Small centered list for choosing one option: a task status, a theme.
#[derive(Debug, Clone)]
pub struct Picker<T> {
  active: bool,
  options: Vec<(T, String)>,
  selected: usize,
  title: String,
}

impl<T> Default for Picker<T> {
  fn default() -> Self {
    Self {
      active: false,
      options: Vec::new(),
      selected: 0,
      title: String::new(),
    }
  }
}

impl<T: Clone> Picker<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if picker is currently active
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Show the picker with labelled options, preselecting `current` if given.
  pub fn show(&mut self, title: impl Into<String>, options: Vec<(T, String)>, current: Option<usize>) {
    self.active = true;
    self.selected = current.filter(|i| *i < options.len()).unwrap_or(0);
    self.options = options;
    self.title = title.into();
  }

  /// Hide the picker
  pub fn hide(&mut self) {
    self.active = false;
    self.options.clear();
    self.selected = 0;
  }

  /// Handle a key event
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PickerEvent<T>> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(PickerEvent::Cancelled)
      }
      KeyCode::Enter => {
        let choice = self.options.get(self.selected).map(|(value, _)| value.clone());
        self.hide();
        match choice {
          Some(value) => KeyResult::Event(PickerEvent::Selected(value)),
          None => KeyResult::Event(PickerEvent::Cancelled),
        }
      }
      KeyCode::Char('j') | KeyCode::Down => {
        if !self.options.is_empty() {
          self.selected = (self.selected + 1) % self.options.len();
        }
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up => {
        if !self.options.is_empty() {
          self.selected = if self.selected == 0 {
            self.options.len() - 1
          } else {
            self.selected - 1
          };
        }
        KeyResult::Handled
      }
      _ => KeyResult::Handled,
    }
  }

  /// Render the picker overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active || self.options.is_empty() {
      return;
    }

    // Calculate overlay dimensions
    let max_label_len = self
      .options
      .iter()
      .map(|(_, label)| label.chars().count())
      .max()
      .unwrap_or(10)
      .max(self.title.chars().count());
    let width = (max_label_len as u16 + 6)
      .max(20)
      .min(area.width.saturating_sub(4));
    let height = (self.options.len() as u16 + 2)
      .max(3)
      .min(area.height.saturating_sub(4));

    // Center the overlay
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;

    let overlay_area = Rect::new(x, y, width, height);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let items: Vec<ListItem> = self
      .options
      .iter()
      .map(|(_, label)| ListItem::new(Span::styled(label.as_str(), Style::default().fg(Color::Cyan))))
      .collect();

    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    state.select(Some(self.selected));

    frame.render_stateful_widget(list, inner, &mut state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn themes() -> Vec<(&'static str, String)> {
    ["system", "light", "dark"]
      .into_iter()
      .map(|t| (t, t.to_string()))
      .collect()
  }

  #[test]
  fn test_select_wraps_and_returns_value() {
    let mut picker = Picker::new();
    picker.show("Theme", themes(), Some(2));
    picker.handle_key(key(KeyCode::Down));
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PickerEvent::Selected("system"))
    );
    assert!(!picker.is_active());
  }

  #[test]
  fn test_up_from_top_wraps() {
    let mut picker = Picker::new();
    picker.show("Theme", themes(), None);
    picker.handle_key(key(KeyCode::Up));
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PickerEvent::Selected("dark"))
    );
  }

  #[test]
  fn test_cancel() {
    let mut picker: Picker<&str> = Picker::new();
    picker.show("Theme", themes(), None);
    assert_eq!(
      picker.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(PickerEvent::Cancelled)
    );
  }
}
