use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by a prompt that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
  /// Enter pressed with non-blank text (trimmed)
  Submitted(String),
  Cancelled,
}

/// One-line text prompt drawn as an overlay: new task title, a meal, a note.
///
/// Views open it for a purpose and read the submitted text back; the prompt
/// itself doesn't know what the text is for.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
  input: TextInput,
  active: bool,
  title: String,
  hint: Option<String>,
}

impl Prompt {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if the prompt is currently shown
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Show the prompt with an empty input
  pub fn open(&mut self, title: impl Into<String>, hint: Option<&str>) {
    self.active = true;
    self.title = title.into();
    self.hint = hint.map(String::from);
    self.input.clear();
  }

  pub fn close(&mut self) {
    self.active = false;
    self.input.clear();
  }

  /// Handle a key event while active; inactive prompts take nothing.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(value) => {
        let value = value.trim().to_string();
        if value.is_empty() {
          // Nothing to submit; keep the prompt open
          return KeyResult::Handled;
        }
        self.close();
        KeyResult::Event(PromptEvent::Submitted(value))
      }
      InputResult::Cancelled => {
        self.close();
        KeyResult::Event(PromptEvent::Cancelled)
      }
      InputResult::Consumed => KeyResult::Handled,
      // Swallow everything else so the view underneath stays still
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Render the prompt overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 70).min(area.width);
    let height = if self.hint.is_some() { 4 } else { 3 };

    // Centered horizontally, near the top of the content area
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + 2.min(area.height.saturating_sub(height));

    let overlay_area = Rect::new(x, y, width, height.min(area.height));

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

    let mut lines = vec![self.input.to_line("> ", Color::Yellow)];
    if let Some(hint) = &self.hint {
      lines.push(Line::styled(
        hint.as_str(),
        Style::default().fg(Color::DarkGray),
      ));
    }
    frame.render_widget(Paragraph::new(lines), inner);
  }
}
