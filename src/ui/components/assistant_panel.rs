use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::assistant::{Assistant, AssistantMode, PanelState, Role};
use crate::gateway::Gateway;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Floating assistant drawn over the bottom-right of whatever view is active.
///
/// In code mode, input starting with `@` selects or deselects a project file
/// instead of sending a message.
pub struct AssistantPanel {
  assistant: Assistant,
  input: TextInput,
  /// Lines scrolled up from the newest message
  scroll_back: u16,
}

impl AssistantPanel {
  pub fn new(gateway: Gateway) -> Self {
    Self {
      assistant: Assistant::new(gateway),
      input: TextInput::new(),
      scroll_back: 0,
    }
  }

  pub fn assistant(&self) -> &Assistant {
    &self.assistant
  }

  pub fn is_open(&self) -> bool {
    self.assistant.panel == PanelState::Open
  }

  /// Ctrl-A: a minimized panel comes back, otherwise open/close.
  pub fn on_shortcut(&mut self) {
    match self.assistant.panel {
      PanelState::Minimized => self.assistant.restore(),
      _ => self.assistant.toggle(),
    }
  }

  pub fn poll(&mut self) -> bool {
    let changed = self.assistant.poll();
    if changed {
      self.scroll_back = 0;
    }
    changed
  }

  /// Only an open panel takes keys.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<()> {
    if !self.is_open() {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Tab => {
        self.assistant.toggle_mode();
        return KeyResult::Handled;
      }
      KeyCode::Up | KeyCode::PageUp => {
        let step = if key.code == KeyCode::PageUp { 10 } else { 1 };
        self.scroll_back = self.scroll_back.saturating_add(step);
        return KeyResult::Handled;
      }
      KeyCode::Down | KeyCode::PageDown => {
        let step = if key.code == KeyCode::PageDown { 10 } else { 1 };
        self.scroll_back = self.scroll_back.saturating_sub(step);
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(text) => {
        self.submit(&text);
        KeyResult::Handled
      }
      InputResult::Cancelled => {
        self.assistant.minimize();
        KeyResult::Handled
      }
      InputResult::Consumed => KeyResult::Handled,
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  fn submit(&mut self, text: &str) {
    let text = text.trim();
    if text.is_empty() {
      return;
    }
    if self.assistant.mode == AssistantMode::Code {
      if let Some(path) = text.strip_prefix('@') {
        self.assistant.toggle_file(path);
        self.input.clear();
        return;
      }
    }
    if self.assistant.send(text) {
      self.input.clear();
      self.scroll_back = 0;
    }
  }

  fn transcript(&self) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for message in self.assistant.messages() {
      let (who, color) = match message.role {
        Role::User => ("you", Color::Yellow),
        Role::Assistant => ("assistant", Color::Cyan),
      };
      lines.push(Line::from(vec![
        Span::styled(who, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
          format!(" {}", message.timestamp.format("%H:%M")),
          Style::default().fg(Color::DarkGray),
        ),
      ]));
      if let Some(files) = message.files.as_ref().filter(|f| !f.is_empty()) {
        lines.push(Line::styled(
          format!("  files: {}", files.join(", ")),
          Style::default().fg(Color::DarkGray),
        ));
      }
      for text in message.content.lines() {
        lines.push(Line::raw(format!("  {}", text)));
      }
      for block in &message.code_blocks {
        lines.push(Line::styled(
          format!("  ```{}", block.language),
          Style::default().fg(Color::DarkGray),
        ));
        for code in block.code.lines() {
          lines.push(Line::styled(
            format!("  {}", code),
            Style::default().fg(Color::Green),
          ));
        }
      }
      lines.push(Line::raw(""));
    }
    if self.assistant.is_loading() {
      lines.push(Line::styled(
        "  thinking...",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
      ));
    }
    if lines.is_empty() {
      let hint = match self.assistant.mode {
        AssistantMode::Chat => "  Ask anything. Tab switches to code mode.",
        AssistantMode::Code => "  Ask about the project. @path selects a file.",
      };
      lines.push(Line::styled(hint, Style::default().fg(Color::DarkGray)));
    }
    lines
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    match self.assistant.panel {
      PanelState::Closed => {}
      PanelState::Minimized => self.render_badge(frame, area),
      PanelState::Open => self.render_open(frame, area),
    }
  }

  fn render_badge(&self, frame: &mut Frame, area: Rect) {
    let label = format!(" Assistant ({}) ", self.assistant.messages().len());
    let width = (label.chars().count() as u16 + 2).min(area.width);
    let height = 3.min(area.height);
    let badge = Rect::new(
      area.x + area.width.saturating_sub(width),
      area.y + area.height.saturating_sub(height),
      width,
      height,
    );
    frame.render_widget(Clear, badge);
    let dot = if self.assistant.is_loading() { "…" } else { "" };
    frame.render_widget(
      Paragraph::new(format!("{}{}", label.trim(), dot)).block(
        Block::default()
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Cyan)),
      ),
      badge,
    );
  }

  fn render_open(&self, frame: &mut Frame, area: Rect) {
    let width = (area.width / 2).clamp(40, 80).min(area.width);
    let height = (area.height * 70 / 100).max(10).min(area.height);
    let panel = Rect::new(
      area.x + area.width.saturating_sub(width),
      area.y + area.height.saturating_sub(height),
      width,
      height,
    );
    frame.render_widget(Clear, panel);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Cyan))
      .title(format!(" Assistant [{}] ", self.assistant.mode.label()))
      .title_bottom(Line::from(" Tab mode │ Esc minimize ").right_aligned());
    let inner = block.inner(panel);
    frame.render_widget(block, panel);

    let code = self.assistant.mode == AssistantMode::Code;
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(1),
        Constraint::Length(if code { 2 } else { 0 }),
        Constraint::Length(1),
      ])
      .split(inner);

    let transcript = self.transcript();
    let total = wrapped_height(&transcript, chunks[0].width);
    let bottom = total.saturating_sub(chunks[0].height);
    let offset = bottom.saturating_sub(self.scroll_back);
    frame.render_widget(
      Paragraph::new(transcript)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0)),
      chunks[0],
    );

    if code {
      let selected = if self.assistant.selected_files().is_empty() {
        "no files selected".to_string()
      } else {
        self.assistant.selected_files().join(", ")
      };
      let structure = match self.assistant.file_structure() {
        Some(s) => format!("{} entries in project", s.lines().count()),
        None => "loading project files...".to_string(),
      };
      frame.render_widget(
        Paragraph::new(vec![
          Line::styled(format!("@ {}", selected), Style::default().fg(Color::Magenta)),
          Line::styled(structure, Style::default().fg(Color::DarkGray)),
        ]),
        chunks[1],
      );
    }

    frame.render_widget(
      Paragraph::new(self.input.to_line("› ", Color::Cyan)),
      chunks[2],
    );
  }
}

/// Rows the lines take once wrapped to `width`.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
  let width = width.max(1) as usize;
  let rows: usize = lines
    .iter()
    .map(|line| line.width().max(1).div_ceil(width))
    .sum();
  rows.min(u16::MAX as usize) as u16
}
