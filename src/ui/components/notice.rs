use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
  Info,
  Error,
}

/// Blocking message drawn over the current view; any key dismisses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub kind: NoticeKind,
  pub title: String,
  pub message: String,
}

impl Notice {
  pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      kind: NoticeKind::Info,
      title: title.into(),
      message: message.into(),
    }
  }

  /// A failed request. The hint matches what a user can actually do about it.
  pub fn error(action: &str, error: &str) -> Self {
    Self {
      kind: NoticeKind::Error,
      title: format!("Failed to {}", action),
      message: format!(
        "{}\n\nCheck that the API and agent services are running, then press r to refresh.",
        error
      ),
    }
  }

  /// A failed request with a line on what to check first.
  pub fn failed(title: impl Into<String>, hint: &str, error: &str) -> Self {
    Self {
      kind: NoticeKind::Error,
      title: title.into(),
      message: format!("{}\n\n{}", hint, error),
    }
  }

  /// Rows needed to show the whole message wrapped at `text_width`, plus
  /// borders and padding. Saturates for very long bodies.
  fn height(&self, text_width: usize) -> u16 {
    let wrapped_lines: usize = self
      .message
      .lines()
      .map(|l| l.chars().count().max(1).div_ceil(text_width))
      .sum();
    u16::try_from(wrapped_lines)
      .unwrap_or(u16::MAX)
      .saturating_add(4)
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let color = match self.kind {
      NoticeKind::Info => Color::Cyan,
      NoticeKind::Error => Color::Red,
    };

    let width = (area.width * 60 / 100).clamp(30, 72).min(area.width);
    let height = self
      .height(width.saturating_sub(4).max(1) as usize)
      .min(area.height);

    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(color))
      .title(format!(" {} ", self.title))
      .title_bottom(Line::from(" any key to dismiss ").right_aligned());

    let paragraph = Paragraph::new(self.message.as_str())
      .block(block)
      .wrap(Wrap { trim: false })
      .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, overlay_area);
  }
}
