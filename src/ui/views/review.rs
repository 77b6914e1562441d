use crate::gateway::recipes::{plan_item_label, WeeklyReview};
use crate::query::Action;
use crate::ui::components::Notice;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{panel, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Wrap};
use serde_json::Value;

/// `label: value` lines for the review's metrics object.
fn metric_lines(metrics: &Value) -> Vec<String> {
  let Some(fields) = metrics.as_object() else {
    return Vec::new();
  };
  fields
    .iter()
    .map(|(key, value)| {
      let label = key.replace('_', " ");
      match value {
        Value::String(s) => format!("{}: {}", label, s),
        Value::Number(n) => match n.as_f64() {
          Some(f) if f.fract() != 0.0 => format!("{}: {:.1}", label, f),
          _ => format!("{}: {}", label, n),
        },
        other => format!("{}: {}", label, other),
      }
    })
    .collect()
}

fn bullets(items: &[String], color: Color) -> Vec<Line<'static>> {
  items
    .iter()
    .map(|item| Line::styled(format!("  • {}", item), Style::default().fg(color)))
    .collect()
}

/// Weekly review from the agent, requested as soon as the view opens.
pub struct ReviewView {
  ctx: ViewContext,
  review: Option<WeeklyReview>,
  request: Action<WeeklyReview>,
  scroll: u16,
}

impl ReviewView {
  pub fn new(ctx: ViewContext) -> Self {
    let mut view = Self {
      ctx,
      review: None,
      request: Action::new(),
      scroll: 0,
    };
    view.request_review();
    view
  }

  fn request_review(&mut self) {
    let gateway = self.ctx.gateway();
    self
      .request
      .run(async move { gateway.weekly_review().await.map_err(|e| e.to_string()) });
  }

  fn lines(&self, review: &WeeklyReview) -> Vec<Line<'static>> {
    let heading = |text: &'static str, color: Color| {
      Line::styled(text, Style::default().fg(color).add_modifier(Modifier::BOLD))
    };
    let mut lines = Vec::new();

    lines.push(heading("Wins", Color::Green));
    if review.wins.is_empty() {
      lines.push(Line::styled("  Keep going!", Style::default().fg(Color::DarkGray)));
    }
    lines.extend(bullets(&review.wins, Color::Reset));
    lines.push(Line::raw(""));

    if !review.improvements.is_empty() {
      lines.push(heading("To improve", Color::Yellow));
      lines.extend(bullets(&review.improvements, Color::Reset));
      lines.push(Line::raw(""));
    }

    if !review.habit_notes.is_empty() {
      lines.push(heading("Habits", Color::Cyan));
      lines.extend(bullets(&review.habit_notes, Color::Reset));
      lines.push(Line::raw(""));
    }

    let goals: Vec<String> = review.goals_checkin.iter().map(plan_item_label).collect();
    if !goals.is_empty() {
      lines.push(heading("Goals check-in", Color::Magenta));
      lines.extend(bullets(&goals, Color::Reset));
      lines.push(Line::raw(""));
    }

    let metrics = metric_lines(&review.metrics);
    if !metrics.is_empty() {
      lines.push(heading("Metrics", Color::Blue));
      lines.extend(bullets(&metrics, Color::Gray));
    }
    lines
  }
}

impl View for ReviewView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('r') => {
        self.scroll = 0;
        self.request_review();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = panel(" Weekly review ".to_string(), Color::Magenta);
    let lines = match (&self.review, self.request.is_pending()) {
      (_, true) => vec![Line::styled(
        "Reviewing your week...",
        Style::default().fg(Color::DarkGray),
      )],
      (Some(review), false) => self.lines(review),
      (None, false) => vec![Line::from(vec![
        Span::styled("<r>", Style::default().fg(Color::Cyan)),
        Span::styled(" Run the weekly review", Style::default().fg(Color::Gray)),
      ])],
    };
    frame.render_widget(
      Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((self.scroll, 0)),
      area,
    );
  }

  fn breadcrumb_label(&self) -> String {
    "Review".to_string()
  }

  fn tick(&mut self) -> Option<Notice> {
    match self.request.poll()? {
      Ok(review) => {
        self.review = Some(review);
        None
      }
      Err(e) => Some(Notice::failed(
        "Weekly review",
        "Failed to run weekly review. Make sure services are running.",
        &e,
      )),
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "rerun").with_priority(20),
      ShortcutInfo::new("j/k", "scroll").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(40),
    ]
  }
}
