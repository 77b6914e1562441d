use crate::cache::Collection;
use crate::gateway::recipes::BibleReflection;
use crate::gateway::types::{BiblePlan, BibleReading, NewReflection};
use crate::gateway::ListFilter;
use crate::query::{Action, Query};
use crate::ui::components::{KeyResult, Notice, Prompt, PromptEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{short_date, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  cached_query, list_title, panel, placeholder, render_placeholder, PendingWrite, ViewContext,
};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph, Wrap};

const RECENT_READINGS: usize = 10;

/// Markdown body stored when a reflection is saved.
fn reflection_markdown(reflection: &BibleReflection) -> String {
  let mut md = String::new();
  if !reflection.summary.is_empty() {
    md.push_str("## Summary\n\n");
    md.push_str(&reflection.summary);
    md.push_str("\n\n");
  }
  if !reflection.three_questions.is_empty() {
    md.push_str("## Reflection Questions\n\n");
    for (i, question) in reflection.three_questions.iter().enumerate() {
      md.push_str(&format!("{}. {}\n", i + 1, question));
    }
    md.push('\n');
  }
  if !reflection.prayer_points.is_empty() {
    md.push_str("## Prayer Points\n\n");
    for point in &reflection.prayer_points {
      md.push_str(&format!("- {}\n", point));
    }
  }
  md.trim_end().to_string()
}

/// Reading plans, recent readings and the passage reflection generator.
pub struct BibleView {
  ctx: ViewContext,
  plans: Query<Vec<BiblePlan>>,
  readings: Query<Vec<BibleReading>>,
  list_state: ListState,
  passage_prompt: Prompt,
  /// Passage of the reflection in flight or on screen
  passage: Option<String>,
  reflection: Option<BibleReflection>,
  reflect_request: Action<BibleReflection>,
  write: PendingWrite,
}

impl BibleView {
  pub fn new(ctx: ViewContext) -> Self {
    let plans = cached_query(&ctx, Collection::BiblePlans, |store| async move {
      store.bible_plans().await
    });
    let readings = cached_query(&ctx, Collection::BibleReadings, |store| async move {
      store.bible_readings(&ListFilter::none()).await
    });

    Self {
      ctx,
      plans,
      readings,
      list_state: ListState::default(),
      passage_prompt: Prompt::new(),
      passage: None,
      reflection: None,
      reflect_request: Action::new(),
      write: PendingWrite::new(),
    }
  }

  fn recent_readings(&self) -> &[BibleReading] {
    let readings = self.readings.data().map(|v| v.as_slice()).unwrap_or(&[]);
    &readings[..readings.len().min(RECENT_READINGS)]
  }

  fn reflect(&mut self, passage: &str) {
    let gateway = self.ctx.gateway();
    let query = passage.to_string();
    if self.reflect_request.run(async move {
      gateway
        .reflect_on_passage(&query)
        .await
        .map_err(|e| e.to_string())
    }) {
      self.passage = Some(passage.to_string());
      self.reflection = None;
    }
  }

  fn reflect_on_selected(&mut self) {
    let reference = self
      .list_state
      .selected()
      .and_then(|i| self.recent_readings().get(i))
      .map(BibleReading::reference);
    if let Some(reference) = reference {
      self.reflect(&reference);
    }
  }

  fn save_reflection(&mut self) {
    let (Some(passage), Some(reflection)) = (&self.passage, &self.reflection) else {
      return;
    };
    let entry = NewReflection {
      dt: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
      passage_ref: passage.clone(),
      reflection_md: reflection_markdown(reflection),
      tags: None,
    };
    let store = self.ctx.store.clone();
    self.write.start("save reflection", async move {
      store.create_reflection(&entry).await?;
      Ok(Some("Reflection saved".to_string()))
    });
  }

  fn render_reflection(&self, frame: &mut Frame, area: Rect) {
    let title = match &self.passage {
      Some(passage) => format!(" Reflection: {} ", passage),
      None => " Reflection ".to_string(),
    };
    let block = panel(title, Color::Magenta);

    let mut lines = Vec::new();
    if self.reflect_request.is_pending() {
      lines.push(Line::styled("Generating...", Style::default().fg(Color::DarkGray)));
    } else if let Some(reflection) = &self.reflection {
      if !reflection.summary.is_empty() {
        lines.push(Line::styled("Summary", Style::default().add_modifier(Modifier::BOLD)));
        lines.push(Line::raw(reflection.summary.clone()));
        lines.push(Line::raw(""));
      }
      if !reflection.three_questions.is_empty() {
        lines.push(Line::styled(
          "Reflection Questions",
          Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
        for (i, question) in reflection.three_questions.iter().enumerate() {
          lines.push(Line::raw(format!("  {}. {}", i + 1, question)));
        }
        lines.push(Line::raw(""));
      }
      if !reflection.prayer_points.is_empty() {
        lines.push(Line::styled(
          "Prayer Points",
          Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
        for point in &reflection.prayer_points {
          lines.push(Line::raw(format!("  • {}", point)));
        }
      }
    } else {
      lines.push(Line::from(vec![
        Span::styled("<p>", Style::default().fg(Color::Cyan)),
        Span::styled(" Enter a passage  ", Style::default().fg(Color::Gray)),
        Span::styled("<Enter>", Style::default().fg(Color::Cyan)),
        Span::styled(" Reflect on the selected reading", Style::default().fg(Color::Gray)),
      ]));
    }
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }

  fn render_plans(&self, frame: &mut Frame, area: Rect) {
    let block = panel(list_title("Reading plans", &self.plans), Color::Blue);
    if let Some(line) = placeholder(&self.plans, "No reading plans") {
      render_placeholder(frame, area, block, line);
      return;
    }
    let items: Vec<ListItem> = self
      .plans
      .data()
      .map(|v| v.as_slice())
      .unwrap_or(&[])
      .iter()
      .map(|plan| ListItem::new(truncate(&plan.name, area.width.saturating_sub(4) as usize)))
      .collect();
    frame.render_widget(List::new(items).block(block), area);
  }

  fn render_readings(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.recent_readings().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = panel(list_title("Recent readings", &self.readings), Color::Blue);
    if let Some(line) = placeholder(&self.readings, "No readings logged") {
      render_placeholder(frame, area, block, line);
      return;
    }
    let items: Vec<ListItem> = self
      .recent_readings()
      .iter()
      .map(|reading| {
        ListItem::new(Line::from(vec![
          Span::raw(format!("{:<24}", reading.reference())),
          Span::styled(short_date(&reading.dt).to_string(), Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();
    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for BibleView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.passage_prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(passage)) => {
        self.reflect(&passage);
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Enter => self.reflect_on_selected(),
      KeyCode::Char('p') => self
        .passage_prompt
        .open("Passage", Some("e.g. John 3:1-21")),
      KeyCode::Char('s') => self.save_reflection(),
      KeyCode::Char('r') => self
        .ctx
        .refresh(&[Collection::BiblePlans, Collection::BibleReadings]),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
      .split(area);
    let lists = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
      .split(rows[1]);

    self.render_reflection(frame, rows[0]);
    self.render_plans(frame, lists[0]);
    self.render_readings(frame, lists[1]);

    self.passage_prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Bible".to_string()
  }

  fn tick(&mut self) -> Option<Notice> {
    self.plans.poll();
    self.readings.poll();

    let mut notice = self.write.poll();
    let failed = |e: &str| {
      Notice::failed(
        "Bible reflection",
        "Failed to generate reflection. Make sure services are running.",
        e,
      )
    };
    match self.reflect_request.poll() {
      Some(Ok(reflection)) => match &reflection.error {
        Some(e) => notice = Some(failed(e)),
        None => self.reflection = Some(reflection),
      },
      Some(Err(e)) => notice = Some(failed(&e)),
      None => {}
    }
    notice
  }

  fn is_editing(&self) -> bool {
    self.passage_prompt.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("p", "passage").with_priority(20),
      ShortcutInfo::new("enter", "reflect").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(60),
    ];
    if self.reflection.is_some() {
      shortcuts.push(ShortcutInfo::new("s", "save").with_priority(40));
    }
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ui::views::testing::{context, screen, settle};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn reflection() -> BibleReflection {
    BibleReflection {
      summary: "God so loved the world.".into(),
      three_questions: vec!["What is love?".into(), "Who is the world?".into()],
      prayer_points: vec!["Gratitude".into()],
      error: None,
    }
  }

  #[test]
  fn test_reflection_markdown() {
    let md = reflection_markdown(&reflection());
    assert!(md.starts_with("## Summary\n\nGod so loved the world."));
    assert!(md.contains("1. What is love?\n2. Who is the world?"));
    assert!(md.ends_with("## Prayer Points\n\n- Gratitude"));
  }

  #[test]
  fn test_reflection_markdown_skips_empty_sections() {
    let md = reflection_markdown(&BibleReflection {
      summary: "Short".into(),
      ..Default::default()
    });
    assert_eq!(md, "## Summary\n\nShort");
  }

  async fn mount_lists(server: &MockServer) {
    Mock::given(method("GET"))
      .and(path("/bible/plans"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .mount(server)
      .await;
    Mock::given(method("GET"))
      .and(path("/bible/readings"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": 1, "dt": "2026-10-16T07:00:00", "book": "John", "chapter": 3,
          "verse_start": 16, "verse_end": 17 }
      ])))
      .mount(server)
      .await;
  }

  #[tokio::test]
  async fn test_reflect_on_selected_reading_then_save() {
    let server = MockServer::start().await;
    mount_lists(&server).await;
    Mock::given(method("POST"))
      .and(path("/recipes/bible_reflector"))
      .and(body_partial_json(json!({ "params": { "passage": "John 3:16-17" } })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "summary": "God so loved the world.",
        "three_questions": ["What is love?"],
        "prayer_points": []
      })))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/bible/reflections"))
      .and(body_partial_json(json!({ "passage_ref": "John 3:16-17" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": 9, "dt": "2026-10-17T08:00:00", "passage_ref": "John 3:16-17",
        "reflection_md": "## Summary"
      })))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = BibleView::new(context(&server.uri()));
    settle(&mut view, |v| v.readings.is_success() && v.plans.is_success()).await;
    assert!(screen(&mut view).contains("No reading plans"));

    view.handle_key(KeyEvent::from(KeyCode::Enter));
    settle(&mut view, |v| v.reflection.is_some()).await;
    let text = screen(&mut view);
    assert!(text.contains("Reflection: John 3:16-17"));
    assert!(text.contains("1. What is love?"));

    view.handle_key(KeyEvent::from(KeyCode::Char('s')));
    let mut notice = None;
    for _ in 0..100 {
      notice = view.tick();
      if notice.is_some() {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(notice.unwrap().message, "Reflection saved");
  }

  #[tokio::test]
  async fn test_blank_passage_keeps_prompt_open() {
    let server = MockServer::start().await;
    mount_lists(&server).await;
    let mut view = BibleView::new(context(&server.uri()));

    view.handle_key(KeyEvent::from(KeyCode::Char('p')));
    view.handle_key(KeyEvent::from(KeyCode::Char(' ')));
    view.handle_key(KeyEvent::from(KeyCode::Enter));
    assert!(view.is_editing());
    assert!(!view.reflect_request.is_pending());
    assert!(view.passage.is_none());
  }
}
