use crate::cache::Collection;
use crate::derive::{daily_macros, greeting};
use crate::gateway::recipes::{plan_item_label, DailyDigest, NextBestStep};
use crate::gateway::types::{CalendarEvent, Meal, NewTask, Task, TaskStatus};
use crate::gateway::ListFilter;
use crate::query::{Action, Query};
use crate::ui::components::Notice;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{short_date, short_time, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  cached_query, list_title, panel, placeholder, render_placeholder, PendingWrite, ViewContext,
};
use chrono::{Local, Timelike};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph, Wrap};

const ACTIVE_TASK_LIMIT: usize = 5;

/// Today at a glance: greeting, next best step, active tasks, today's
/// events and the daily digest.
pub struct DashboardView {
  ctx: ViewContext,
  tasks: Query<Vec<Task>>,
  events: Query<Vec<CalendarEvent>>,
  meals: Query<Vec<Meal>>,
  next_step: Option<NextBestStep>,
  next_step_request: Action<NextBestStep>,
  digest: Option<DailyDigest>,
  digest_request: Action<DailyDigest>,
  write: PendingWrite,
  list_state: ListState,
}

impl DashboardView {
  pub fn new(ctx: ViewContext) -> Self {
    let tasks = cached_query(&ctx, Collection::Tasks, |store| async move {
      store.tasks(&ListFilter::status("todo")).await
    });
    let events = cached_query(&ctx, Collection::Events, |store| async move {
      store.events(&ListFilter::none()).await
    });
    let meals = cached_query(&ctx, Collection::Meals, |store| async move {
      store.meals(&ListFilter::none()).await
    });

    Self {
      ctx,
      tasks,
      events,
      meals,
      next_step: None,
      next_step_request: Action::new(),
      digest: None,
      digest_request: Action::new(),
      write: PendingWrite::new(),
      list_state: ListState::default(),
    }
  }

  fn active_tasks(&self) -> &[Task] {
    let tasks = self.tasks.data().map(|v| v.as_slice()).unwrap_or(&[]);
    &tasks[..tasks.len().min(ACTIVE_TASK_LIMIT)]
  }

  fn todays_events(&self) -> Vec<&CalendarEvent> {
    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
    self
      .events
      .data()
      .map(|events| {
        events
          .iter()
          .filter(|e| e.start_ts.starts_with(&today))
          .collect()
      })
      .unwrap_or_default()
  }

  fn selected_task(&self) -> Option<&Task> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.active_tasks().get(idx))
  }

  fn request_next_step(&mut self) {
    let gateway = self.ctx.gateway();
    self
      .next_step_request
      .run(async move { gateway.next_best_step().await.map_err(|e| e.to_string()) });
  }

  fn request_digest(&mut self) {
    let gateway = self.ctx.gateway();
    self
      .digest_request
      .run(async move { gateway.daily_digest().await.map_err(|e| e.to_string()) });
  }

  fn complete_selected(&mut self) {
    let Some(id) = self.selected_task().map(|t| t.id) else {
      return;
    };
    let store = self.ctx.store.clone();
    self.write.start("complete task", async move {
      store.update_task_status(id, TaskStatus::Done).await?;
      Ok(None)
    });
  }

  fn add_step_to_tasks(&mut self) {
    let Some(step) = &self.next_step else {
      return;
    };
    let task = NewTask {
      title: step.action.clone(),
      status: TaskStatus::Todo,
      priority: 5,
      notes: None,
      due_ts: None,
    };
    let store = self.ctx.store.clone();
    self.write.start("create task", async move {
      store.create_task(&task).await?;
      Ok(Some("Task created!".to_string()))
    });
  }

  fn render_greeting(&self, frame: &mut Frame, area: Rect) {
    let now = Local::now();
    let macros = daily_macros(
      self.meals.data().map(|v| v.as_slice()).unwrap_or(&[]),
      now.date_naive(),
    );
    let task_count = self.tasks.data().map(|t| t.len()).unwrap_or(0);

    let lines = vec![
      Line::from(vec![
        Span::styled(
          greeting(now.hour()),
          Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(
          format!("  {}", now.format("%A %-d %B")),
          Style::default().fg(Color::DarkGray),
        ),
      ]),
      Line::from(vec![
        Span::styled(format!("{} open tasks", task_count), Style::default().fg(Color::White)),
        Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
        Span::styled(
          format!("{} events today", self.todays_events().len()),
          Style::default().fg(Color::White),
        ),
        Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
        Span::styled(
          format!(
            "{} kcal · {}g protein today",
            macros.calories, macros.protein
          ),
          Style::default().fg(Color::White),
        ),
      ]),
    ];
    frame.render_widget(Paragraph::new(lines), area);
  }

  fn render_next_step(&self, frame: &mut Frame, area: Rect) {
    let block = panel(" Next best step ".to_string(), Color::Magenta);
    let lines = match (&self.next_step, self.next_step_request.is_pending()) {
      (_, true) => vec![Line::styled(
        "Thinking...",
        Style::default().fg(Color::DarkGray),
      )],
      (None, false) => vec![Line::from(vec![
        Span::styled("<n>", Style::default().fg(Color::Cyan)),
        Span::styled(" What should I do next?", Style::default().fg(Color::Gray)),
      ])],
      (Some(step), false) => {
        let mut lines = vec![Line::styled(
          step.action.clone(),
          Style::default().fg(Color::Magenta).bold(),
        )];
        if !step.why.is_empty() {
          lines.push(Line::styled(step.why.clone(), Style::default().fg(Color::Gray)));
        }
        let mut footer = Vec::new();
        if let Some(minutes) = step.duration_min {
          footer.push(Span::styled(
            format!("{} min   ", minutes),
            Style::default().fg(Color::Yellow),
          ));
        }
        footer.push(Span::styled("<a>", Style::default().fg(Color::Cyan)));
        footer.push(Span::styled(" add to tasks   ", Style::default().fg(Color::DarkGray)));
        footer.push(Span::styled("<x>", Style::default().fg(Color::Cyan)));
        footer.push(Span::styled(" dismiss", Style::default().fg(Color::DarkGray)));
        lines.push(Line::from(footer));
        lines
      }
    };
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }

  fn render_tasks(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.active_tasks().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = panel(list_title("Active tasks", &self.tasks), Color::Blue);
    if let Some(line) = placeholder(&self.tasks, "All complete.") {
      render_placeholder(frame, area, block, line);
      return;
    }

    let pending = self.write.is_pending();
    let items: Vec<ListItem> = self
      .active_tasks()
      .iter()
      .map(|task| {
        let mut spans = vec![
          Span::styled(
            if pending { "◌ " } else { "○ " },
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(truncate(&task.title, 48)),
        ];
        if let Some(due) = &task.due_ts {
          spans.push(Span::styled(
            format!("  {}", short_date(due)),
            Style::default().fg(Color::DarkGray),
          ));
        }
        if task.is_high_priority() {
          spans.push(Span::styled("  HIGH", Style::default().fg(Color::Red)));
        }
        ListItem::new(Line::from(spans))
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

  fn render_events(&self, frame: &mut Frame, area: Rect) {
    let block = panel(" Today's events ".to_string(), Color::Blue);
    if let Some(line) = placeholder(&self.events, "Nothing scheduled.") {
      render_placeholder(frame, area, block, line);
      return;
    }
    let events = self.todays_events();
    if events.is_empty() {
      render_placeholder(
        frame,
        area,
        block,
        Line::styled("No events today.", Style::default().fg(Color::DarkGray)),
      );
      return;
    }
    let items: Vec<ListItem> = events
      .iter()
      .map(|event| {
        let when = if event.all_day {
          "all day".to_string()
        } else {
          short_time(&event.start_ts).to_string()
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<8}", when), Style::default().fg(Color::Yellow)),
          Span::raw(truncate(&event.title, 40)),
        ]))
      })
      .collect();
    frame.render_widget(List::new(items).block(block), area);
  }

  fn render_digest(&self, frame: &mut Frame, area: Rect) {
    let block = panel(" Daily digest ".to_string(), Color::Green);
    let lines = if self.digest_request.is_pending() {
      vec![Line::styled(
        "Running daily digest...",
        Style::default().fg(Color::DarkGray),
      )]
    } else if let Some(digest) = &self.digest {
      digest_lines(digest)
    } else {
      vec![Line::from(vec![
        Span::styled("<g>", Style::default().fg(Color::Cyan)),
        Span::styled(" Run the daily digest", Style::default().fg(Color::Gray)),
      ])]
    };
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }
}

fn heading(text: &str) -> Line<'static> {
  Line::styled(text.to_string(), Style::default().fg(Color::Cyan).bold())
}

fn digest_lines(digest: &DailyDigest) -> Vec<Line<'static>> {
  let mut lines = Vec::new();
  if let Some(error) = &digest.error {
    lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
  }
  if !digest.plan.is_empty() {
    lines.push(heading("Priorities"));
    for item in &digest.plan {
      lines.push(Line::raw(format!("  • {}", plan_item_label(item))));
    }
  }
  if let Some(health) = &digest.health {
    let or = |s: &str, fallback: &str| {
      if s.is_empty() {
        fallback.to_string()
      } else {
        s.to_string()
      }
    };
    lines.push(heading("Health"));
    lines.push(Line::raw(format!("  Macros: {}", or(&health.macro_delta, "On track"))));
    lines.push(Line::raw(format!(
      "  Workout: {}",
      or(&health.workout_suggestion, "Rest day")
    )));
    lines.push(Line::raw(format!("  Sleep: {}", or(&health.sleep_note, "Good"))));
  }
  if let Some(bible) = digest.bible.as_ref().filter(|b| !b.next_passage.is_empty()) {
    lines.push(heading("Bible reading"));
    lines.push(Line::raw(format!("  {}", bible.next_passage)));
    if !bible.rationale.is_empty() {
      lines.push(Line::styled(
        format!("  {}", bible.rationale),
        Style::default().fg(Color::Gray),
      ));
    }
  }
  if let Some(prompt) = &digest.journal_prompt {
    lines.push(heading("Journal"));
    lines.push(Line::styled(
      format!("  {}", prompt),
      Style::default().add_modifier(Modifier::ITALIC),
    ));
  }
  if lines.is_empty() {
    lines.push(Line::styled(
      "The digest came back empty.",
      Style::default().fg(Color::DarkGray),
    ));
  }
  lines
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('c') | KeyCode::Enter => self.complete_selected(),
      KeyCode::Char('n') => self.request_next_step(),
      KeyCode::Char('a') => self.add_step_to_tasks(),
      KeyCode::Char('x') => self.next_step = None,
      KeyCode::Char('g') => self.request_digest(),
      KeyCode::Char('r') => self.ctx.refresh(&[
        Collection::Tasks,
        Collection::Events,
        Collection::Meals,
      ]),
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(3), // Greeting
        Constraint::Length(6), // Next best step
        Constraint::Min(7),    // Tasks + events
        Constraint::Length(if self.digest.is_some() { 14 } else { 3 }),
      ])
      .split(area);

    self.render_greeting(frame, rows[0].inner(Margin::new(1, 0)));
    self.render_next_step(frame, rows[1]);

    let middle = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
      .split(rows[2]);
    self.render_tasks(frame, middle[0]);
    self.render_events(frame, middle[1]);

    self.render_digest(frame, rows[3]);
  }

  fn breadcrumb_label(&self) -> String {
    "Dashboard".to_string()
  }

  fn tick(&mut self) -> Option<Notice> {
    self.tasks.poll();
    self.events.poll();
    self.meals.poll();

    let mut notice = self.write.poll();
    match self.next_step_request.poll() {
      Some(Ok(step)) => self.next_step = Some(step),
      Some(Err(e)) => notice = Some(Notice::error("get the next best step", &e)),
      None => {}
    }
    match self.digest_request.poll() {
      Some(Ok(digest)) => self.digest = Some(digest),
      Some(Err(e)) => {
        notice = Some(Notice::failed(
          "Daily digest",
          "Failed to run daily digest. Make sure Ollama is running.",
          &e,
        ))
      }
      None => {}
    }
    notice
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("n", "next step").with_priority(20),
      ShortcutInfo::new("g", "digest").with_priority(30),
      ShortcutInfo::new("c", "complete").with_priority(40),
      ShortcutInfo::new("r", "refresh").with_priority(50),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ui::views::testing::{context, screen, settle};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn mount_lists(server: &MockServer, tasks: serde_json::Value) {
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .and(query_param("status", "todo"))
      .respond_with(ResponseTemplate::new(200).set_body_json(tasks))
      .mount(server)
      .await;
    for list in ["/calendars/events", "/meals"] {
      Mock::given(method("GET"))
        .and(path(list))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    }
  }

  #[tokio::test]
  async fn test_failed_task_list_shows_error_without_panicking() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let mut view = DashboardView::new(context(&server.uri()));
    settle(&mut view, |v| v.tasks.is_error()).await;

    assert_eq!(view.tasks.error(), Some("request failed with status 500"));
    let text = screen(&mut view);
    assert!(text.contains("(error)"));
    assert!(text.contains("500."));
  }

  #[tokio::test]
  async fn test_complete_task_refetches_active_tasks() {
    let server = MockServer::start().await;
    mount_lists(
      &server,
      json!([{ "id": 7, "title": "Call the plumber", "status": "todo", "priority": 2 }]),
    )
    .await;
    Mock::given(method("PATCH"))
      .and(path("/tasks/7/status"))
      .and(query_param("status", "done"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!({ "id": 7, "title": "Call the plumber", "status": "done" })),
      )
      .expect(1)
      .mount(&server)
      .await;

    let mut view = DashboardView::new(context(&server.uri()));
    settle(&mut view, |v| v.tasks.is_success()).await;
    screen(&mut view); // selects the first task

    view.handle_key(KeyEvent::from(KeyCode::Char('c')));

    // The write invalidates tasks; the next ticks refetch the list
    let mut task_fetches = 0;
    for _ in 0..100 {
      view.tick();
      task_fetches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET" && r.url.path() == "/tasks")
        .count();
      if task_fetches == 2 {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(task_fetches, 2);
  }

  #[tokio::test]
  async fn test_add_step_creates_priority_five_todo() {
    let server = MockServer::start().await;
    mount_lists(&server, json!([])).await;
    Mock::given(method("POST"))
      .and(path("/tasks"))
      .and(body_partial_json(
        json!({ "title": "Stretch", "status": "todo", "priority": 5 }),
      ))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({ "id": 9, "title": "Stretch" })),
      )
      .expect(1)
      .mount(&server)
      .await;

    let mut view = DashboardView::new(context(&server.uri()));
    view.next_step = Some(NextBestStep {
      action: "Stretch".to_string(),
      ..NextBestStep::default()
    });
    view.handle_key(KeyEvent::from(KeyCode::Char('a')));

    let mut notice = None;
    for _ in 0..100 {
      if let Some(n) = view.tick() {
        notice = Some(n);
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(notice.map(|n| n.message), Some("Task created!".to_string()));
  }

  #[test]
  fn test_digest_fallbacks() {
    let digest: DailyDigest = serde_json::from_value(json!({
      "health": { "macro_delta": "", "workout_suggestion": "", "sleep_note": "" }
    }))
    .unwrap();
    let text: Vec<String> = digest_lines(&digest)
      .iter()
      .map(|l| l.to_string())
      .collect();
    assert!(text.contains(&"  Macros: On track".to_string()));
    assert!(text.contains(&"  Workout: Rest day".to_string()));
  }
}
