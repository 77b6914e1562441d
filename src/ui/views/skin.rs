use crate::cache::Collection;
use crate::derive::{active_products, product_expiry};
use crate::gateway::recipes::{plan_item_label, SkinCoachAdvice};
use crate::gateway::types::{NewSkinLog, NewSkinProduct, SkinLog, SkinProduct, SkinRoutine};
use crate::gateway::ListFilter;
use crate::query::{Action, Query};
use crate::ui::components::{KeyResult, Notice, Picker, PickerEvent, Prompt, PromptEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{short_date, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  cached_query, list_title, panel, placeholder, render_placeholder, PendingWrite, ViewContext,
};
use chrono::{Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph, Wrap};

const RECENT_LOGS: usize = 7;
const STEPS: [(&str, &str); 5] = [
  ("cleanser", "Cleanser"),
  ("treat", "Treatment"),
  ("moisturizer", "Moisturizer"),
  ("spf", "SPF"),
  ("other", "Other"),
];

/// "irritation, dryness, oiliness, notes", levels 0-10. Blank levels are 0.
fn parse_skin_log(input: &str, today: NaiveDate) -> Result<NewSkinLog, String> {
  let parts: Vec<&str> = input.splitn(4, ',').map(str::trim).collect();
  let mut levels = [0i64; 3];
  for (i, label) in ["irritation", "dryness", "oiliness"].iter().enumerate() {
    let Some(part) = parts.get(i).filter(|p| !p.is_empty()) else {
      continue;
    };
    levels[i] = match part.parse::<i64>() {
      Ok(level) if (0..=10).contains(&level) => level,
      _ => return Err(format!("{} must be 0-10, got '{}'", label, part)),
    };
  }
  Ok(NewSkinLog {
    dt: today.format("%Y-%m-%d").to_string(),
    irritation: levels[0],
    dryness: levels[1],
    oiliness: levels[2],
    notes: parts.get(3).filter(|n| !n.is_empty()).map(|n| n.to_string()),
  })
}

/// Active products with expiry dates, routines, recent logs and the skin coach.
pub struct SkinView {
  ctx: ViewContext,
  products: Query<Vec<SkinProduct>>,
  routines: Query<Vec<SkinRoutine>>,
  logs: Query<Vec<SkinLog>>,
  list_state: ListState,
  coach: Option<SkinCoachAdvice>,
  coach_request: Action<SkinCoachAdvice>,
  product_name: Prompt,
  step_picker: Picker<&'static str>,
  pending_name: Option<String>,
  new_log: Prompt,
  write: PendingWrite,
  invalid_input: Option<String>,
}

impl SkinView {
  pub fn new(ctx: ViewContext) -> Self {
    let products = cached_query(&ctx, Collection::SkinProducts, |store| async move {
      store.skin_products().await
    });
    let routines = cached_query(&ctx, Collection::SkinRoutines, |store| async move {
      store.skin_routines().await
    });
    let logs = cached_query(&ctx, Collection::SkinLogs, |store| async move {
      store.skin_logs(&ListFilter::none()).await
    });

    Self {
      ctx,
      products,
      routines,
      logs,
      list_state: ListState::default(),
      coach: None,
      coach_request: Action::new(),
      product_name: Prompt::new(),
      step_picker: Picker::new(),
      pending_name: None,
      new_log: Prompt::new(),
      write: PendingWrite::new(),
      invalid_input: None,
    }
  }

  fn active(&self) -> Vec<&SkinProduct> {
    active_products(self.products.data().map(|v| v.as_slice()).unwrap_or(&[]))
  }

  fn selected_product(&self) -> Option<&SkinProduct> {
    self
      .list_state
      .selected()
      .and_then(|i| self.active().get(i).copied())
  }

  fn request_coaching(&mut self) {
    let gateway = self.ctx.gateway();
    self
      .coach_request
      .run(async move { gateway.skin_coach().await.map_err(|e| e.to_string()) });
  }

  fn deactivate_selected(&mut self) {
    let Some(product) = self.selected_product() else {
      return;
    };
    let id = product.id;
    let update = NewSkinProduct {
      is_active: false,
      ..NewSkinProduct::from(product)
    };
    let store = self.ctx.store.clone();
    self.write.start("retire product", async move {
      store.update_skin_product(id, &update).await?;
      Ok(None)
    });
  }

  fn add_product(&mut self, name: String, step: &str) {
    let product = NewSkinProduct {
      name,
      step: step.to_string(),
      active_json: None,
      opened_at: Some(Local::now().date_naive().format("%Y-%m-%d").to_string()),
      pao_months: None,
      notes: None,
      is_active: true,
    };
    let store = self.ctx.store.clone();
    self.write.start("add product", async move {
      store.create_skin_product(&product).await?;
      Ok(None)
    });
  }

  fn add_log(&mut self, input: &str) {
    let log = match parse_skin_log(input, Local::now().date_naive()) {
      Ok(log) => log,
      Err(e) => {
        self.invalid_input = Some(e);
        return;
      }
    };
    let store = self.ctx.store.clone();
    self.write.start("log skin entry", async move {
      store.create_skin_log(&log).await?;
      Ok(None)
    });
  }

  fn render_products(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.active().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = panel(
      match (self.products.error(), self.products.data()) {
        (None, Some(_)) => format!(" Active products ({}) ", len),
        _ => list_title("Active products", &self.products),
      },
      Color::Blue,
    );
    let empty = if self.products.data().is_some_and(|p| !p.is_empty()) && len == 0 {
      Some(Line::styled(
        "No active products. Press p to add one.",
        Style::default().fg(Color::DarkGray),
      ))
    } else {
      placeholder(&self.products, "No active products. Press p to add one.")
    };
    if let Some(line) = empty {
      render_placeholder(frame, area, block, line);
      return;
    }

    let today = Local::now().date_naive();
    let items: Vec<ListItem> = self
      .active()
      .iter()
      .map(|product| {
        let mut spans = vec![
          Span::raw(format!("{:<28}", truncate(&product.name, 26))),
          Span::styled(
            format!("{:<12}", product.step),
            Style::default().fg(Color::Magenta),
          ),
        ];
        if let Some(expiry) = product_expiry(product) {
          let color = if expiry < today { Color::Red } else { Color::Gray };
          spans.push(Span::styled(
            format!("expires {}", expiry.format("%Y-%m-%d")),
            Style::default().fg(color),
          ));
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

  fn render_logs(&self, frame: &mut Frame, area: Rect) {
    let block = panel(" Recent logs ".to_string(), Color::Blue);
    if let Some(line) = placeholder(&self.logs, "No logs yet. Press l to log today.") {
      render_placeholder(frame, area, block, line);
      return;
    }
    let items: Vec<ListItem> = self
      .logs
      .data()
      .map(|v| v.as_slice())
      .unwrap_or(&[])
      .iter()
      .take(RECENT_LOGS)
      .map(|log| {
        let mut spans = vec![Span::styled(
          format!("{:<12}", short_date(&log.dt)),
          Style::default().fg(Color::DarkGray),
        )];
        for (label, level, color) in [
          ("Irritation", log.irritation, Color::Red),
          ("Dryness", log.dryness, Color::Yellow),
          ("Oil", log.oiliness, Color::Blue),
        ] {
          if level > 0 {
            spans.push(Span::styled(
              format!("{}: {}  ", label, level),
              Style::default().fg(color),
            ));
          }
        }
        if let Some(notes) = &log.notes {
          spans.push(Span::styled(
            truncate(notes, 30),
            Style::default().fg(Color::Gray),
          ));
        }
        ListItem::new(Line::from(spans))
      })
      .collect();
    frame.render_widget(List::new(items).block(block), area);
  }

  fn render_routines(&self, frame: &mut Frame, area: Rect) {
    let block = panel(list_title("Routines", &self.routines), Color::Blue);
    if let Some(line) = placeholder(&self.routines, "No routines set up yet.") {
      render_placeholder(frame, area, block, line);
      return;
    }
    let items: Vec<ListItem> = self
      .routines
      .data()
      .map(|v| v.as_slice())
      .unwrap_or(&[])
      .iter()
      .map(|routine| {
        let steps = routine.steps_json.as_array().map(|s| s.len()).unwrap_or(0);
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<4}", routine.time_of_day),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(format!("{:<24}", truncate(&routine.name, 22))),
          Span::styled(
            format!("{} steps", steps),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();
    frame.render_widget(List::new(items).block(block), area);
  }

  fn render_coach(&self, frame: &mut Frame, area: Rect) {
    let block = panel(" Skin coach ".to_string(), Color::Magenta);
    let mut lines = Vec::new();
    if self.coach_request.is_pending() {
      lines.push(Line::styled("Analyzing...", Style::default().fg(Color::DarkGray)));
    } else if let Some(advice) = &self.coach {
      if let Some(concern) = &advice.concern {
        lines.push(Line::styled(
          format!("Concern: {}", concern),
          Style::default().fg(Color::Yellow),
        ));
      }
      let headline = advice.headline();
      if !headline.is_empty() {
        lines.push(Line::raw(headline.to_string()));
      }
      for step in &advice.routine {
        lines.push(Line::styled(
          format!("  • {}", plan_item_label(step)),
          Style::default().fg(Color::Gray),
        ));
      }
      if lines.is_empty() {
        lines.push(Line::styled(
          "No advice today.",
          Style::default().fg(Color::DarkGray),
        ));
      }
    } else {
      lines.push(Line::from(vec![
        Span::styled("<c>", Style::default().fg(Color::Cyan)),
        Span::styled(" Get skin coach advice", Style::default().fg(Color::Gray)),
      ]));
    }
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }
}

impl View for SkinView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.product_name.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(name)) => {
        self.pending_name = Some(name);
        let options = STEPS
          .iter()
          .map(|(value, label)| (*value, label.to_string()))
          .collect();
        self.step_picker.show("Step", options, None);
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match self.step_picker.handle_key(key) {
      KeyResult::Event(PickerEvent::Selected(step)) => {
        if let Some(name) = self.pending_name.take() {
          self.add_product(name, step);
        }
        return ViewAction::None;
      }
      KeyResult::Event(PickerEvent::Cancelled) => {
        self.pending_name = None;
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      KeyResult::Handled => return ViewAction::None,
    }

    match self.new_log.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(input)) => {
        self.add_log(&input);
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('c') => self.request_coaching(),
      KeyCode::Char('x') => self.deactivate_selected(),
      KeyCode::Char('p') => self.product_name.open("Add product", Some("product name")),
      KeyCode::Char('l') => self.new_log.open(
        "Log skin",
        Some("irritation, dryness, oiliness (0-10), notes"),
      ),
      KeyCode::Char('r') => self.ctx.refresh(&[
        Collection::SkinProducts,
        Collection::SkinRoutines,
        Collection::SkinLogs,
      ]),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let columns = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
      .split(area);
    let left = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(5), Constraint::Length(RECENT_LOGS as u16 + 2)])
      .split(columns[0]);
    let right = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(columns[1]);

    self.render_products(frame, left[0]);
    self.render_logs(frame, left[1]);
    self.render_coach(frame, right[0]);
    self.render_routines(frame, right[1]);

    self.product_name.render_overlay(frame, area);
    self.step_picker.render_overlay(frame, area);
    self.new_log.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Skin".to_string()
  }

  fn tick(&mut self) -> Option<Notice> {
    self.products.poll();
    self.routines.poll();
    self.logs.poll();

    if let Some(message) = self.invalid_input.take() {
      return Some(Notice::info("Invalid log entry", message));
    }
    let mut notice = self.write.poll();
    match self.coach_request.poll() {
      Some(Ok(advice)) => self.coach = Some(advice),
      Some(Err(e)) => {
        notice = Some(Notice::failed(
          "Skin coach",
          "Failed to get skin coach advice. Make sure Ollama is running.",
          &e,
        ))
      }
      None => {}
    }
    notice
  }

  fn is_editing(&self) -> bool {
    self.product_name.is_active() || self.step_picker.is_active() || self.new_log.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("c", "coach").with_priority(20),
      ShortcutInfo::new("l", "log").with_priority(30),
      ShortcutInfo::new("p", "add product").with_priority(40),
      ShortcutInfo::new("x", "retire").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(60),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ui::views::testing::{context, screen, settle};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
  }

  #[test]
  fn test_parse_skin_log() {
    let log = parse_skin_log("2, 0, 5, felt tight, after run", today()).unwrap();
    assert_eq!((log.irritation, log.dryness, log.oiliness), (2, 0, 5));
    assert_eq!(log.notes.as_deref(), Some("felt tight, after run"));
    assert_eq!(log.dt, "2026-10-17");
  }

  #[test]
  fn test_parse_skin_log_blank_levels_are_zero() {
    let log = parse_skin_log("", today()).unwrap();
    assert_eq!((log.irritation, log.dryness, log.oiliness), (0, 0, 0));
    assert_eq!(log.notes, None);
  }

  #[test]
  fn test_parse_skin_log_range() {
    assert!(parse_skin_log("11", today()).unwrap_err().contains("irritation"));
    assert!(parse_skin_log("1, x", today()).unwrap_err().contains("dryness"));
  }

  async fn mount(server: &MockServer) {
    Mock::given(method("GET"))
      .and(path("/skin/products"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": 1, "name": "Gentle cleanser", "step": "cleanser",
          "opened_at": "2026-01-10", "pao_months": 12, "is_active": true },
        { "id": 2, "name": "Old retinol", "step": "treat", "is_active": false }
      ])))
      .mount(server)
      .await;
    for list in ["/skin/routines", "/skin/logs"] {
      Mock::given(method("GET"))
        .and(path(list))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    }
  }

  #[tokio::test]
  async fn test_only_active_products_with_expiry() {
    let server = MockServer::start().await;
    mount(&server).await;
    let mut view = SkinView::new(context(&server.uri()));
    settle(&mut view, |v| v.products.is_success()).await;

    let text = screen(&mut view);
    assert!(text.contains("Active products (1)"));
    assert!(text.contains("Gentle cleanser"));
    assert!(text.contains("expires 2027-01-10"));
    assert!(!text.contains("Old retinol"));
  }

  #[tokio::test]
  async fn test_retire_sends_full_product_inactive() {
    let server = MockServer::start().await;
    mount(&server).await;
    Mock::given(method("PUT"))
      .and(path("/skin/products/1"))
      .and(body_partial_json(
        json!({ "name": "Gentle cleanser", "step": "cleanser", "is_active": false }),
      ))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": 1, "name": "Gentle cleanser", "step": "cleanser", "is_active": false
      })))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = SkinView::new(context(&server.uri()));
    settle(&mut view, |v| v.products.is_success()).await;
    screen(&mut view);
    view.handle_key(KeyEvent::from(KeyCode::Char('x')));
    settle(&mut view, |v| !v.write.is_pending()).await;
  }
}
