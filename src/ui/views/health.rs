use crate::cache::Collection;
use crate::derive::{daily_macros, MacroTotals};
use crate::gateway::recipes::MacroCoachAdvice;
use crate::gateway::types::{Meal, NewMeal, SleepLog};
use crate::gateway::ListFilter;
use crate::query::{Action, Query};
use crate::ui::components::{KeyResult, Notice, Prompt, PromptEvent};
use crate::ui::renderfns::{short_date, short_time, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  cached_query, list_title, panel, placeholder, render_placeholder, PendingWrite, ViewContext,
};
use chrono::{Local, NaiveDateTime};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Gauge, List, ListItem, Paragraph, Wrap};

const RECENT_MEALS: usize = 10;
const RECENT_SLEEP: usize = 7;

/// Parse "name, calories, protein, carbs, fat". Only the name is required;
/// missing numbers are zero.
fn parse_meal(input: &str, now: NaiveDateTime) -> Result<NewMeal, String> {
  let mut parts = input.split(',').map(str::trim);
  let name = parts.next().filter(|n| !n.is_empty()).ok_or("Meal needs a name")?;

  let mut numbers = [0i64; 4];
  for (slot, (part, label)) in numbers
    .iter_mut()
    .zip(parts.zip(["calories", "protein", "carbs", "fat"]))
  {
    if part.is_empty() {
      continue;
    }
    *slot = part
      .parse()
      .map_err(|_| format!("{} must be a whole number, got '{}'", label, part))?;
  }

  Ok(NewMeal {
    name: name.to_string(),
    dt: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
    calories: numbers[0],
    protein_g: numbers[1],
    carbs_g: numbers[2],
    fat_g: numbers[3],
    notes: None,
  })
}

/// Meals, sleep and today's macros against the configured targets.
pub struct HealthView {
  ctx: ViewContext,
  meals: Query<Vec<Meal>>,
  sleep: Query<Vec<SleepLog>>,
  coach: Option<MacroCoachAdvice>,
  coach_request: Action<MacroCoachAdvice>,
  new_meal: Prompt,
  write: PendingWrite,
  invalid_input: Option<String>,
}

impl HealthView {
  pub fn new(ctx: ViewContext) -> Self {
    let meals = cached_query(&ctx, Collection::Meals, |store| async move {
      store.meals(&ListFilter::none()).await
    });
    let sleep = cached_query(&ctx, Collection::Sleep, |store| async move {
      store.sleep_logs(&ListFilter::none()).await
    });

    Self {
      ctx,
      meals,
      sleep,
      coach: None,
      coach_request: Action::new(),
      new_meal: Prompt::new(),
      write: PendingWrite::new(),
      invalid_input: None,
    }
  }

  fn today(&self) -> MacroTotals {
    daily_macros(
      self.meals.data().map(|v| v.as_slice()).unwrap_or(&[]),
      Local::now().date_naive(),
    )
  }

  fn request_coaching(&mut self) {
    let gateway = self.ctx.gateway();
    let targets = self.ctx.macro_targets;
    self.coach_request.run(async move {
      gateway
        .macro_coach(targets.protein_g, targets.calories)
        .await
        .map_err(|e| e.to_string())
    });
  }

  fn add_meal(&mut self, input: &str) {
    let meal = match parse_meal(input, Local::now().naive_local()) {
      Ok(meal) => meal,
      Err(e) => {
        self.invalid_input = Some(e);
        return;
      }
    };
    let store = self.ctx.store.clone();
    self.write.start("log meal", async move {
      store.create_meal(&meal).await?;
      Ok(None)
    });
  }

  fn render_macros(&self, frame: &mut Frame, area: Rect) {
    let totals = self.today();
    let targets = self.ctx.macro_targets;
    let block = panel(" Today ".to_string(), Color::Green);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
      ])
      .split(inner);

    let ratio = |value: i64, target: i64| {
      if target <= 0 {
        0.0
      } else {
        (value as f64 / target as f64).clamp(0.0, 1.0)
      }
    };
    frame.render_widget(
      Gauge::default()
        .gauge_style(Style::default().fg(Color::Blue))
        .ratio(ratio(totals.calories, targets.calories))
        .label(format!("Calories {} / {} kcal", totals.calories, targets.calories)),
      rows[0],
    );
    frame.render_widget(
      Gauge::default()
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio(totals.protein, targets.protein_g))
        .label(format!("Protein {} / {} g", totals.protein, targets.protein_g)),
      rows[1],
    );
    frame.render_widget(
      Paragraph::new(format!("Carbs {} g   Fat {} g", totals.carbs, totals.fat))
        .style(Style::default().fg(Color::Gray)),
      rows[2],
    );
  }

  fn render_coach(&self, frame: &mut Frame, area: Rect) {
    let block = panel(" Macro coach ".to_string(), Color::Magenta);
    let mut lines = Vec::new();
    if self.coach_request.is_pending() {
      lines.push(Line::styled("Running...", Style::default().fg(Color::DarkGray)));
    } else if let Some(advice) = &self.coach {
      if advice.protein_gap_g > 0.0 {
        lines.push(Line::styled(
          format!("Protein gap: {}g", advice.protein_gap_g),
          Style::default().fg(Color::Yellow),
        ));
      }
      for suggestion in &advice.suggestions {
        lines.push(Line::styled(
          suggestion.meal_name.clone(),
          Style::default().fg(Color::White).bold(),
        ));
        if !suggestion.recipe_hint.is_empty() {
          lines.push(Line::styled(
            format!("  {}", suggestion.recipe_hint),
            Style::default().fg(Color::Gray),
          ));
        }
        lines.push(Line::styled(
          format!(
            "  Protein: {}g, Calories: {}",
            suggestion.macro_estimate.protein_g, suggestion.macro_estimate.calories
          ),
          Style::default().fg(Color::DarkGray),
        ));
      }
      for warning in &advice.warnings {
        lines.push(Line::styled(
          format!("! {}", warning),
          Style::default().fg(Color::Red),
        ));
      }
      if lines.is_empty() {
        lines.push(Line::raw("You're on track."));
      }
    } else {
      lines.push(Line::from(vec![
        Span::styled("<c>", Style::default().fg(Color::Cyan)),
        Span::styled(" Get macro coaching", Style::default().fg(Color::Gray)),
      ]));
    }
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }

  fn render_meals(&self, frame: &mut Frame, area: Rect) {
    let block = panel(list_title("Recent meals", &self.meals), Color::Blue);
    if let Some(line) = placeholder(&self.meals, "No meals logged. Press a to add one.") {
      render_placeholder(frame, area, block, line);
      return;
    }
    let items: Vec<ListItem> = self
      .meals
      .data()
      .map(|v| v.as_slice())
      .unwrap_or(&[])
      .iter()
      .take(RECENT_MEALS)
      .map(|meal| {
        let when = meal
          .dt
          .as_deref()
          .map(|dt| format!("{} {}", short_date(dt), short_time(dt)))
          .unwrap_or_default();
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<17}", when), Style::default().fg(Color::DarkGray)),
          Span::raw(format!("{:<28}", truncate(&meal.name, 26))),
          Span::styled(
            format!("{}kcal | {}g protein", meal.calories, meal.protein_g),
            Style::default().fg(Color::Gray),
          ),
        ]))
      })
      .collect();
    frame.render_widget(List::new(items).block(block), area);
  }

  fn render_sleep(&self, frame: &mut Frame, area: Rect) {
    let block = panel(list_title("Sleep", &self.sleep), Color::Blue);
    if let Some(line) = placeholder(&self.sleep, "No sleep logged.") {
      render_placeholder(frame, area, block, line);
      return;
    }
    let items: Vec<ListItem> = self
      .sleep
      .data()
      .map(|v| v.as_slice())
      .unwrap_or(&[])
      .iter()
      .take(RECENT_SLEEP)
      .map(|log| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<12}", short_date(&log.date)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(format!(
            "{:.1}h | Quality: {}/5",
            log.duration_min as f64 / 60.0,
            log.quality
          )),
        ]))
      })
      .collect();
    frame.render_widget(List::new(items).block(block), area);
  }
}

impl View for HealthView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.new_meal.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(input)) => {
        self.add_meal(&input);
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match key.code {
      KeyCode::Char('c') => self.request_coaching(),
      KeyCode::Char('a') => self.new_meal.open(
        "Log meal",
        Some("name, calories, protein, carbs, fat"),
      ),
      KeyCode::Char('r') => self.ctx.refresh(&[Collection::Meals, Collection::Sleep]),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let columns = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
      .split(area);
    let left = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(5), Constraint::Min(5)])
      .split(columns[0]);
    let right = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(6), Constraint::Length(RECENT_SLEEP as u16 + 2)])
      .split(columns[1]);

    self.render_macros(frame, left[0]);
    self.render_meals(frame, left[1]);
    self.render_coach(frame, right[0]);
    self.render_sleep(frame, right[1]);

    self.new_meal.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Health".to_string()
  }

  fn tick(&mut self) -> Option<Notice> {
    self.meals.poll();
    self.sleep.poll();

    if let Some(message) = self.invalid_input.take() {
      return Some(Notice::info("Invalid meal", message));
    }
    let mut notice = self.write.poll();
    match self.coach_request.poll() {
      Some(Ok(advice)) => self.coach = Some(advice),
      Some(Err(e)) => {
        notice = Some(Notice::failed(
          "Macro coach",
          "Failed to run macro coach. Make sure services are running.",
          &e,
        ))
      }
      None => {}
    }
    notice
  }

  fn is_editing(&self) -> bool {
    self.new_meal.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("a", "log meal").with_priority(20),
      ShortcutInfo::new("c", "coach").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(50),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ui::views::testing::{context, screen, settle};
  use chrono::NaiveDate;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 17)
      .unwrap()
      .and_hms_opt(12, 0, 0)
      .unwrap()
  }

  #[test]
  fn test_parse_meal_full() {
    let meal = parse_meal("Chicken bowl, 650, 45, 60, 20", noon()).unwrap();
    assert_eq!(meal.name, "Chicken bowl");
    assert_eq!(meal.calories, 650);
    assert_eq!(meal.protein_g, 45);
    assert_eq!(meal.fat_g, 20);
    assert_eq!(meal.dt, "2026-10-17T12:00:00");
  }

  #[test]
  fn test_parse_meal_name_only() {
    let meal = parse_meal("Apple", noon()).unwrap();
    assert_eq!(meal.calories, 0);
    assert_eq!(meal.protein_g, 0);
  }

  #[test]
  fn test_parse_meal_rejects_bad_numbers() {
    assert!(parse_meal(", 100", noon()).is_err());
    let err = parse_meal("Toast, lots", noon()).unwrap_err();
    assert!(err.contains("calories"));
  }

  #[tokio::test]
  async fn test_sleep_failure_leaves_meals_usable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/meals"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": 1, "name": "Oats", "dt": "2026-10-17T08:00:00", "calories": 350, "protein_g": 12 }
      ])))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/sleep"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;

    let mut view = HealthView::new(context(&server.uri()));
    settle(&mut view, |v| v.meals.is_success() && v.sleep.is_error()).await;

    let text = screen(&mut view);
    assert!(text.contains("Oats"));
    assert!(text.contains("Sleep (error)"));
    assert!(text.contains("503."));
  }

  #[tokio::test]
  async fn test_macro_coach_uses_configured_targets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/recipes/macro_coach"))
      .and(body_partial_json(
        json!({ "params": { "targets": { "protein_g": 150, "calories": 2500 } } }),
      ))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "protein_gap_g": 40,
        "suggestions": [{ "meal_name": "Greek yogurt", "recipe_hint": "Add berries",
                          "macro_estimate": { "protein_g": 20, "calories": 180 } }]
      })))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = HealthView::new(context(&server.uri()));
    view.handle_key(KeyEvent::from(KeyCode::Char('c')));
    settle(&mut view, |v| v.coach.is_some()).await;

    let advice = view.coach.as_ref().unwrap();
    assert_eq!(advice.suggestions[0].meal_name, "Greek yogurt");
    assert!(screen(&mut view).contains("Protein gap: 40g"));
  }
}
