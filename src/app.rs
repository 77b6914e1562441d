use crate::cache::{CacheLayer, CachedGateway};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::gateway::Gateway;
use crate::ui;
use crate::ui::components::{AssistantPanel, CommandEvent, CommandInput, KeyResult, Notice};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{
  BibleView, DashboardView, HealthView, PlanView, RelationshipsView, ReviewView, SettingsView,
  SkinView, ViewContext,
};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Command palette (after pressing :)
  command_input: CommandInput,

  /// Assistant overlay, shared by every view
  assistant: AssistantPanel,

  /// Blocking message; the next key dismisses it
  notice: Option<Notice>,

  /// What every view is built with
  ctx: ViewContext,

  title: String,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let gateway = Gateway::new(config)?;
    let cache = CacheLayer::from_config(config);
    let ctx = ViewContext::new(
      CachedGateway::new(gateway.clone(), cache),
      config.macro_targets,
    );

    Ok(Self {
      view_stack: vec![Box::new(DashboardView::new(ctx.clone()))],
      command_input: CommandInput::new(),
      assistant: AssistantPanel::new(gateway),
      notice: None,
      ctx,
      title: config.display_title(),
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);
    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    info!("started");
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }
    info!("quit");
    Ok(())
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut (dyn View + 'static)> {
    self.view_stack.last_mut().map(|v| v.as_mut())
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn assistant_panel(&self) -> &AssistantPanel {
    &self.assistant
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref()
  }

  pub fn is_busy(&self) -> bool {
    self.assistant.assistant().is_loading()
  }

  /// Poll every view's async work, not only the visible one, so writes
  /// started before navigating still report back.
  fn tick(&mut self) {
    self.assistant.poll();
    for view in self.view_stack.iter_mut() {
      if let Some(notice) = view.tick() {
        if self.notice.is_none() {
          self.notice = Some(notice);
        }
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    // Notice swallows the key that dismisses it
    if self.notice.take().is_some() {
      return;
    }

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if key.code == KeyCode::Char('a') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.assistant.on_shortcut();
      return;
    }

    if self.assistant.handle_key(key).consumed() {
      return;
    }

    let editing = self.current_view().is_some_and(|v| v.is_editing());
    if !editing {
      match self.command_input.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(command)) => {
          self.execute_command(&command);
          return;
        }
        KeyResult::NotHandled => {}
        _ => return,
      }
    }

    let action = match self.current_view_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Pop => {
        // The root view stays
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        }
      }
      ViewAction::Notify(notice) => self.notice = Some(notice),
    }
  }

  fn set_root(&mut self, view: Box<dyn View>) {
    self.view_stack.clear();
    self.view_stack.push(view);
  }

  fn execute_command(&mut self, command: &str) {
    debug!(command, "command");
    let ctx = self.ctx.clone();
    match command {
      "dashboard" => self.set_root(Box::new(DashboardView::new(ctx))),
      "plan" => self.set_root(Box::new(PlanView::new(ctx))),
      "health" => self.set_root(Box::new(HealthView::new(ctx))),
      "relationships" => self.set_root(Box::new(RelationshipsView::new(ctx))),
      "skin" => self.set_root(Box::new(SkinView::new(ctx))),
      "bible" => self.set_root(Box::new(BibleView::new(ctx))),
      "settings" => self.set_root(Box::new(SettingsView::new(ctx))),
      "review" => self.view_stack.push(Box::new(ReviewView::new(ctx))),
      "reload" => {
        // Every watching query refetches on its next tick
        if let Err(e) = self.ctx.store.cache().clear() {
          warn!(error = %e, "cache clear failed");
          self.notice = Some(Notice::error("reload", &e.to_string()));
        }
      }
      "quit" => self.should_quit = true,
      other => {
        self.notice = Some(Notice::info(
          "Unknown command",
          format!("No command named '{}'. Press : to see them all.", other),
        ))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ratatui::backend::TestBackend;
  use wiremock::matchers::method;
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn app() -> (App, MockServer) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
      .mount(&server)
      .await;
    let config = Config::default().with_overrides(Some(server.uri()), Some(server.uri()));
    (App::new(&config).unwrap(), server)
  }

  fn press(app: &mut App, code: KeyCode) {
    app.handle_key(KeyEvent::from(code));
  }

  fn command(app: &mut App, name: &str) {
    press(app, KeyCode::Char(':'));
    for c in name.chars() {
      press(app, KeyCode::Char(c));
    }
    press(app, KeyCode::Enter);
  }

  #[tokio::test]
  async fn test_view_commands_replace_root() {
    let (mut app, _server) = app().await;
    assert_eq!(app.breadcrumb(), vec!["Dashboard"]);

    command(&mut app, "plan");
    assert_eq!(app.breadcrumb(), vec!["Plan"]);

    command(&mut app, "contacts");
    assert_eq!(app.breadcrumb(), vec!["Relationships"]);
  }

  #[tokio::test]
  async fn test_review_pushes_and_root_is_never_popped() {
    let (mut app, _server) = app().await;
    command(&mut app, "health");
    command(&mut app, "review");
    assert_eq!(app.breadcrumb(), vec!["Health", "Review"]);

    press(&mut app, KeyCode::Char('q'));
    assert_eq!(app.breadcrumb(), vec!["Health"]);
    press(&mut app, KeyCode::Char('q'));
    assert_eq!(app.breadcrumb(), vec!["Health"]);
    assert!(!app.should_quit);
  }

  #[tokio::test]
  async fn test_unknown_command_notice_eats_next_key() {
    let (mut app, _server) = app().await;
    command(&mut app, "nope");
    let notice = app.notice().unwrap();
    assert_eq!(notice.title, "Unknown command");
    assert!(notice.message.contains("'nope'"));

    press(&mut app, KeyCode::Char(':'));
    assert!(app.notice().is_none());
    assert!(!app.command_input().is_active());
  }

  #[tokio::test]
  async fn test_open_assistant_takes_keys() {
    let (mut app, _server) = app().await;
    app.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL));
    assert!(app.assistant_panel().is_open());

    press(&mut app, KeyCode::Char(':'));
    assert!(!app.command_input().is_active());

    // Esc minimizes, then keys reach the palette again
    press(&mut app, KeyCode::Esc);
    assert!(!app.assistant_panel().is_open());
    press(&mut app, KeyCode::Char(':'));
    assert!(app.command_input().is_active());
  }

  #[tokio::test]
  async fn test_editing_view_keeps_colon_and_quit() {
    let (mut app, _server) = app().await;
    command(&mut app, "plan");
    press(&mut app, KeyCode::Char('n'));
    press(&mut app, KeyCode::Char(':'));
    press(&mut app, KeyCode::Char('q'));
    assert!(!app.command_input().is_active());
    assert!(!app.should_quit);
    assert_eq!(app.breadcrumb(), vec!["Plan"]);
  }

  #[tokio::test]
  async fn test_quit_and_ctrl_c() {
    let (mut app, _server) = app().await;
    command(&mut app, "quit");
    assert!(app.should_quit);

    let (mut app, _server) = self::app().await;
    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_draw_shows_title_and_breadcrumb() {
    let (mut app, _server) = app().await;
    let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
    terminal.draw(|frame| ui::draw(frame, &mut app)).unwrap();
    let text: String = terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|c| c.symbol())
      .collect();
    assert!(text.contains("lifeos"));
    assert!(text.contains("127.0.0.1"));
    assert!(text.contains("Dashboard"));
    assert!(text.contains("Ctrl-A assistant"));
  }
}
