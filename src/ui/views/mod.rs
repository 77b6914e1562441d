pub mod bible;
pub mod dashboard;
pub mod health;
pub mod plan;
pub mod relationships;
pub mod review;
pub mod settings;
pub mod skin;

pub use bible::BibleView;
pub use dashboard::DashboardView;
pub use health::HealthView;
pub use plan::PlanView;
pub use relationships::RelationshipsView;
pub use review::ReviewView;
pub use settings::SettingsView;
pub use skin::SkinView;

use std::future::Future;

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::warn;

use crate::cache::{CachedGateway, Collection};
use crate::config::MacroTargets;
use crate::gateway::Gateway;
use crate::query::{Action, Query, QueryState};
use crate::ui::components::Notice;

/// What every view is built with.
#[derive(Clone)]
pub struct ViewContext {
  pub store: CachedGateway,
  pub macro_targets: MacroTargets,
}

impl ViewContext {
  pub fn new(store: CachedGateway, macro_targets: MacroTargets) -> Self {
    Self {
      store,
      macro_targets,
    }
  }

  /// Uncached access for agent calls
  pub fn gateway(&self) -> Gateway {
    self.store.gateway().clone()
  }

  /// Mark collections stale; every query watching them refetches on its
  /// next poll, in this view and any other.
  pub fn refresh(&self, collections: &[Collection]) {
    for collection in collections {
      if let Err(e) = self.store.cache().invalidate_collection(*collection) {
        warn!(collection = collection.name(), error = %e, "refresh failed");
      }
    }
  }
}

/// A query reading one cached collection. Starts fetching immediately and
/// refetches whenever a write invalidates `collection`.
pub fn cached_query<T, F, Fut>(ctx: &ViewContext, collection: Collection, fetch: F) -> Query<T>
where
  T: Send + 'static,
  F: Fn(CachedGateway) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = color_eyre::Result<T>> + Send + 'static,
{
  let store = ctx.store.clone();
  let mut query = Query::new(move || {
    let pending = fetch(store.clone());
    async move { pending.await.map_err(|e| e.to_string()) }
  })
  .watching(ctx.store.cache().clone(), collection);
  query.fetch();
  query
}

/// Block title with the query's load state: ` Tasks (3) `, ` Tasks (loading...) `.
pub fn list_title<T>(name: &str, query: &Query<Vec<T>>) -> String {
  match (query.state(), query.data()) {
    (QueryState::Error(_), _) => format!(" {} (error) ", name),
    (_, Some(items)) => format!(" {} ({}) ", name, items.len()),
    (QueryState::Loading, None) => format!(" {} (loading...) ", name),
    _ => format!(" {} ", name),
  }
}

/// What to show in place of an empty list: the error, a loading line, or
/// `empty`. `None` when there is data to draw.
pub fn placeholder<T>(query: &Query<Vec<T>>, empty: &str) -> Option<Line<'static>> {
  if let Some(error) = query.error() {
    return Some(Line::styled(
      format!("{}. Press r to retry.", error),
      Style::default().fg(Color::Red),
    ));
  }
  match query.data() {
    Some(items) if !items.is_empty() => None,
    Some(_) => Some(Line::styled(
      empty.to_string(),
      Style::default().fg(Color::DarkGray),
    )),
    None => Some(Line::styled(
      "Loading...",
      Style::default().fg(Color::DarkGray),
    )),
  }
}

/// Standard bordered block for a view panel
pub fn panel(title: String, color: Color) -> Block<'static> {
  Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(color))
}

pub fn render_placeholder(frame: &mut Frame, area: Rect, block: Block, line: Line) {
  frame.render_widget(
    Paragraph::new(line).block(block).wrap(Wrap { trim: true }),
    area,
  );
}

/// One write at a time whose outcome becomes a notice.
///
/// The future resolves to an optional confirmation; failures are reported
/// as "Failed to <what>".
pub struct PendingWrite {
  action: Action<Option<String>>,
  what: &'static str,
}

impl PendingWrite {
  pub fn new() -> Self {
    Self {
      action: Action::new(),
      what: "",
    }
  }

  pub fn is_pending(&self) -> bool {
    self.action.is_pending()
  }

  /// Start a write unless one is already in flight.
  pub fn start<Fut>(&mut self, what: &'static str, write: Fut) -> bool
  where
    Fut: Future<Output = color_eyre::Result<Option<String>>> + Send + 'static,
  {
    if self.action.is_pending() {
      return false;
    }
    self.what = what;
    self
      .action
      .run(async move { write.await.map_err(|e| e.to_string()) })
  }

  pub fn poll(&mut self) -> Option<Notice> {
    match self.action.poll()? {
      Ok(Some(message)) => Some(Notice::info("Done", message)),
      Ok(None) => None,
      Err(e) => {
        warn!(what = self.what, error = %e, "write failed");
        Some(Notice::error(self.what, &e))
      }
    }
  }
}

impl Default for PendingWrite {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use ratatui::backend::TestBackend;
  use ratatui::Terminal;
  use std::time::Duration;
  use url::Url;

  use super::ViewContext;
  use crate::cache::{CacheLayer, CachedGateway};
  use crate::config::MacroTargets;
  use crate::gateway::Gateway;
  use crate::ui::view::View;

  pub fn context(uri: &str) -> ViewContext {
    let base = Url::parse(uri).unwrap();
    let gateway = Gateway::with_endpoints(base.clone(), base, 1);
    ViewContext::new(
      CachedGateway::new(gateway, CacheLayer::default()),
      MacroTargets::default(),
    )
  }

  /// Tick the view until `done` holds or about a second passes.
  pub async fn settle<V: View>(view: &mut V, done: impl Fn(&V) -> bool) {
    for _ in 0..100 {
      view.tick();
      if done(view) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
  }

  pub fn screen(view: &mut dyn View) -> String {
    let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
    terminal.draw(|f| view.render(f, f.area())).unwrap();
    terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|c| c.symbol())
      .collect()
  }
}
