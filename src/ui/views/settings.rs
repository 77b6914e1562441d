use crate::cache::Collection;
use crate::gateway::types::{MemoryEvent, NewMemoryEvent, ProfileUpdate, Settings, UserProfile};
use crate::query::Query;
use crate::ui::components::{KeyResult, Notice, Picker, PickerEvent, Prompt, PromptEvent};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  cached_query, list_title, panel, placeholder, render_placeholder, PendingWrite, ViewContext,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, Paragraph};
use serde_json::Value;

const MODELS: [&str; 3] = ["llama3:8b", "mistral", "llama2"];
const THEMES: [(&str, &str); 3] = [("system", "System"), ("light", "Light"), ("dark", "Dark")];
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const MEMORY_CONFIDENCE: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Model,
  Theme,
}

/// What the open prompt is collecting.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
  OllamaUrl,
  ProfileField,
  Question,
  /// Answer to the question typed before it
  Answer(String),
}

/// Server settings with blanks filled by the defaults the form starts from.
fn with_defaults(settings: &Settings) -> Settings {
  Settings {
    ollama_model: settings
      .ollama_model
      .clone()
      .or_else(|| Some(MODELS[0].to_string())),
    ollama_url: settings
      .ollama_url
      .clone()
      .or_else(|| Some(DEFAULT_OLLAMA_URL.to_string())),
    theme: settings.theme.clone().or_else(|| Some("system".to_string())),
    first_day_of_week: Some(settings.first_day_of_week.unwrap_or(0)),
    privacy_lock: settings.privacy_lock,
  }
}

fn weekday_name(first_day_of_week: Option<i64>) -> &'static str {
  match first_day_of_week {
    Some(1) => "Monday",
    _ => "Sunday",
  }
}

/// `key: value` lines for the top level of the profile document.
fn profile_lines(profile: &Value) -> Vec<String> {
  match profile.as_object() {
    Some(fields) => fields
      .iter()
      .map(|(key, value)| match value {
        Value::String(s) => format!("{}: {}", key, s),
        other => format!("{}: {}", key, other),
      })
      .collect(),
    None => Vec::new(),
  }
}

/// `key: value` typed into the profile prompt.
fn parse_profile_field(input: &str) -> Option<(String, String)> {
  let (key, value) = input.split_once(':')?;
  let (key, value) = (key.trim(), value.trim());
  if key.is_empty() || value.is_empty() {
    return None;
  }
  Some((key.to_string(), value.to_string()))
}

/// The profile document with one top-level field set. A profile that is not
/// an object starts over as one.
fn with_profile_field(profile: &Value, key: String, value: String) -> Value {
  let mut fields = profile.as_object().cloned().unwrap_or_default();
  fields.insert(key, Value::String(value));
  Value::Object(fields)
}

/// Editable settings form, the profile document and what the assistant
/// remembers. Profile fields and memories are written one at a time.
pub struct SettingsView {
  ctx: ViewContext,
  settings: Query<Settings>,
  profile: Query<UserProfile>,
  memory: Query<Vec<MemoryEvent>>,
  /// Unsaved edits; seeded from the server copy on first load
  draft: Option<Settings>,
  picker: Picker<String>,
  picking: Option<Field>,
  prompt: Prompt,
  entry: Option<Entry>,
  write: PendingWrite,
}

impl SettingsView {
  pub fn new(ctx: ViewContext) -> Self {
    let settings = cached_query(&ctx, Collection::Settings, |store| async move {
      store.settings().await
    });
    let profile = cached_query(&ctx, Collection::Profile, |store| async move {
      store.profile().await
    });
    let memory = cached_query(&ctx, Collection::MemoryEvents, |store| async move {
      store.memory_events().await
    });

    Self {
      ctx,
      settings,
      profile,
      memory,
      draft: None,
      picker: Picker::new(),
      picking: None,
      prompt: Prompt::new(),
      entry: None,
      write: PendingWrite::new(),
    }
  }

  fn draft_mut(&mut self) -> Option<&mut Settings> {
    self.draft.as_mut()
  }

  fn open_picker(&mut self, field: Field) {
    let Some(draft) = &self.draft else {
      return;
    };
    let (title, options, current): (&str, Vec<(String, String)>, Option<&str>) = match field {
      Field::Model => (
        "Default model",
        MODELS.iter().map(|m| (m.to_string(), m.to_string())).collect(),
        draft.ollama_model.as_deref(),
      ),
      Field::Theme => (
        "Theme",
        THEMES
          .iter()
          .map(|(value, label)| (value.to_string(), label.to_string()))
          .collect(),
        draft.theme.as_deref(),
      ),
    };
    let current = current.and_then(|c| options.iter().position(|(value, _)| value == c));
    self.picker.show(title, options, current);
    self.picking = Some(field);
  }

  fn save(&mut self) {
    let Some(draft) = self.draft.clone() else {
      return;
    };
    let store = self.ctx.store.clone();
    self.write.start("save settings", async move {
      store.update_settings(&draft).await?;
      Ok(Some("Settings saved successfully!".to_string()))
    });
  }

  fn ask(&mut self, entry: Entry) {
    let (title, hint) = match &entry {
      Entry::OllamaUrl => ("Ollama URL", Some(DEFAULT_OLLAMA_URL)),
      Entry::ProfileField => ("Profile field", Some("key: value, e.g. name: Sam")),
      Entry::Question => ("Remember: question", None),
      Entry::Answer(_) => ("Remember: answer", None),
    };
    self.prompt.open(title, hint);
    self.entry = Some(entry);
  }

  /// Handle text submitted to the prompt for `entry`.
  fn submit(&mut self, entry: Entry, text: String) -> ViewAction {
    match entry {
      Entry::OllamaUrl => {
        if let Some(draft) = self.draft_mut() {
          draft.ollama_url = Some(text);
        }
      }
      Entry::ProfileField => match parse_profile_field(&text) {
        Some((key, value)) => self.set_profile_field(key, value),
        None => {
          return ViewAction::Notify(Notice::info(
            "Profile",
            "Type the field as key: value, for example name: Sam",
          ))
        }
      },
      Entry::Question => self.ask(Entry::Answer(text)),
      Entry::Answer(question) => self.remember(question, text),
    }
    ViewAction::None
  }

  /// Last write wins: the whole document is sent with the field changed.
  fn set_profile_field(&mut self, key: String, value: String) {
    let Some(profile) = self.profile.data() else {
      return;
    };
    let update = ProfileUpdate {
      profile_json: with_profile_field(&profile.profile_json, key, value),
    };
    let store = self.ctx.store.clone();
    self.write.start("update profile", async move {
      store.update_profile(&update).await?;
      Ok(Some("Profile updated".to_string()))
    });
  }

  fn remember(&mut self, question: String, answer: String) {
    let event = NewMemoryEvent {
      question,
      answer,
      confidence: MEMORY_CONFIDENCE,
      context_tag: None,
    };
    let store = self.ctx.store.clone();
    self.write.start("save memory", async move {
      store.create_memory_event(&event).await?;
      Ok(Some("Saved to memory".to_string()))
    });
  }

  fn render_form(&self, frame: &mut Frame, area: Rect) {
    let dirty = match (&self.draft, self.settings.data()) {
      (Some(draft), Some(saved)) => *draft != with_defaults(saved),
      _ => false,
    };
    let title = if self.write.is_pending() {
      " Settings (saving...) ".to_string()
    } else if dirty {
      " Settings (unsaved) ".to_string()
    } else {
      " Settings ".to_string()
    };
    let block = panel(title, Color::Blue);

    let Some(draft) = &self.draft else {
      let line = match self.settings.error() {
        Some(e) => Line::styled(
          format!("{}. Press r to retry.", e),
          Style::default().fg(Color::Red),
        ),
        None => Line::styled("Loading...", Style::default().fg(Color::DarkGray)),
      };
      render_placeholder(frame, area, block, line);
      return;
    };

    let row = |key: &'static str, label: &'static str, value: String| {
      Line::from(vec![
        Span::styled(format!("<{}> ", key), Style::default().fg(Color::Cyan)),
        Span::styled(format!("{:<20}", label), Style::default().fg(Color::Gray)),
        Span::raw(value),
      ])
    };
    let lines = vec![
      Line::styled("Ollama", Style::default().add_modifier(Modifier::BOLD)),
      row("u", "URL", draft.ollama_url.clone().unwrap_or_default()),
      row("o", "Default model", draft.ollama_model.clone().unwrap_or_default()),
      Line::raw(""),
      Line::styled("Appearance", Style::default().add_modifier(Modifier::BOLD)),
      row("t", "Theme", draft.theme.clone().unwrap_or_default()),
      row(
        "w",
        "First day of week",
        weekday_name(draft.first_day_of_week).to_string(),
      ),
      Line::raw(""),
      Line::from(vec![
        Span::styled("<s>", Style::default().fg(Color::Cyan)),
        Span::styled(" Save settings", Style::default().fg(Color::Gray)),
      ]),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_profile(&self, frame: &mut Frame, area: Rect) {
    let block = panel(" Profile <e> ".to_string(), Color::Blue);
    let lines: Vec<Line> = match (self.profile.error(), self.profile.data()) {
      (Some(e), _) => vec![Line::styled(
        format!("{}. Press r to retry.", e),
        Style::default().fg(Color::Red),
      )],
      (None, Some(profile)) => {
        let fields = profile_lines(&profile.profile_json);
        if fields.is_empty() {
          vec![Line::styled(
            "Nothing in the profile yet.",
            Style::default().fg(Color::DarkGray),
          )]
        } else {
          let width = area.width.saturating_sub(2) as usize;
          fields
            .iter()
            .map(|field| Line::raw(truncate(field, width)))
            .collect()
        }
      }
      (None, None) => vec![Line::styled("Loading...", Style::default().fg(Color::DarkGray))],
    };
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_memory(&self, frame: &mut Frame, area: Rect) {
    let block = panel(list_title("Memory <m>", &self.memory), Color::Blue);
    if let Some(line) = placeholder(&self.memory, "Nothing remembered yet.") {
      render_placeholder(frame, area, block, line);
      return;
    }
    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = self
      .memory
      .data()
      .map(|v| v.as_slice())
      .unwrap_or(&[])
      .iter()
      .map(|event| {
        ListItem::new(vec![
          Line::styled(
            truncate(&event.question, width),
            Style::default().fg(Color::Gray),
          ),
          Line::raw(format!("  {}", truncate(&event.answer, width.saturating_sub(2)))),
        ])
      })
      .collect();
    frame.render_widget(List::new(items).block(block), area);
  }
}

impl View for SettingsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.picker.handle_key(key) {
      KeyResult::Event(PickerEvent::Selected(value)) => {
        let field = self.picking.take();
        if let Some(draft) = self.draft_mut() {
          match field {
            Some(Field::Model) => draft.ollama_model = Some(value),
            Some(Field::Theme) => draft.theme = Some(value),
            None => {}
          }
        }
        return ViewAction::None;
      }
      KeyResult::Event(PickerEvent::Cancelled) => {
        self.picking = None;
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(text)) => {
        return match self.entry.take() {
          Some(entry) => self.submit(entry, text),
          None => ViewAction::None,
        };
      }
      KeyResult::Event(PromptEvent::Cancelled) => {
        self.entry = None;
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('t') => self.open_picker(Field::Theme),
      KeyCode::Char('o') => self.open_picker(Field::Model),
      KeyCode::Char('w') => {
        if let Some(draft) = self.draft_mut() {
          draft.first_day_of_week = Some(if draft.first_day_of_week == Some(1) { 0 } else { 1 });
        }
      }
      KeyCode::Char('u') => {
        if self.draft.is_some() {
          self.ask(Entry::OllamaUrl);
        }
      }
      KeyCode::Char('e') => {
        if self.profile.data().is_some() {
          self.ask(Entry::ProfileField);
        }
      }
      KeyCode::Char('m') => self.ask(Entry::Question),
      KeyCode::Char('s') => self.save(),
      KeyCode::Char('r') => self.ctx.refresh(&[
        Collection::Settings,
        Collection::Profile,
        Collection::MemoryEvents,
      ]),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let columns = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(area);
    let right = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
      .split(columns[1]);

    self.render_form(frame, columns[0]);
    self.render_profile(frame, right[0]);
    self.render_memory(frame, right[1]);

    self.picker.render_overlay(frame, area);
    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Settings".to_string()
  }

  fn tick(&mut self) -> Option<Notice> {
    if self.settings.poll() && self.draft.is_none() {
      self.draft = self.settings.data().map(with_defaults);
    }
    self.profile.poll();
    self.memory.poll();
    self.write.poll()
  }

  fn is_editing(&self) -> bool {
    self.picker.is_active() || self.prompt.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("t", "theme").with_priority(20),
      ShortcutInfo::new("o", "model").with_priority(30),
      ShortcutInfo::new("w", "week start").with_priority(40),
      ShortcutInfo::new("s", "save").with_priority(50),
      ShortcutInfo::new("e", "profile").with_priority(60),
      ShortcutInfo::new("m", "remember").with_priority(70),
      ShortcutInfo::new("q", "back").with_priority(80),
    ]
  }
}
