use std::collections::HashMap;

use crate::cache::Collection;
use crate::derive::{nurture_status, relationship_counts};
use crate::gateway::types::{Contact, NewContact, NewNurtureCycle, NurtureCycle, NurtureCyclePatch};
use crate::query::Query;
use crate::ui::components::{KeyResult, Notice, Prompt, PromptEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{contact_color, short_date, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  cached_query, list_title, panel, placeholder, render_placeholder, PendingWrite, ViewContext,
};
use chrono::{Local, NaiveDateTime};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph};

const DEFAULT_CADENCE_DAYS: i64 = 14;
const DEFAULT_TIE_STRENGTH: &str = "medium";

fn timestamp(now: NaiveDateTime) -> String {
  now.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// "name, email, phone": only the name is required.
fn parse_contact(input: &str) -> Option<NewContact> {
  let mut parts = input.split(',').map(str::trim);
  let name = parts.next().filter(|n| !n.is_empty())?;
  let mut next = || parts.next().filter(|p| !p.is_empty()).map(String::from);
  Some(NewContact {
    name: name.to_string(),
    email: next(),
    phone: next(),
    notes: None,
  })
}

/// Contacts with their nurture status, and counts of who needs attention.
pub struct RelationshipsView {
  ctx: ViewContext,
  contacts: Query<Vec<Contact>>,
  cycles: Query<Vec<NurtureCycle>>,
  list_state: ListState,
  new_contact: Prompt,
  write: PendingWrite,
}

impl RelationshipsView {
  pub fn new(ctx: ViewContext) -> Self {
    let contacts = cached_query(&ctx, Collection::Contacts, |store| async move {
      store.contacts().await
    });
    let cycles = cached_query(&ctx, Collection::NurtureCycles, |store| async move {
      store.nurture_cycles().await
    });

    Self {
      ctx,
      contacts,
      cycles,
      list_state: ListState::default(),
      new_contact: Prompt::new(),
      write: PendingWrite::new(),
    }
  }

  fn contact_list(&self) -> &[Contact] {
    self.contacts.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn cycle_list(&self) -> &[NurtureCycle] {
    self.cycles.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  /// Cycle per contact. Cycles are 1:1 with contacts; a duplicate keeps the last.
  fn cycles_by_contact(&self) -> HashMap<i64, &NurtureCycle> {
    self
      .cycle_list()
      .iter()
      .map(|c| (c.contact_id, c))
      .collect()
  }

  fn selected_contact(&self) -> Option<&Contact> {
    self
      .list_state
      .selected()
      .and_then(|i| self.contact_list().get(i))
  }

  /// Record a check-in now, creating the cycle if the contact has none.
  fn mark_contacted(&mut self) {
    let Some(contact) = self.selected_contact() else {
      return;
    };
    let contact_id = contact.id;
    let name = contact.name.clone();
    let existing = self.cycles_by_contact().get(&contact_id).map(|c| c.id);
    let now = timestamp(Local::now().naive_local());
    let store = self.ctx.store.clone();

    self.write.start("mark contacted", async move {
      match existing {
        Some(id) => {
          let patch = NurtureCyclePatch {
            last_contact_dt: Some(now),
            ..Default::default()
          };
          store.update_nurture_cycle(id, &patch).await?;
        }
        None => {
          let cycle = NewNurtureCycle {
            contact_id,
            tie_strength: DEFAULT_TIE_STRENGTH.to_string(),
            cadence_days: DEFAULT_CADENCE_DAYS,
            last_contact_dt: Some(now),
          };
          store.create_nurture_cycle(&cycle).await?;
        }
      }
      Ok(Some(format!("Checked in with {}", name)))
    });
  }

  fn add_cycle(&mut self) {
    let Some(contact_id) = self.selected_contact().map(|c| c.id) else {
      return;
    };
    if self.cycles_by_contact().contains_key(&contact_id) {
      return;
    }
    let cycle = NewNurtureCycle {
      contact_id,
      tie_strength: DEFAULT_TIE_STRENGTH.to_string(),
      cadence_days: DEFAULT_CADENCE_DAYS,
      last_contact_dt: None,
    };
    let store = self.ctx.store.clone();
    self.write.start("add nurture cycle", async move {
      store.create_nurture_cycle(&cycle).await?;
      Ok(None)
    });
  }

  fn add_contact(&mut self, input: &str) {
    let Some(contact) = parse_contact(input) else {
      return;
    };
    let store = self.ctx.store.clone();
    self.write.start("add contact", async move {
      store.create_contact(&contact).await?;
      Ok(None)
    });
  }

  fn render_counts(&self, frame: &mut Frame, area: Rect) {
    let now = Local::now();
    let counts = relationship_counts(self.contact_list().len(), self.cycle_list(), &now);
    let stat = |label: &'static str, value: usize, color: Color| {
      vec![
        Span::styled(format!(" {} ", value), Style::default().fg(color).bold()),
        Span::styled(label, Style::default().fg(Color::DarkGray)),
        Span::raw("   "),
      ]
    };
    let mut spans = Vec::new();
    spans.extend(stat("contacts", counts.total, Color::Cyan));
    spans.extend(stat("cycles", self.cycle_list().len(), Color::Magenta));
    spans.extend(stat("due soon", counts.due_soon, Color::Yellow));
    spans.extend(stat("overdue", counts.overdue, Color::Red));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }

  fn render_contacts(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.contact_list().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = panel(list_title("Contacts", &self.contacts), Color::Blue);
    if let Some(line) = placeholder(
      &self.contacts,
      "No contacts yet. Press a to add your first contact.",
    ) {
      render_placeholder(frame, area, block, line);
      return;
    }

    let now = Local::now();
    let cycles = self.cycles_by_contact();
    let items: Vec<ListItem> = self
      .contact_list()
      .iter()
      .map(|contact| {
        let cycle = cycles.get(&contact.id).copied();
        let status = nurture_status(cycle, &now);
        let mut spans = vec![
          Span::raw(format!("{:<24}", truncate(&contact.name, 22))),
          Span::styled(
            format!("{:<22}", status.summary()),
            Style::default().fg(contact_color(&status)),
          ),
        ];
        match cycle {
          Some(cycle) => {
            spans.push(Span::styled(
              format!("{:<8} every {} days", cycle.tie_strength, cycle.cadence_days),
              Style::default().fg(Color::Gray),
            ));
            if let (Some(last), Some(days)) = (&cycle.last_contact_dt, status.days_since()) {
              spans.push(Span::styled(
                format!("  last {} ({}d ago)", short_date(last), days),
                Style::default().fg(Color::DarkGray),
              ));
            }
          }
          None => spans.push(Span::styled(
            "no cycle (n to add)",
            Style::default().fg(Color::DarkGray),
          )),
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
}

impl View for RelationshipsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.new_contact.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(input)) => {
        self.add_contact(&input);
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('c') | KeyCode::Enter => self.mark_contacted(),
      KeyCode::Char('n') => self.add_cycle(),
      KeyCode::Char('a') => self
        .new_contact
        .open("Add contact", Some("name, email, phone")),
      KeyCode::Char('r') => self
        .ctx
        .refresh(&[Collection::Contacts, Collection::NurtureCycles]),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(3)])
      .split(area);
    self.render_counts(frame, rows[0]);
    self.render_contacts(frame, rows[1]);
    self.new_contact.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Relationships".to_string()
  }

  fn tick(&mut self) -> Option<Notice> {
    self.contacts.poll();
    self.cycles.poll();
    self.write.poll()
  }

  fn is_editing(&self) -> bool {
    self.new_contact.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("c", "contacted").with_priority(20),
      ShortcutInfo::new("n", "add cycle").with_priority(30),
      ShortcutInfo::new("a", "add contact").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(50),
    ]
  }
}
