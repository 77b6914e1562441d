use crate::cache::Collection;
use crate::derive::task_columns;
use crate::gateway::types::{Habit, NewHabitLog, NewTask, Task, TaskStatus};
use crate::gateway::ListFilter;
use crate::query::Query;
use crate::ui::components::{KeyResult, Notice, Picker, PickerEvent, Prompt, PromptEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{short_date, status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  cached_query, list_title, panel, placeholder, render_placeholder, PendingWrite, ViewContext,
};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

const COLUMNS: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::Doing, TaskStatus::Done];
const NEW_TASK_PRIORITY: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
  Board,
  Habits,
}

fn column_title(status: TaskStatus) -> &'static str {
  match status {
    TaskStatus::Todo => "To do",
    TaskStatus::Doing => "Doing",
    TaskStatus::Done => "Done",
  }
}

/// Task board (todo/doing/done) over the unfiltered task list, plus habits.
pub struct PlanView {
  ctx: ViewContext,
  tasks: Query<Vec<Task>>,
  habits: Query<Vec<Habit>>,
  focus: Focus,
  column: usize,
  row: usize,
  habit_state: ListState,
  new_task: Prompt,
  status_picker: Picker<TaskStatus>,
  write: PendingWrite,
}

impl PlanView {
  pub fn new(ctx: ViewContext) -> Self {
    let tasks = cached_query(&ctx, Collection::Tasks, |store| async move {
      store.tasks(&ListFilter::none()).await
    });
    let habits = cached_query(&ctx, Collection::Habits, |store| async move {
      store.habits().await
    });

    Self {
      ctx,
      tasks,
      habits,
      focus: Focus::Board,
      column: 0,
      row: 0,
      habit_state: ListState::default(),
      new_task: Prompt::new(),
      status_picker: Picker::new(),
      write: PendingWrite::new(),
    }
  }

  fn all_tasks(&self) -> &[Task] {
    self.tasks.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn habit_list(&self) -> &[Habit] {
    self.habits.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn column_len(&self, column: usize) -> usize {
    task_columns(self.all_tasks()).column(COLUMNS[column]).len()
  }

  fn selected_task(&self) -> Option<&Task> {
    task_columns(self.all_tasks())
      .column(COLUMNS[self.column])
      .get(self.row)
      .copied()
  }

  fn move_column(&mut self, forward: bool) {
    self.column = if forward {
      (self.column + 1) % COLUMNS.len()
    } else {
      self.column.checked_sub(1).unwrap_or(COLUMNS.len() - 1)
    };
    self.row = self.row.min(self.column_len(self.column).saturating_sub(1));
  }

  fn move_row(&mut self, forward: bool) {
    let len = self.column_len(self.column);
    if len == 0 {
      return;
    }
    self.row = if forward {
      (self.row + 1) % len
    } else {
      self.row.checked_sub(1).unwrap_or(len - 1)
    };
  }

  fn set_status(&mut self, id: i64, status: TaskStatus) {
    let store = self.ctx.store.clone();
    self.write.start("update task", async move {
      store.update_task_status(id, status).await?;
      Ok(None)
    });
  }

  fn advance_selected(&mut self) {
    let Some(task) = self.selected_task() else {
      return;
    };
    let (id, next) = (task.id, task.status.next());
    if next != task.status {
      self.set_status(id, next);
    }
  }

  fn delete_selected(&mut self) {
    let Some(id) = self.selected_task().map(|t| t.id) else {
      return;
    };
    let store = self.ctx.store.clone();
    self.write.start("delete task", async move {
      store.delete_task(id).await?;
      Ok(None)
    });
  }

  fn create_task(&mut self, title: String) {
    let task = NewTask {
      title,
      status: TaskStatus::Todo,
      priority: NEW_TASK_PRIORITY,
      notes: None,
      due_ts: None,
    };
    let store = self.ctx.store.clone();
    self.write.start("create task", async move {
      store.create_task(&task).await?;
      Ok(None)
    });
  }

  fn log_selected_habit(&mut self) {
    let Some(habit_id) = self
      .habit_state
      .selected()
      .and_then(|i| self.habit_list().get(i))
      .map(|h| h.id)
    else {
      return;
    };
    let log = NewHabitLog {
      date: Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S").to_string(),
      value: 1,
    };
    let store = self.ctx.store.clone();
    self.write.start("log habit", async move {
      store.log_habit(habit_id, &log).await?;
      Ok(Some("Habit logged!".to_string()))
    });
  }

  fn open_status_picker(&mut self) {
    let Some(current) = self.selected_task().map(|t| t.status) else {
      return;
    };
    let options = COLUMNS
      .iter()
      .map(|s| (*s, column_title(*s).to_string()))
      .collect();
    let index = COLUMNS.iter().position(|s| *s == current);
    self.status_picker.show("Status", options, index);
  }

  fn render_board(&mut self, frame: &mut Frame, area: Rect) {
    let areas = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Ratio(1, 3); 3])
      .split(area);

    let len = self.column_len(self.column);
    self.row = self.row.min(len.saturating_sub(1));

    if let Some(line) = placeholder(&self.tasks, "No tasks yet. Press n to add one.") {
      let block = panel(list_title("Tasks", &self.tasks), Color::Blue);
      render_placeholder(frame, area, block, line);
      return;
    }

    let columns = task_columns(self.all_tasks());
    for (idx, status) in COLUMNS.iter().enumerate() {
      let tasks = columns.column(*status);
      let focused = self.focus == Focus::Board && idx == self.column;
      let color = if focused { Color::Yellow } else { Color::Blue };
      let block = panel(
        format!(" {} ({}) ", column_title(*status), tasks.len()),
        color,
      );

      let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
          let mut spans = vec![Span::styled(
            truncate(&task.title, 40),
            Style::default().fg(status_color(task.status)),
          )];
          if task.is_high_priority() {
            spans.push(Span::styled(" !", Style::default().fg(Color::Red)));
          }
          if let Some(due) = &task.due_ts {
            spans.push(Span::styled(
              format!(" {}", short_date(due)),
              Style::default().fg(Color::DarkGray),
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

      if focused {
        let mut state = ListState::default();
        state.select(Some(self.row));
        frame.render_stateful_widget(list, areas[idx], &mut state);
      } else {
        frame.render_widget(list, areas[idx]);
      }
    }
  }

  fn render_habits(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.habit_list().len();
    ensure_valid_selection(&mut self.habit_state, len);

    let color = if self.focus == Focus::Habits {
      Color::Yellow
    } else {
      Color::Blue
    };
    let block = panel(list_title("Habits", &self.habits), color);
    if let Some(line) = placeholder(&self.habits, "No habits.") {
      render_placeholder(frame, area, block, line);
      return;
    }

    let items: Vec<ListItem> = self
      .habit_list()
      .iter()
      .map(|habit| {
        let target = match (habit.target, &habit.unit) {
          (Some(target), Some(unit)) => format!("  target {} {}", target, unit),
          (Some(target), None) => format!("  target {}", target),
          _ => String::new(),
        };
        ListItem::new(Line::from(vec![
          Span::raw(habit.name.clone()),
          Span::styled(target, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let mut list = List::new(items).block(block);
    if self.focus == Focus::Habits {
      list = list
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    }
    frame.render_stateful_widget(list, area, &mut self.habit_state);
  }
}

impl View for PlanView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.new_task.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(title)) => {
        self.create_task(title);
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match self.status_picker.handle_key(key) {
      KeyResult::Event(PickerEvent::Selected(status)) => {
        if let Some(task) = self.selected_task() {
          if task.status != status {
            let id = task.id;
            self.set_status(id, status);
          }
        }
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match key.code {
      KeyCode::Tab => {
        self.focus = match self.focus {
          Focus::Board => Focus::Habits,
          Focus::Habits => Focus::Board,
        };
      }
      KeyCode::Char('n') => self.new_task.open("New task", Some("Enter to add, Esc to cancel")),
      KeyCode::Char('r') => self.ctx.refresh(&[Collection::Tasks, Collection::Habits]),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => match self.focus {
        Focus::Board => match key.code {
          KeyCode::Char('h') | KeyCode::Left => self.move_column(false),
          KeyCode::Char('l') | KeyCode::Right => self.move_column(true),
          KeyCode::Char('j') | KeyCode::Down => self.move_row(true),
          KeyCode::Char('k') | KeyCode::Up => self.move_row(false),
          KeyCode::Char('m') | KeyCode::Enter => self.advance_selected(),
          KeyCode::Char('s') => self.open_status_picker(),
          KeyCode::Char('x') => self.delete_selected(),
          _ => {}
        },
        Focus::Habits => match key.code {
          KeyCode::Char('j') | KeyCode::Down => self.habit_state.select_next(),
          KeyCode::Char('k') | KeyCode::Up => self.habit_state.select_previous(),
          KeyCode::Enter => self.log_selected_habit(),
          _ => {}
        },
      },
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(6), Constraint::Length(8)])
      .split(area);

    self.render_board(frame, rows[0]);
    self.render_habits(frame, rows[1]);

    self.status_picker.render_overlay(frame, area);
    self.new_task.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Plan".to_string()
  }

  fn tick(&mut self) -> Option<Notice> {
    self.tasks.poll();
    self.habits.poll();
    self.write.poll()
  }

  fn is_editing(&self) -> bool {
    self.new_task.is_active() || self.status_picker.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("n", "new task").with_priority(20),
      ShortcutInfo::new("Tab", "habits").with_priority(60),
      ShortcutInfo::new("q", "back").with_priority(90),
    ];
    match self.focus {
      Focus::Board => {
        shortcuts.push(ShortcutInfo::new("m", "advance").with_priority(30));
        shortcuts.push(ShortcutInfo::new("s", "status").with_priority(40));
        shortcuts.push(ShortcutInfo::new("x", "delete").with_priority(50));
      }
      Focus::Habits => {
        shortcuts.push(ShortcutInfo::new("Enter", "log today").with_priority(30));
      }
    }
    shortcuts
  }
}
