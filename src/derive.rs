//! Display values computed from cached collections.
//!
//! Everything here is a pure function of its inputs (the clock is a
//! parameter). Nothing is persisted; views recompute on every render, so a
//! refetched collection is reflected immediately.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, TimeZone};

use crate::gateway::types::{Meal, NurtureCycle, SkinProduct, Task, TaskStatus};

/// Parse a backend timestamp as the wall-clock time it was written in.
/// Accepts RFC 3339, naive ISO 8601 date-times (with or without fractional
/// seconds) and bare dates (midnight).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.naive_local());
  }
  for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
      return Some(dt);
    }
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a backend timestamp as an instant in `tz`. A value with an offset
/// keeps its instant; a naive value is wall-clock time in `tz`.
pub fn parse_instant<Tz: TimeZone>(s: &str, tz: &Tz) -> Option<DateTime<Tz>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s.trim()) {
    return Some(dt.with_timezone(tz));
  }
  tz.from_local_datetime(&parse_timestamp(s)?).earliest()
}

// ============================================================================
// Relationships
// ============================================================================

/// How a contact is doing against its nurture cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
  /// No cycle, or never contacted
  Unknown,
  Good { days: i64 },
  DueSoon { days: i64 },
  Overdue { days: i64, overdue_by: i64 },
}

impl ContactStatus {
  /// Whole days since the last contact, when there was one.
  pub fn days_since(&self) -> Option<i64> {
    match self {
      Self::Unknown => None,
      Self::Good { days } | Self::DueSoon { days } | Self::Overdue { days, .. } => Some(*days),
    }
  }

  /// One-line description for the contact list.
  pub fn summary(&self) -> String {
    match self {
      Self::Unknown => "No contact yet".to_string(),
      Self::Good { .. } => "All good".to_string(),
      Self::DueSoon { .. } => "Check in soon".to_string(),
      Self::Overdue { overdue_by, .. } => format!("Overdue by {} days", overdue_by),
    }
  }
}

/// Classify a nurture cycle at `now`.
///
/// Whole days since last contact, rounded down. Over the cadence is overdue;
/// over 80% of it is due soon. A timestamp that does not parse counts as no
/// contact. Naive timestamps are read in `now`'s time zone.
pub fn nurture_status<Tz: TimeZone>(
  cycle: Option<&NurtureCycle>,
  now: &DateTime<Tz>,
) -> ContactStatus {
  let Some(cycle) = cycle else {
    return ContactStatus::Unknown;
  };
  let tz = now.timezone();
  let Some(last) = cycle
    .last_contact_dt
    .as_deref()
    .and_then(|s| parse_instant(s, &tz))
  else {
    return ContactStatus::Unknown;
  };
  let cadence = cycle.cadence_days;

  let days = now
    .clone()
    .signed_duration_since(last)
    .num_seconds()
    .div_euclid(86_400);
  if days > cadence {
    ContactStatus::Overdue {
      days,
      overdue_by: days - cadence,
    }
  } else if days as f64 > cadence as f64 * 0.8 {
    ContactStatus::DueSoon { days }
  } else {
    ContactStatus::Good { days }
  }
}

/// Counts shown above the contact list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationshipCounts {
  pub total: usize,
  pub due_soon: usize,
  pub overdue: usize,
}

pub fn relationship_counts<Tz: TimeZone>(
  contacts: usize,
  cycles: &[NurtureCycle],
  now: &DateTime<Tz>,
) -> RelationshipCounts {
  let mut counts = RelationshipCounts {
    total: contacts,
    ..Default::default()
  };
  for cycle in cycles {
    match nurture_status(Some(cycle), now) {
      ContactStatus::DueSoon { .. } => counts.due_soon += 1,
      ContactStatus::Overdue { .. } => counts.overdue += 1,
      _ => {}
    }
  }
  counts
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MacroTotals {
  pub calories: i64,
  pub protein: i64,
  pub carbs: i64,
  pub fat: i64,
}

/// Sum the macros of meals eaten on `today`. Meals without a date, or dated
/// any other day, are ignored.
pub fn daily_macros(meals: &[Meal], today: NaiveDate) -> MacroTotals {
  let prefix = today.format("%Y-%m-%d").to_string();
  meals
    .iter()
    .filter(|m| m.dt.as_deref().is_some_and(|dt| dt.starts_with(&prefix)))
    .fold(MacroTotals::default(), |acc, m| MacroTotals {
      calories: acc.calories + m.calories,
      protein: acc.protein + m.protein_g,
      carbs: acc.carbs + m.carbs_g,
      fat: acc.fat + m.fat_g,
    })
}

// ============================================================================
// Skin
// ============================================================================

/// Date a product should be discarded: opened date plus its period after
/// opening. `None` unless both are known.
pub fn product_expiry(product: &SkinProduct) -> Option<NaiveDate> {
  let months = product.pao_months.filter(|m| *m > 0)?;
  let opened = parse_timestamp(product.opened_at.as_deref()?)?.date();
  opened.checked_add_months(Months::new(months))
}

pub fn active_products(products: &[SkinProduct]) -> Vec<&SkinProduct> {
  products.iter().filter(|p| p.is_active).collect()
}

// ============================================================================
// Tasks
// ============================================================================

/// Plan board columns, in list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskColumns<'a> {
  pub todo: Vec<&'a Task>,
  pub doing: Vec<&'a Task>,
  pub done: Vec<&'a Task>,
}

impl<'a> TaskColumns<'a> {
  pub fn column(&self, status: TaskStatus) -> &[&'a Task] {
    match status {
      TaskStatus::Todo => &self.todo,
      TaskStatus::Doing => &self.doing,
      TaskStatus::Done => &self.done,
    }
  }
}

pub fn task_columns(tasks: &[Task]) -> TaskColumns<'_> {
  let mut columns = TaskColumns::default();
  for task in tasks {
    match task.status {
      TaskStatus::Todo => columns.todo.push(task),
      TaskStatus::Doing => columns.doing.push(task),
      TaskStatus::Done => columns.done.push(task),
    }
  }
  columns
}

pub fn greeting(hour: u32) -> &'static str {
  if hour < 12 {
    "Good morning"
  } else if hour < 18 {
    "Good afternoon"
  } else {
    "Good evening"
  }
}
