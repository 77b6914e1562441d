//! Cache keys: a collection plus the filter it was queried with.

use std::fmt;

use crate::gateway::ListFilter;

/// Entity collections the dashboard caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
  Tasks,
  Events,
  Habits,
  Meals,
  Sleep,
  BiblePlans,
  BibleReadings,
  Settings,
  Profile,
  MemoryEvents,
  Contacts,
  NurtureCycles,
  SkinProducts,
  SkinRoutines,
  SkinLogs,
}

impl Collection {
  pub const ALL: &'static [Collection] = &[
    Self::Tasks,
    Self::Events,
    Self::Habits,
    Self::Meals,
    Self::Sleep,
    Self::BiblePlans,
    Self::BibleReadings,
    Self::Settings,
    Self::Profile,
    Self::MemoryEvents,
    Self::Contacts,
    Self::NurtureCycles,
    Self::SkinProducts,
    Self::SkinRoutines,
    Self::SkinLogs,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Self::Tasks => "tasks",
      Self::Events => "events",
      Self::Habits => "habits",
      Self::Meals => "meals",
      Self::Sleep => "sleep",
      Self::BiblePlans => "bible_plans",
      Self::BibleReadings => "bible_readings",
      Self::Settings => "settings",
      Self::Profile => "profile",
      Self::MemoryEvents => "memory_events",
      Self::Contacts => "contacts",
      Self::NurtureCycles => "nurture_cycles",
      Self::SkinProducts => "skin_products",
      Self::SkinRoutines => "skin_routines",
      Self::SkinLogs => "skin_logs",
    }
  }
}

/// Identifies one cache entry.
///
/// `tasks` and `tasks[status=todo]` are distinct entries that share a
/// collection; invalidation works on the collection, lookups on the full key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
  pub collection: Collection,
  pub filter: ListFilter,
}

impl QueryKey {
  pub fn new(collection: Collection, filter: ListFilter) -> Self {
    Self {
      collection,
      filter: filter.normalized(),
    }
  }

  /// Unfiltered variant of a collection.
  pub fn all(collection: Collection) -> Self {
    Self::new(collection, ListFilter::none())
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.filter.is_empty() {
      write!(f, "{}", self.collection.name())
    } else {
      write!(f, "{}[{}]", self.collection.name(), self.filter)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_filtered_and_unfiltered_are_distinct() {
    let all = QueryKey::all(Collection::Tasks);
    let todo = QueryKey::new(Collection::Tasks, ListFilter::status("todo"));
    assert_ne!(all, todo);
    assert_eq!(all.collection, todo.collection);
  }

  #[test]
  fn test_empty_strings_normalize_to_unfiltered() {
    let blank = QueryKey::new(
      Collection::Meals,
      ListFilter {
        start: Some(String::new()),
        ..ListFilter::none()
      },
    );
    assert_eq!(blank, QueryKey::all(Collection::Meals));
  }

  #[test]
  fn test_display() {
    assert_eq!(QueryKey::all(Collection::Tasks).to_string(), "tasks");
    assert_eq!(
      QueryKey::new(Collection::Tasks, ListFilter::status("todo")).to_string(),
      "tasks[status=todo]"
    );
  }
}
