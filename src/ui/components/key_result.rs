/// Generic result type for component key handling.
///
/// Components report back to their parent view with this instead of a
/// component-specific result enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Key was consumed, no event for parent to handle
  Handled,
  /// Key was consumed, here's an event for parent to process
  Event(T),
  /// Key was not consumed, parent should try next handler
  NotHandled,
}

impl<T> KeyResult<T> {
  /// Whether the component took the key, with or without an event
  pub fn consumed(&self) -> bool {
    !matches!(self, KeyResult::NotHandled)
  }
}
