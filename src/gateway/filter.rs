//! Optional list filters and their query-string encoding.
//!
//! The backend reads a missing parameter as "no filter", so an unset field is
//! never sent, not even as an empty value.

use std::fmt;

use url::Url;

/// Filter parameters accepted by list endpoints.
///
/// Also serves as the filter half of a cache key; keys store the
/// [`normalized`](Self::normalized) form so equal encodings compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListFilter {
  pub status: Option<String>,
  pub start: Option<String>,
  pub end: Option<String>,
  pub plan_id: Option<i64>,
}

impl ListFilter {
  /// The unfiltered query.
  pub fn none() -> Self {
    Self::default()
  }

  pub fn status(status: impl Into<String>) -> Self {
    Self {
      status: Some(status.into()),
      ..Self::default()
    }
  }

  /// Same filter with empty strings dropped to `None`.
  pub fn normalized(self) -> Self {
    let keep = |v: Option<String>| v.filter(|v| !v.is_empty());
    Self {
      status: keep(self.status),
      start: keep(self.start),
      end: keep(self.end),
      plan_id: self.plan_id,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.query_pairs().is_empty()
  }

  /// Parameters to send, in a stable order. Empty strings count as absent.
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    let text = [
      ("status", &self.status),
      ("start", &self.start),
      ("end", &self.end),
    ];
    for (name, value) in text {
      if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
        pairs.push((name, v.to_string()));
      }
    }
    if let Some(plan_id) = self.plan_id {
      pairs.push(("plan_id", plan_id.to_string()));
    }
    pairs
  }

  /// Append this filter to `url`. Leaves the url untouched (no trailing `?`)
  /// when there is nothing to send.
  pub fn apply(&self, url: &mut Url) {
    let pairs = self.query_pairs();
    if pairs.is_empty() {
      return;
    }
    let mut query = url.query_pairs_mut();
    for (name, value) in pairs {
      query.append_pair(name, &value);
    }
  }
}

impl fmt::Display for ListFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> = self
      .query_pairs()
      .into_iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect();
    write!(f, "{}", parts.join(","))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base() -> Url {
    Url::parse("http://localhost:8000/meals").unwrap()
  }

  #[test]
  fn test_empty_filter_leaves_url_bare() {
    let mut url = base();
    ListFilter::none().apply(&mut url);
    assert_eq!(url.as_str(), "http://localhost:8000/meals");
    assert_eq!(url.query(), None);
  }

  #[test]
  fn test_empty_strings_are_omitted() {
    let filter = ListFilter {
      start: Some(String::new()),
      end: Some(String::new()),
      ..ListFilter::none()
    };
    assert!(filter.is_empty());
    assert_eq!(filter.normalized(), ListFilter::none());
  }

  #[test]
  fn test_open_range_sends_only_given_bound() {
    let mut url = base();
    let from = ListFilter {
      start: Some("2026-10-01".to_string()),
      ..ListFilter::none()
    };
    from.apply(&mut url);
    assert_eq!(url.query(), Some("start=2026-10-01"));
  }

  #[test]
  fn test_parameters_in_stable_order() {
    let filter = ListFilter {
      status: Some("todo".to_string()),
      plan_id: Some(3),
      ..ListFilter::default()
    };
    let mut url = base();
    filter.apply(&mut url);
    assert_eq!(url.query(), Some("status=todo&plan_id=3"));
  }

  #[test]
  fn test_display() {
    assert_eq!(ListFilter::status("todo").to_string(), "status=todo");
    assert_eq!(ListFilter::none().to_string(), "");
  }
}
