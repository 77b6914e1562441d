use thiserror::Error;

/// Failure of a single gateway call.
///
/// Callers handle every variant the same way (surface it and move on); the
/// split exists so logs and tests can tell a bad status from a bad body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
  /// The backend answered outside the 2xx range
  #[error("request failed with status {status}")]
  Status { status: u16 },

  /// The request never produced a response
  #[error("request failed: {0}")]
  Transport(String),

  /// The response body was not the JSON shape we expected
  #[error("malformed response: {0}")]
  Decode(String),

  #[error("invalid url: {0}")]
  InvalidUrl(String),
}

impl GatewayError {
  /// HTTP status carried by the error, if the server answered at all.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status } => Some(*status),
      _ => None,
    }
  }
}

impl From<reqwest::Error> for GatewayError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      return Self::Decode(err.to_string());
    }
    match err.status() {
      Some(status) => Self::Status {
        status: status.as_u16(),
      },
      None => Self::Transport(err.to_string()),
    }
  }
}

impl From<url::ParseError> for GatewayError {
  fn from(err: url::ParseError) -> Self {
    Self::InvalidUrl(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_is_exposed() {
    let err = GatewayError::Status { status: 500 };
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "request failed with status 500");
  }

  #[test]
  fn test_transport_has_no_status() {
    let err = GatewayError::Transport("connection refused".to_string());
    assert_eq!(err.status(), None);
  }
}
