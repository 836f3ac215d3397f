//! Error types for `recoup-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("request body is empty")]
  EmptyBody,

  #[error("malformed {topic} payload: {source}")]
  MalformedPayload {
    topic:  String,
    source: serde_json::Error,
  },

  #[error("invalid monetary amount: {0:?}")]
  InvalidAmount(String),

  #[error("abandonment threshold must be between 1 and {max} seconds, got {secs}")]
  InvalidThreshold { secs: u64, max: u64 },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error raised by a [`crate::store::RecoveryStore`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
