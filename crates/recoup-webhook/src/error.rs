//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  /// No shared secret is configured for the tenant. A server fault, not the
  /// caller's.
  #[error("no webhook secret configured for {0:?}")]
  MissingSecret(String),
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error(transparent)]
  Engine(#[from] recoup_core::Error),
}

impl Error {
  fn status(&self) -> StatusCode {
    match self {
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::MissingSecret(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::Engine(
        recoup_core::Error::EmptyBody | recoup_core::Error::MalformedPayload { .. },
      ) => StatusCode::BAD_REQUEST,
      Error::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "webhook processing failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
