//! `POST /sessions`: intake for the interaction log.
//!
//! The chat collaborator writes one row per conversation here and refreshes it
//! as the conversation progresses. The inquiry sync reads this log.

use std::sync::Arc;

use axum::{Json, extract::State};
use recoup_core::{
  inquiry::{InteractionSession, NewSession},
  store::RecoveryStore,
};

use crate::error::ApiError;

/// `POST /sessions` with a [`NewSession`] body.
pub async fn record<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewSession>,
) -> Result<Json<InteractionSession>, ApiError>
where
  S: RecoveryStore,
{
  if body.conversation_id.trim().is_empty() {
    return Err(ApiError::BadRequest("conversation_id must not be empty".into()));
  }
  if body.tenant.trim().is_empty() {
    return Err(ApiError::BadRequest("tenant must not be empty".into()));
  }

  let session = store.record_session(body).await.map_err(ApiError::store)?;
  tracing::debug!(
    conversation_id = %session.conversation_id,
    status = %session.status,
    "interaction session recorded"
  );
  Ok(Json(session))
}
