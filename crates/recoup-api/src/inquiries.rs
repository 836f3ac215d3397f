//! Handlers for `/inquiries` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/inquiries` | Optional `?tenant=` |
//! | `GET`  | `/inquiries/:conversation_id` | 404 if not found |
//! | `POST` | `/inquiries/sync` | Runs one dedup sync pass; returns the report |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use recoup_core::{
  inquiry::Inquiry,
  store::RecoveryStore,
  sync::{SyncReport, sync_inquiries},
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub tenant: Option<String>,
}

/// `GET /inquiries[?tenant=<shop>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Inquiry>>, ApiError>
where
  S: RecoveryStore,
{
  let inquiries = store
    .list_inquiries(params.tenant.as_deref())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(inquiries))
}

/// `GET /inquiries/:conversation_id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(conversation_id): Path<String>,
) -> Result<Json<Inquiry>, ApiError>
where
  S: RecoveryStore,
{
  let inquiry = store
    .get_inquiry(&conversation_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("inquiry {conversation_id} not found")))?;
  Ok(Json(inquiry))
}

/// `POST /inquiries/sync`
pub async fn sync<S>(State(store): State<Arc<S>>) -> Result<Json<SyncReport>, ApiError>
where
  S: RecoveryStore,
{
  let report = sync_inquiries(store.as_ref()).await?;
  Ok(Json(report))
}
