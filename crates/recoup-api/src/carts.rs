//! Handlers for `/carts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/carts` | Optional `tenant`, `status`, `email`, `limit` (default 100), `offset` |
//! | `GET`  | `/carts/:id` | 404 if not found |
//! | `POST` | `/carts/:id/email-sent` | `abandoned → email_sent`; a no-op reports `transitioned: false` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use recoup_core::{
  cart::{Cart, CartQuery, CartStatus},
  customer::normalize_email,
  store::RecoveryStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub tenant: Option<String>,
  pub status: Option<CartStatus>,
  pub email:  Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /carts[?tenant=...][&status=...][&email=...][&limit=...][&offset=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Cart>>, ApiError>
where
  S: RecoveryStore,
{
  let email = params
    .email
    .as_deref()
    .map(|raw| {
      normalize_email(raw).ok_or_else(|| ApiError::BadRequest(format!("invalid email: {raw:?}")))
    })
    .transpose()?;

  let query = CartQuery {
    tenant: params.tenant,
    status: params.status,
    email,
    limit: Some(params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)),
    offset: params.offset,
  };

  let carts = store.list_carts(&query).await.map_err(ApiError::store)?;
  Ok(Json(carts))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /carts/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError>
where
  S: RecoveryStore,
{
  let cart = store
    .get_cart(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("cart {id} not found")))?;
  Ok(Json(cart))
}

// ─── Email sent ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EmailSentResponse {
  pub cart_id:      Uuid,
  /// `false` when the cart was not `abandoned` and nothing changed.
  pub transitioned: bool,
  pub status:       CartStatus,
}

/// `POST /carts/:id/email-sent`
pub async fn email_sent<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<EmailSentResponse>, ApiError>
where
  S: RecoveryStore,
{
  let transitioned = store.mark_email_sent(id).await.map_err(ApiError::store)?;

  let cart = store
    .get_cart(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("cart {id} not found")))?;

  if transitioned {
    tracing::info!(cart_id = %id, tenant = %cart.tenant, "recovery email recorded");
  } else {
    tracing::debug!(cart_id = %id, status = %cart.status, "email-sent transition not applied");
  }

  Ok(Json(EmailSentResponse {
    cart_id: id,
    transitioned,
    status: cart.status,
  }))
}
