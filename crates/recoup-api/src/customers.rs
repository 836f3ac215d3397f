//! Handlers for `/customers` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/customers?tenant=...` | `tenant` required |
//! | `GET`    | `/customers/:id` | 404 if not found |
//! | `DELETE` | `/customers/:id` | Carts keep their history; 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use recoup_core::{customer::Customer, store::RecoveryStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub tenant: String,
}

/// `GET /customers?tenant=<shop>`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Customer>>, ApiError>
where
  S: RecoveryStore,
{
  let customers = store
    .list_customers(&params.tenant)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(customers))
}

/// `GET /customers/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Customer>, ApiError>
where
  S: RecoveryStore,
{
  let customer = store
    .get_customer(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("customer {id} not found")))?;
  Ok(Json(customer))
}

/// `DELETE /customers/:id`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RecoveryStore,
{
  if !store.delete_customer(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("customer {id} not found")));
  }
  tracing::info!(customer_id = %id, "customer deleted");
  Ok(StatusCode::NO_CONTENT)
}
