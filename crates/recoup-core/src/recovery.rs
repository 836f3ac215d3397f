//! Recovery matching: attribute completed orders to earlier abandoned carts.
//!
//! Matching is by normalised contact email within the tenant, and every
//! recoverable cart for that email is attributed to the order. Each cart is
//! transitioned with its own guarded update; a failure on one cart is counted
//! and logged but does not stop the others. Nothing is retried here: webhook
//! redelivery is the retry, and the guard makes a repeat a no-op.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  cart::{Attribution, CartStatus},
  event::OrderEvent,
  identity::{ContactFragment, resolve_customer},
  store::RecoveryStore,
};

/// Result of matching one order against the cart store.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
  pub order_id:           String,
  /// Recoverable carts found for the order's email.
  pub found:              usize,
  /// Carts this call actually transitioned to `recovered`.
  pub updated:            usize,
  /// Carts whose update raised an error.
  pub failed:             usize,
  pub recovered_cart_ids: Vec<Uuid>,
  pub customer_id:        Option<Uuid>,
}

impl RecoveryReport {
  pub fn is_partial(&self) -> bool { self.updated < self.found }
}

/// Match `order` for `tenant`.
///
/// Returns `Ok(None)` when the order has no resolvable contact email; such
/// orders are skipped rather than rejected.
pub async fn match_order<S>(
  store: &S,
  tenant: &str,
  order: &OrderEvent,
  now: DateTime<Utc>,
) -> Result<Option<RecoveryReport>>
where
  S: RecoveryStore,
{
  let Some(email) = order.contact_email() else {
    tracing::info!(tenant, order_id = %order.id, "order has no contact email; skipping recovery");
    return Ok(None);
  };

  let customer = resolve_customer(store, tenant, ContactFragment::from_order(order, now)).await?;

  let candidates = store
    .recoverable_carts(tenant, &email)
    .await
    .map_err(Error::store)?;

  let attribution = Attribution {
    order_id:     order.id.clone(),
    order_total:  order.total(),
    currency:     order.currency.clone(),
    line_items:   order.items(),
    recovered_at: now,
  };

  let mut report = RecoveryReport {
    order_id:           order.id.clone(),
    found:              candidates.len(),
    updated:            0,
    failed:             0,
    recovered_cart_ids: Vec::new(),
    customer_id:        customer.map(|c| c.customer_id),
  };

  for cart in candidates
    .iter()
    .filter(|c| c.status.can_transition_to(CartStatus::Recovered))
  {
    match store.mark_recovered(cart.cart_id, attribution.clone()).await {
      Ok(true) => {
        report.updated += 1;
        report.recovered_cart_ids.push(cart.cart_id);
      }
      // Another delivery got there first.
      Ok(false) => {}
      Err(e) => {
        report.failed += 1;
        tracing::warn!(
          tenant,
          order_id = %order.id,
          cart_id = %cart.cart_id,
          error = %e,
          "failed to mark cart recovered"
        );
      }
    }
  }

  if report.is_partial() {
    tracing::warn!(
      tenant,
      order_id = %order.id,
      found = report.found,
      updated = report.updated,
      failed = report.failed,
      "recovery partially applied"
    );
  } else {
    tracing::info!(
      tenant,
      order_id = %order.id,
      updated = report.updated,
      "recovery matched"
    );
  }

  Ok(Some(report))
}
