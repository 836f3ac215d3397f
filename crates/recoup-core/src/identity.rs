//! Identity resolution: map an event's contact fields to a canonical
//! [`Customer`].
//!
//! Deduplication relies on the store's `(tenant, email)` upsert, not on a
//! check-then-insert here, so two concurrent first sightings of the same
//! email still produce one customer.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::{
  Error, Result,
  customer::{Customer, NewCustomer, normalize_email},
  event::{CartEvent, CustomerPayload, OrderEvent},
  metadata::Metadata,
  store::RecoveryStore,
};

/// The contact fields embedded in an inbound event.
#[derive(Debug, Clone, Default)]
pub struct ContactFragment {
  pub email:       Option<String>,
  pub upstream_id: Option<String>,
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  /// Provenance and other metadata merged into the customer record.
  pub metadata:    Metadata,
}

impl ContactFragment {
  fn with_customer(email: Option<String>, customer: Option<&CustomerPayload>) -> Self {
    let customer = customer.cloned().unwrap_or_default();
    Self {
      email,
      upstream_id: customer.id,
      first_name: customer.first_name.filter(|s| !s.trim().is_empty()),
      last_name: customer.last_name.filter(|s| !s.trim().is_empty()),
      metadata: Metadata::new(),
    }
  }

  pub fn from_cart(event: &CartEvent, seen_at: DateTime<Utc>) -> Self {
    let mut fragment = Self::with_customer(event.contact_email(), event.customer.as_ref());
    fragment.tag("cart", &event.raw, seen_at);
    fragment
  }

  pub fn from_order(event: &OrderEvent, seen_at: DateTime<Utc>) -> Self {
    let mut fragment = Self::with_customer(event.contact_email(), event.customer.as_ref());
    fragment.tag("order", &event.raw, seen_at);
    fragment.metadata.insert(
      "last_order".to_owned(),
      json!({
        "order_id": event.id,
        "total":    event.total().to_string(),
        "currency": event.currency,
        "at":       event.created_at.unwrap_or(seen_at),
      }),
    );
    fragment
  }

  fn tag(&mut self, source: &str, payload: &Value, seen_at: DateTime<Utc>) {
    self.metadata.insert("source".to_owned(), json!(source));
    self.metadata.insert("last_payload".to_owned(), payload.clone());
    self.metadata.insert("last_seen_at".to_owned(), json!(seen_at));
  }
}

/// Resolve `fragment` to a customer of `tenant`, creating or refreshing it.
///
/// Returns `Ok(None)` when the fragment has no usable email; partial contact
/// data is common and is not an error.
pub async fn resolve_customer<S>(
  store: &S,
  tenant: &str,
  fragment: ContactFragment,
) -> Result<Option<Customer>>
where
  S: RecoveryStore,
{
  let Some(email) = fragment.email.as_deref().and_then(normalize_email) else {
    tracing::debug!(tenant, "contact fragment has no usable email; not resolving");
    return Ok(None);
  };

  let customer = store
    .upsert_customer(NewCustomer {
      tenant: tenant.to_owned(),
      email,
      upstream_id: fragment.upstream_id,
      first_name: fragment.first_name,
      last_name: fragment.last_name,
      metadata: fragment.metadata,
    })
    .await
    .map_err(Error::store)?;

  tracing::debug!(
    tenant,
    customer_id = %customer.customer_id,
    name = ?customer.display_name(),
    "resolved customer"
  );
  Ok(Some(customer))
}
