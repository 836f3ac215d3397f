//! Cart: the unit of abandonment and recovery reconciliation.
//!
//! A cart's status only ever moves forward:
//! `abandoned → email_sent → recovered`. Carts are never hard-deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::metadata::Metadata;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a cart.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CartStatus {
  /// Display-only placeholder; never entered by the engine.
  Pending,
  Abandoned,
  EmailSent,
  Recovered,
}

impl CartStatus {
  fn rank(self) -> u8 {
    match self {
      Self::Pending => 0,
      Self::Abandoned => 1,
      Self::EmailSent => 2,
      Self::Recovered => 3,
    }
  }

  /// Whether moving from `self` to `next` goes strictly forward.
  pub fn can_transition_to(self, next: CartStatus) -> bool {
    next != Self::Pending && next.rank() > self.rank()
  }

  /// The statuses from which a guarded update may enter `self`.
  ///
  /// Storage backends use this list as the `WHERE status IN (...)` guard of
  /// their conditional updates.
  pub fn predecessors(self) -> &'static [CartStatus] {
    match self {
      Self::Pending | Self::Abandoned => &[],
      Self::EmailSent => &[Self::Abandoned],
      Self::Recovered => &[Self::Abandoned, Self::EmailSent],
    }
  }
}

// ─── Line items ──────────────────────────────────────────────────────────────

/// One line of a cart or order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
  pub title:      String,
  pub quantity:   u32,
  pub unit_price: Decimal,
  /// URL of a product image, if the upstream payload carried one.
  pub image:      Option<String>,
}

impl LineItem {
  pub fn line_total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }
}

// ─── Cart ────────────────────────────────────────────────────────────────────

/// A persisted cart snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
  pub cart_id:            Uuid,
  pub tenant:             String,
  /// The upstream platform's cart id; unique within a tenant.
  pub upstream_cart_id:   String,
  /// Owning customer, if one has been resolved.
  pub customer_id:        Option<Uuid>,
  /// Denormalised contact email used for recovery matching.
  pub email:              Option<String>,
  pub total:              Decimal,
  pub currency:           String,
  pub items:              Vec<LineItem>,
  pub status:             CartStatus,
  /// Raw upstream payload, provenance and (once recovered) attribution.
  pub metadata:           Metadata,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  pub recovered_at:       Option<DateTime<Utc>>,
  pub recovered_order_id: Option<String>,
}

/// Input to [`crate::store::RecoveryStore::upsert_abandoned_cart`].
#[derive(Debug, Clone)]
pub struct NewCart {
  pub tenant:           String,
  pub upstream_cart_id: String,
  pub customer_id:      Option<Uuid>,
  pub email:            Option<String>,
  pub total:            Decimal,
  pub currency:         String,
  pub items:            Vec<LineItem>,
  pub metadata:         Metadata,
}

impl NewCart {
  /// Materialise a brand-new abandoned cart from this input.
  pub fn into_cart(self, now: DateTime<Utc>) -> Cart {
    Cart {
      cart_id:            Uuid::new_v4(),
      tenant:             self.tenant,
      upstream_cart_id:   self.upstream_cart_id,
      customer_id:        self.customer_id,
      email:              self.email,
      total:              self.total,
      currency:           self.currency,
      items:              self.items,
      status:             CartStatus::Abandoned,
      metadata:           self.metadata,
      created_at:         now,
      updated_at:         now,
      recovered_at:       None,
      recovered_order_id: None,
    }
  }
}

impl Cart {
  /// Fold a repeated abandonment event into this snapshot.
  ///
  /// Contents (total, items, currency) follow the newer event; customer and
  /// email are only filled in, never cleared. Status is left alone.
  pub fn absorb(&mut self, update: NewCart, now: DateTime<Utc>) {
    if update.customer_id.is_some() {
      self.customer_id = update.customer_id;
    }
    if update.email.is_some() {
      self.email = update.email;
    }
    self.total = update.total;
    self.currency = update.currency;
    self.items = update.items;
    crate::metadata::merge(&mut self.metadata, update.metadata);
    self.updated_at = now;
  }
}

/// What an abandonment upsert did to the store.
#[derive(Debug, Clone)]
pub enum CartUpsert {
  /// No cart existed for the natural key; a new abandoned cart was written.
  Created(Cart),
  /// An existing, not-yet-recovered cart was refreshed in place.
  Merged(Cart),
  /// The cart is already recovered; nothing was written.
  Unchanged(Cart),
}

impl CartUpsert {
  pub fn cart(&self) -> &Cart {
    match self {
      Self::Created(c) | Self::Merged(c) | Self::Unchanged(c) => c,
    }
  }

  pub fn into_cart(self) -> Cart {
    match self {
      Self::Created(c) | Self::Merged(c) | Self::Unchanged(c) => c,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::Created(_) => "created",
      Self::Merged(_) => "merged",
      Self::Unchanged(_) => "unchanged",
    }
  }
}

// ─── Recovery attribution ────────────────────────────────────────────────────

/// The link between a recovered cart and the order that recovered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
  pub order_id:     String,
  pub order_total:  Decimal,
  pub currency:     Option<String>,
  pub line_items:   Vec<LineItem>,
  pub recovered_at: DateTime<Utc>,
}

impl Attribution {
  /// The metadata entries appended to a cart when it is recovered.
  pub fn to_metadata(&self) -> Metadata {
    let mut map = Metadata::new();
    map.insert(
      "recovery".to_owned(),
      json!({
        "order_id":     self.order_id,
        "order_total":  self.order_total.to_string(),
        "currency":     self.currency,
        "line_items":   self.line_items,
        "recovered_at": self.recovered_at,
      }),
    );
    map
  }
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::RecoveryStore::list_carts`].
#[derive(Debug, Clone, Default)]
pub struct CartQuery {
  pub tenant: Option<String>,
  pub status: Option<CartStatus>,
  /// Matched against the normalised email.
  pub email:  Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use super::*;

  #[test]
  fn status_round_trips_through_strings() {
    assert_eq!(CartStatus::EmailSent.as_ref(), "email_sent");
    assert_eq!(CartStatus::from_str("recovered").unwrap(), CartStatus::Recovered);
    assert!(CartStatus::from_str("refunded").is_err());
  }

  #[test]
  fn transitions_only_move_forward() {
    use CartStatus::*;
    assert!(Abandoned.can_transition_to(EmailSent));
    assert!(Abandoned.can_transition_to(Recovered));
    assert!(EmailSent.can_transition_to(Recovered));
    assert!(!Recovered.can_transition_to(Abandoned));
    assert!(!Recovered.can_transition_to(EmailSent));
    assert!(!EmailSent.can_transition_to(Abandoned));
    assert!(!Abandoned.can_transition_to(Pending));
  }

  #[test]
  fn predecessors_agree_with_transitions() {
    use CartStatus::*;
    for target in [Pending, Abandoned, EmailSent, Recovered] {
      for from in target.predecessors() {
        assert!(from.can_transition_to(target), "{from} -> {target}");
      }
    }
    assert_eq!(Recovered.predecessors(), &[Abandoned, EmailSent]);
  }

  #[test]
  fn attribution_metadata_is_namespaced() {
    let attribution = Attribution {
      order_id:     "1001".into(),
      order_total:  Decimal::new(5000, 2),
      currency:     Some("USD".into()),
      line_items:   vec![],
      recovered_at: Utc::now(),
    };
    let meta = attribution.to_metadata();
    assert_eq!(meta["recovery"]["order_id"], "1001");
    assert_eq!(meta["recovery"]["order_total"], "50.00");
  }
}
