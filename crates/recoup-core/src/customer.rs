//! Customer: the canonical identity record for a shopper within a tenant.
//!
//! At most one customer exists per `(tenant, email)` pair. Later sightings
//! update the record in place; identity fields are never downgraded from
//! populated to empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metadata::{self, Metadata};

/// A persisted customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
  pub customer_id: Uuid,
  /// The shop this customer belongs to.
  pub tenant:      String,
  /// Normalised (trimmed, lower-cased) email; the natural key.
  pub email:       String,
  /// The upstream platform's customer id, which may arrive after the record
  /// is first created.
  pub upstream_id: Option<String>,
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  /// Last-seen raw payload and source tag.
  pub metadata:    Metadata,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl Customer {
  /// `"First Last"`, either part alone, or `None` if neither is known.
  pub fn display_name(&self) -> Option<String> {
    match (self.first_name.as_deref(), self.last_name.as_deref()) {
      (Some(f), Some(l)) => Some(format!("{f} {l}")),
      (Some(n), None) | (None, Some(n)) => Some(n.to_owned()),
      (None, None) => None,
    }
  }

  /// Fold a later sighting into this record.
  ///
  /// Non-null identity fields from `update` win; null fields leave the
  /// existing value untouched. Metadata is merged key by key.
  pub fn absorb(&mut self, update: NewCustomer, now: DateTime<Utc>) {
    if update.upstream_id.is_some() {
      self.upstream_id = update.upstream_id;
    }
    if update.first_name.is_some() {
      self.first_name = update.first_name;
    }
    if update.last_name.is_some() {
      self.last_name = update.last_name;
    }
    metadata::merge(&mut self.metadata, update.metadata);
    self.updated_at = now;
  }
}

/// Input to [`crate::store::RecoveryStore::upsert_customer`].
#[derive(Debug, Clone)]
pub struct NewCustomer {
  pub tenant:      String,
  /// Must already be normalised with [`normalize_email`].
  pub email:       String,
  pub upstream_id: Option<String>,
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  pub metadata:    Metadata,
}

impl NewCustomer {
  /// Materialise a brand-new record from this input.
  pub fn into_customer(self, now: DateTime<Utc>) -> Customer {
    Customer {
      customer_id: Uuid::new_v4(),
      tenant:      self.tenant,
      email:       self.email,
      upstream_id: self.upstream_id,
      first_name:  self.first_name,
      last_name:   self.last_name,
      metadata:    self.metadata,
      created_at:  now,
      updated_at:  now,
    }
  }
}

/// Trim and lower-case an email address.
///
/// Returns `None` for blank input or input without an `@`.
pub fn normalize_email(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() || !trimmed.contains('@') {
    return None;
  }
  Some(trimmed.to_lowercase())
}
