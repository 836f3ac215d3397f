//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Money is stored as decimal
//! strings so no precision is lost. Metadata and line items are stored as
//! compact JSON. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use recoup_core::{
  cart::{Cart, CartStatus, LineItem},
  customer::Customer,
  inquiry::{CartContext, Inquiry, InteractionSession},
  metadata::Metadata,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── CartStatus ──────────────────────────────────────────────────────────────

pub fn encode_status(s: CartStatus) -> &'static str {
  match s {
    CartStatus::Pending => "pending",
    CartStatus::Abandoned => "abandoned",
    CartStatus::EmailSent => "email_sent",
    CartStatus::Recovered => "recovered",
  }
}

pub fn decode_status(s: &str) -> Result<CartStatus> {
  CartStatus::from_str(s).map_err(|_| Error::UnknownCartStatus(s.to_owned()))
}

/// SQL list literal for a status guard, e.g. `'abandoned', 'email_sent'`.
///
/// Only ever built from [`CartStatus`] values, never from user input.
pub fn status_list(statuses: &[CartStatus]) -> String {
  statuses
    .iter()
    .map(|s| format!("'{}'", encode_status(*s)))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_metadata(m: &Metadata) -> Result<String> { Ok(serde_json::to_string(m)?) }

pub fn decode_metadata(s: &str) -> Result<Metadata> { Ok(serde_json::from_str(s)?) }

pub fn encode_items(items: &[LineItem]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_items(s: &str) -> Result<Vec<LineItem>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const CUSTOMER_COLUMNS: &str = "customer_id, tenant, email, upstream_id, first_name, \
                                    last_name, metadata, created_at, updated_at";

/// Raw strings read directly from a `customers` row.
pub struct RawCustomer {
  pub customer_id: String,
  pub tenant:      String,
  pub email:       String,
  pub upstream_id: Option<String>,
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  pub metadata:    String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawCustomer {
  /// Read a row selected with [`CUSTOMER_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      customer_id: row.get(0)?,
      tenant:      row.get(1)?,
      email:       row.get(2)?,
      upstream_id: row.get(3)?,
      first_name:  row.get(4)?,
      last_name:   row.get(5)?,
      metadata:    row.get(6)?,
      created_at:  row.get(7)?,
      updated_at:  row.get(8)?,
    })
  }

  pub fn into_customer(self) -> Result<Customer> {
    Ok(Customer {
      customer_id: decode_uuid(&self.customer_id)?,
      tenant:      self.tenant,
      email:       self.email,
      upstream_id: self.upstream_id,
      first_name:  self.first_name,
      last_name:   self.last_name,
      metadata:    decode_metadata(&self.metadata)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub const CART_COLUMNS: &str = "cart_id, tenant, upstream_cart_id, customer_id, email, total, \
                                currency, items, status, metadata, created_at, updated_at, \
                                recovered_at, recovered_order_id";

/// Raw strings read directly from a `carts` row.
pub struct RawCart {
  pub cart_id:            String,
  pub tenant:             String,
  pub upstream_cart_id:   String,
  pub customer_id:        Option<String>,
  pub email:              Option<String>,
  pub total:              String,
  pub currency:           String,
  pub items:              String,
  pub status:             String,
  pub metadata:           String,
  pub created_at:         String,
  pub updated_at:         String,
  pub recovered_at:       Option<String>,
  pub recovered_order_id: Option<String>,
}

impl RawCart {
  /// Read a row selected with [`CART_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      cart_id:            row.get(0)?,
      tenant:             row.get(1)?,
      upstream_cart_id:   row.get(2)?,
      customer_id:        row.get(3)?,
      email:              row.get(4)?,
      total:              row.get(5)?,
      currency:           row.get(6)?,
      items:              row.get(7)?,
      status:             row.get(8)?,
      metadata:           row.get(9)?,
      created_at:         row.get(10)?,
      updated_at:         row.get(11)?,
      recovered_at:       row.get(12)?,
      recovered_order_id: row.get(13)?,
    })
  }

  pub fn into_cart(self) -> Result<Cart> {
    Ok(Cart {
      cart_id:            decode_uuid(&self.cart_id)?,
      tenant:             self.tenant,
      upstream_cart_id:   self.upstream_cart_id,
      customer_id:        self.customer_id.as_deref().map(decode_uuid).transpose()?,
      email:              self.email,
      total:              decode_decimal(&self.total)?,
      currency:           self.currency,
      items:              decode_items(&self.items)?,
      status:             decode_status(&self.status)?,
      metadata:           decode_metadata(&self.metadata)?,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
      recovered_at:       self.recovered_at.as_deref().map(decode_dt).transpose()?,
      recovered_order_id: self.recovered_order_id,
    })
  }
}

pub const SESSION_COLUMNS: &str = "conversation_id, tenant, customer_email, status, summary, \
                                   transcript, metadata, created_at, updated_at";

/// Raw strings read directly from an `interaction_sessions` row.
pub struct RawSession {
  pub conversation_id: String,
  pub tenant:          String,
  pub customer_email:  Option<String>,
  pub status:          String,
  pub summary:         Option<String>,
  pub transcript:      Option<String>,
  pub metadata:        String,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawSession {
  /// Read a row selected with [`SESSION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      conversation_id: row.get(0)?,
      tenant:          row.get(1)?,
      customer_email:  row.get(2)?,
      status:          row.get(3)?,
      summary:         row.get(4)?,
      transcript:      row.get(5)?,
      metadata:        row.get(6)?,
      created_at:      row.get(7)?,
      updated_at:      row.get(8)?,
    })
  }

  pub fn into_session(self) -> Result<InteractionSession> {
    Ok(InteractionSession {
      conversation_id: self.conversation_id,
      tenant:          self.tenant,
      customer_email:  self.customer_email,
      status:          self.status,
      summary:         self.summary,
      transcript:      self.transcript,
      metadata:        decode_metadata(&self.metadata)?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

pub const INQUIRY_COLUMNS: &str = "conversation_id, tenant, customer_email, cart_id, \
                                   cart_value, currency, summary, full_transcript, status, \
                                   response, created_at, updated_at";

/// Raw strings read directly from an `inquiries` row.
pub struct RawInquiry {
  pub conversation_id: String,
  pub tenant:          String,
  pub customer_email:  Option<String>,
  pub cart_id:         Option<String>,
  pub cart_value:      Option<String>,
  pub currency:        Option<String>,
  pub summary:         String,
  pub full_transcript: Option<String>,
  pub status:          String,
  pub response:        Option<String>,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawInquiry {
  /// Read a row selected with [`INQUIRY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      conversation_id: row.get(0)?,
      tenant:          row.get(1)?,
      customer_email:  row.get(2)?,
      cart_id:         row.get(3)?,
      cart_value:      row.get(4)?,
      currency:        row.get(5)?,
      summary:         row.get(6)?,
      full_transcript: row.get(7)?,
      status:          row.get(8)?,
      response:        row.get(9)?,
      created_at:      row.get(10)?,
      updated_at:      row.get(11)?,
    })
  }

  pub fn into_inquiry(self) -> Result<Inquiry> {
    Ok(Inquiry {
      conversation_id: self.conversation_id,
      tenant:          self.tenant,
      customer_email:  self.customer_email,
      cart:            CartContext {
        cart_id:    self.cart_id,
        cart_value: self.cart_value.as_deref().map(decode_decimal).transpose()?,
        currency:   self.currency,
      },
      summary:         self.summary,
      full_transcript: self.full_transcript,
      status:          self.status,
      response:        self.response,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_list_is_quoted() {
    assert_eq!(
      status_list(CartStatus::Recovered.predecessors()),
      "'abandoned', 'email_sent'"
    );
  }

  #[test]
  fn status_encoding_matches_strum() {
    for s in [
      CartStatus::Pending,
      CartStatus::Abandoned,
      CartStatus::EmailSent,
      CartStatus::Recovered,
    ] {
      assert_eq!(encode_status(s), s.as_ref());
      assert_eq!(decode_status(encode_status(s)).unwrap(), s);
    }
  }

  #[test]
  fn decimal_keeps_scale() {
    let d = decode_decimal("50.00").unwrap();
    assert_eq!(encode_decimal(d), "50.00");
  }
}
