//! Inbound webhook events.
//!
//! Raw upstream JSON is parsed once, after signature verification, into a
//! small tagged type per topic. Fields the engine reads are typed; everything
//! else is kept in an `extra` bag, and the untouched payload is kept in `raw`
//! so it can be stored as provenance.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{
  Error, Result,
  cart::LineItem,
  customer::normalize_email,
  metadata::Metadata,
};

/// Currency assumed when a payload does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";

// ─── Topic ───────────────────────────────────────────────────────────────────

/// The webhook topic, as carried in the topic header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
  CartCreate,
  CartUpdate,
  OrderCreate,
  /// Any topic the engine acknowledges but does not act on.
  Other(String),
}

impl Topic {
  pub fn as_str(&self) -> &str {
    match self {
      Self::CartCreate => "carts/create",
      Self::CartUpdate => "carts/update",
      Self::OrderCreate => "orders/create",
      Self::Other(t) => t,
    }
  }
}

impl FromStr for Topic {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s.trim() {
      "carts/create" => Self::CartCreate,
      "carts/update" => Self::CartUpdate,
      "orders/create" => Self::OrderCreate,
      other => Self::Other(other.to_owned()),
    })
  }
}

impl fmt::Display for Topic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Payload fragments ───────────────────────────────────────────────────────

/// Customer block embedded in cart and order payloads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPayload {
  #[serde(default, deserialize_with = "opt_id")]
  pub id:         Option<String>,
  #[serde(default)]
  pub email:      Option<String>,
  #[serde(default)]
  pub first_name: Option<String>,
  #[serde(default)]
  pub last_name:  Option<String>,
  #[serde(flatten)]
  pub extra:      Metadata,
}

/// One line item as sent upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemPayload {
  #[serde(default)]
  pub title:    Option<String>,
  #[serde(default = "one")]
  pub quantity: u32,
  #[serde(default, deserialize_with = "opt_decimal")]
  pub price:    Option<Decimal>,
  /// Either a URL string or an object with a `src`/`url` field.
  #[serde(default, alias = "image_url")]
  pub image:    Option<Value>,
  #[serde(flatten)]
  pub extra:    Metadata,
}

fn one() -> u32 { 1 }

impl LineItemPayload {
  pub fn image_url(&self) -> Option<String> {
    match self.image.as_ref()? {
      Value::String(s) if !s.is_empty() => Some(s.clone()),
      Value::Object(o) => o
        .get("src")
        .or_else(|| o.get("url"))
        .and_then(Value::as_str)
        .map(str::to_owned),
      _ => None,
    }
  }

  pub fn to_line_item(&self) -> LineItem {
    LineItem {
      title:      self.title.clone().unwrap_or_default(),
      quantity:   self.quantity,
      unit_price: self.price.unwrap_or_default(),
      image:      self.image_url(),
    }
  }
}

// ─── Cart event ──────────────────────────────────────────────────────────────

/// A `carts/create` or `carts/update` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CartEvent {
  /// Upstream cart id (falls back to `token` when `id` is absent).
  #[serde(default, deserialize_with = "opt_id")]
  pub id:           Option<String>,
  #[serde(default)]
  pub token:        Option<String>,
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default)]
  pub customer:     Option<CustomerPayload>,
  #[serde(default)]
  pub line_items:   Vec<LineItemPayload>,
  #[serde(default, deserialize_with = "opt_decimal")]
  pub total_price:  Option<Decimal>,
  #[serde(default)]
  pub currency:     Option<String>,
  #[serde(default)]
  pub created_at:   Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at:   Option<DateTime<Utc>>,
  /// Present once the cart's checkout has completed.
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default, deserialize_with = "opt_id")]
  pub order_id:     Option<String>,
  #[serde(flatten)]
  pub extra:        Metadata,
  #[serde(skip)]
  pub raw:          Value,
}

impl CartEvent {
  /// The natural key of the cart within its tenant.
  pub fn upstream_id(&self) -> Option<&str> {
    self.id.as_deref().or(self.token.as_deref())
  }

  /// Normalised contact email from the payload or its customer block.
  pub fn contact_email(&self) -> Option<String> {
    self
      .email
      .as_deref()
      .and_then(normalize_email)
      .or_else(|| {
        self
          .customer
          .as_ref()
          .and_then(|c| c.email.as_deref())
          .and_then(normalize_email)
      })
  }

  /// When the cart was last touched, according to the event itself.
  pub fn last_activity(&self) -> Option<DateTime<Utc>> {
    self.updated_at.or(self.created_at)
  }

  /// The cart already converted into an order.
  pub fn has_completed_checkout(&self) -> bool {
    self.completed_at.is_some() || self.order_id.is_some()
  }

  pub fn items(&self) -> Vec<LineItem> {
    self.line_items.iter().map(LineItemPayload::to_line_item).collect()
  }

  /// The payload's total, or the sum of its line items if none was sent.
  pub fn total(&self) -> Decimal {
    self
      .total_price
      .unwrap_or_else(|| self.items().iter().map(LineItem::line_total).sum())
  }

  pub fn currency(&self) -> String {
    self
      .currency
      .clone()
      .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned())
  }
}

// ─── Order event ─────────────────────────────────────────────────────────────

/// An `orders/create` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderEvent {
  #[serde(deserialize_with = "id")]
  pub id:            String,
  #[serde(default)]
  pub email:         Option<String>,
  #[serde(default)]
  pub contact_email: Option<String>,
  #[serde(default)]
  pub customer:      Option<CustomerPayload>,
  #[serde(default)]
  pub line_items:    Vec<LineItemPayload>,
  #[serde(default, deserialize_with = "opt_decimal")]
  pub total_price:   Option<Decimal>,
  #[serde(default)]
  pub currency:      Option<String>,
  #[serde(default)]
  pub created_at:    Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub extra:         Metadata,
  #[serde(skip)]
  pub raw:           Value,
}

impl OrderEvent {
  /// Normalised purchasing contact: `email`, then `contact_email`, then the
  /// customer block.
  pub fn contact_email(&self) -> Option<String> {
    [
      self.email.as_deref(),
      self.contact_email.as_deref(),
      self.customer.as_ref().and_then(|c| c.email.as_deref()),
    ]
    .into_iter()
    .flatten()
    .find_map(normalize_email)
  }

  pub fn items(&self) -> Vec<LineItem> {
    self.line_items.iter().map(LineItemPayload::to_line_item).collect()
  }

  pub fn total(&self) -> Decimal {
    self
      .total_price
      .unwrap_or_else(|| self.items().iter().map(LineItem::line_total).sum())
  }
}

// ─── Inbound event ───────────────────────────────────────────────────────────

/// A verified, parsed webhook event.
#[derive(Debug, Clone)]
pub enum InboundEvent {
  Cart(CartEvent),
  Order(OrderEvent),
  Other { topic: String },
}

impl InboundEvent {
  /// Parse a verified body for `topic`.
  ///
  /// The body must be a non-empty JSON document for every topic, including
  /// those that are otherwise ignored.
  pub fn parse(topic: &Topic, body: &[u8]) -> Result<Self> {
    if body.iter().all(u8::is_ascii_whitespace) {
      return Err(Error::EmptyBody);
    }
    let malformed = |source| Error::MalformedPayload {
      topic: topic.to_string(),
      source,
    };

    let raw: Value = serde_json::from_slice(body).map_err(malformed)?;

    Ok(match topic {
      Topic::CartCreate | Topic::CartUpdate => {
        let mut event: CartEvent =
          serde_json::from_value(raw.clone()).map_err(malformed)?;
        event.raw = raw;
        Self::Cart(event)
      }
      Topic::OrderCreate => {
        let mut event: OrderEvent =
          serde_json::from_value(raw.clone()).map_err(malformed)?;
        event.raw = raw;
        Self::Order(event)
      }
      Topic::Other(t) => Self::Other { topic: t.clone() },
    })
  }
}

// ─── Field decoders ──────────────────────────────────────────────────────────

/// Upstream ids and amounts arrive as either JSON strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
  String(String),
  Number(serde_json::Number),
}

impl StringOrNumber {
  fn into_string(self) -> String {
    match self {
      Self::String(s) => s,
      Self::Number(n) => n.to_string(),
    }
  }
}

fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(StringOrNumber::deserialize(d)?.into_string())
}

fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
  Ok(
    Option::<StringOrNumber>::deserialize(d)?
      .map(StringOrNumber::into_string)
      .filter(|s| !s.trim().is_empty()),
  )
}

fn opt_decimal<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Decimal>, D::Error> {
  let Some(raw) = Option::<StringOrNumber>::deserialize(d)? else {
    return Ok(None);
  };
  let raw = raw.into_string();
  Decimal::from_str(raw.trim())
    .or_else(|_| Decimal::from_scientific(raw.trim()))
    .map(Some)
    .map_err(|_| serde::de::Error::custom(Error::InvalidAmount(raw)))
}
