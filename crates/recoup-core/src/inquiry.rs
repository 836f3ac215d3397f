//! Interaction sessions (the raw log) and inquiries (its reconciled form).
//!
//! An external chat collaborator writes [`InteractionSession`] rows. The
//! [`crate::sync`] batch folds every ended, summarised session into exactly
//! one [`Inquiry`] keyed by its conversation id.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::Metadata;

/// Session status that marks a conversation as finished.
pub const SESSION_ENDED: &str = "ended";

// ─── Interaction log ─────────────────────────────────────────────────────────

/// One row of the raw interaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionSession {
  /// Stable conversation identifier; the dedup key.
  pub conversation_id: String,
  pub tenant:          String,
  pub customer_email:  Option<String>,
  /// Free-form status mirrored from the chat collaborator, e.g. `"active"`
  /// or `"ended"`.
  pub status:          String,
  pub summary:         Option<String>,
  pub transcript:      Option<String>,
  /// Session context; may embed a `cart` object.
  pub metadata:        Metadata,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl InteractionSession {
  /// Whether this session is ready to become an inquiry.
  pub fn is_reconcilable(&self) -> bool {
    self.status == SESSION_ENDED && self.summary.is_some()
  }
}

/// Input to [`crate::store::RecoveryStore::record_session`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
  pub conversation_id: String,
  pub tenant:          String,
  pub customer_email:  Option<String>,
  pub status:          String,
  pub summary:         Option<String>,
  pub transcript:      Option<String>,
  #[serde(default)]
  pub metadata:        Metadata,
}

// ─── Cart context ────────────────────────────────────────────────────────────

/// Cart reference extracted from a session's metadata. Every field is
/// optional; absence is normal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartContext {
  pub cart_id:    Option<String>,
  pub cart_value: Option<Decimal>,
  pub currency:   Option<String>,
}

impl CartContext {
  /// Pull cart context from `metadata.cart` (or `metadata.cart_context`).
  ///
  /// Ids and values are accepted as strings or numbers. Anything missing or
  /// unparsable becomes `None`.
  pub fn extract(metadata: &Metadata) -> Self {
    let Some(cart) = metadata
      .get("cart")
      .or_else(|| metadata.get("cart_context"))
      .and_then(Value::as_object)
    else {
      return Self::default();
    };

    let first = |keys: &[&str]| {
      keys
        .iter()
        .find_map(|k| cart.get(*k).filter(|v| !v.is_null()))
        .cloned()
    };

    Self {
      cart_id:    first(&["id", "cart_id", "token"]).and_then(scalar_string),
      cart_value: first(&["value", "cart_value", "total", "total_price"])
        .and_then(scalar_decimal),
      currency:   first(&["currency", "currency_code"])
        .and_then(scalar_string),
    }
  }
}

fn scalar_string(value: Value) -> Option<String> {
  match value {
    Value::String(s) if !s.trim().is_empty() => Some(s),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn scalar_decimal(value: Value) -> Option<Decimal> {
  let raw = match value {
    Value::String(s) => s,
    Value::Number(n) => n.to_string(),
    _ => return None,
  };
  Decimal::from_str(raw.trim())
    .or_else(|_| Decimal::from_scientific(raw.trim()))
    .ok()
}

// ─── Inquiry ─────────────────────────────────────────────────────────────────

/// A reconciled customer question. Exactly one exists per conversation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inquiry {
  pub conversation_id: String,
  pub tenant:          String,
  pub customer_email:  Option<String>,
  #[serde(flatten)]
  pub cart:            CartContext,
  pub summary:         String,
  pub full_transcript: Option<String>,
  /// Mirrored from the source session.
  pub status:          String,
  /// Filled in later by the human-response workflow.
  pub response:        Option<String>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// Input to [`crate::store::RecoveryStore::upsert_inquiry`].
#[derive(Debug, Clone)]
pub struct NewInquiry {
  pub conversation_id: String,
  pub tenant:          String,
  pub customer_email:  Option<String>,
  pub cart:            CartContext,
  pub summary:         String,
  pub full_transcript: Option<String>,
  pub status:          String,
}

impl NewInquiry {
  /// Build an inquiry from a session. Returns `None` if the session has no
  /// summary.
  pub fn from_session(session: &InteractionSession) -> Option<Self> {
    let summary = session.summary.clone()?;
    Some(Self {
      conversation_id: session.conversation_id.clone(),
      tenant:          session.tenant.clone(),
      customer_email:  session
        .customer_email
        .as_deref()
        .and_then(crate::customer::normalize_email),
      cart:            CartContext::extract(&session.metadata),
      summary,
      full_transcript: session.transcript.clone(),
      status:          session.status.clone(),
    })
  }

  /// Materialise a brand-new inquiry from this input.
  pub fn into_inquiry(self, now: DateTime<Utc>) -> Inquiry {
    Inquiry {
      conversation_id: self.conversation_id,
      tenant:          self.tenant,
      customer_email:  self.customer_email,
      cart:            self.cart,
      summary:         self.summary,
      full_transcript: self.full_transcript,
      status:          self.status,
      response:        None,
      created_at:      now,
      updated_at:      now,
    }
  }
}

/// What an inquiry upsert did to the store.
#[derive(Debug, Clone)]
pub enum InquiryUpsert {
  Inserted(Inquiry),
  /// A row already existed for the conversation id and was refreshed.
  Refreshed(Inquiry),
}

impl InquiryUpsert {
  pub fn inquiry(&self) -> &Inquiry {
    match self {
      Self::Inserted(i) | Self::Refreshed(i) => i,
    }
  }
}
