//! Topic dispatch for verified webhook events.
//!
//! Cart topics resolve the contact's customer, then go through the
//! abandonment classifier and, if accepted, the cart upsert. Order topics go to the recovery matcher. Anything else is
//! acknowledged and ignored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
  Error, Result,
  cart::NewCart,
  classifier::{AbandonmentPolicy, Classification},
  event::{CartEvent, InboundEvent},
  identity::{ContactFragment, resolve_customer},
  recovery::{RecoveryReport, match_order},
  store::RecoveryStore,
};

/// Per-delivery context supplied by the transport layer.
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
  pub tenant:      &'a str,
  /// Upstream delivery id, if the transport carried one.
  pub webhook_id:  Option<&'a str>,
  pub topic:       &'a str,
  pub received_at: DateTime<Utc>,
}

/// What the engine did with one event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
  AbandonedCart {
    cart_id:          Uuid,
    upstream_cart_id: String,
    /// `created`, `merged` or `unchanged`.
    change:           &'static str,
  },
  NotAbandoned {
    classification: Classification,
  },
  Recovered(RecoveryReport),
  /// The event was valid but lacked data the engine needs.
  Skipped {
    reason: &'static str,
  },
  Ignored {
    topic: String,
  },
}

/// Fold one verified event into the store.
pub async fn ingest<S>(
  store: &S,
  policy: &AbandonmentPolicy,
  delivery: Delivery<'_>,
  event: InboundEvent,
) -> Result<IngestOutcome>
where
  S: RecoveryStore,
{
  match event {
    InboundEvent::Cart(cart) => ingest_cart(store, policy, delivery, cart).await,
    InboundEvent::Order(order) => {
      let report = match_order(store, delivery.tenant, &order, delivery.received_at).await?;
      Ok(match report {
        Some(report) => IngestOutcome::Recovered(report),
        None => IngestOutcome::Skipped {
          reason: "order has no contact email",
        },
      })
    }
    InboundEvent::Other { topic } => {
      tracing::debug!(tenant = delivery.tenant, %topic, "ignoring topic");
      Ok(IngestOutcome::Ignored { topic })
    }
  }
}

async fn ingest_cart<S>(
  store: &S,
  policy: &AbandonmentPolicy,
  delivery: Delivery<'_>,
  event: CartEvent,
) -> Result<IngestOutcome>
where
  S: RecoveryStore,
{
  let Some(upstream_cart_id) = event.upstream_id().map(str::to_owned) else {
    return Ok(IngestOutcome::Skipped {
      reason: "cart has no id",
    });
  };

  // Every sighting refreshes the customer, abandoned or not.
  let customer = resolve_customer(
    store,
    delivery.tenant,
    ContactFragment::from_cart(&event, delivery.received_at),
  )
  .await?;

  let classification = policy.classify(&event, delivery.received_at);
  tracing::debug!(
    tenant = delivery.tenant,
    %upstream_cart_id,
    classification = classification.reason(),
    "classified cart event"
  );
  if !classification.is_abandoned() {
    return Ok(IngestOutcome::NotAbandoned { classification });
  }

  let mut metadata = crate::metadata::Metadata::new();
  metadata.insert("source".to_owned(), json!("webhook"));
  metadata.insert("topic".to_owned(), json!(delivery.topic));
  metadata.insert("webhook_id".to_owned(), json!(delivery.webhook_id));
  metadata.insert("received_at".to_owned(), json!(delivery.received_at));
  metadata.insert("payload".to_owned(), event.raw.clone());

  let upsert = store
    .upsert_abandoned_cart(NewCart {
      tenant: delivery.tenant.to_owned(),
      upstream_cart_id: upstream_cart_id.clone(),
      customer_id: customer.map(|c| c.customer_id),
      email: event.contact_email(),
      total: event.total(),
      currency: event.currency(),
      items: event.items(),
      metadata,
    })
    .await
    .map_err(Error::store)?;

  tracing::info!(
    tenant = delivery.tenant,
    %upstream_cart_id,
    cart_id = %upsert.cart().cart_id,
    change = upsert.label(),
    "abandoned cart upserted"
  );

  Ok(IngestOutcome::AbandonedCart {
    cart_id: upsert.cart().cart_id,
    upstream_cart_id,
    change: upsert.label(),
  })
}
