//! `POST /webhooks/shopify`: signed event intake.
//!
//! Order of checks: tenant header (lower-cased), tenant secret, signature over the raw
//! bytes, topic, then body parsing. Nothing is parsed or written until the
//! signature has been accepted.

use axum::{Json, extract::State, http::HeaderMap};
use bytes::Bytes;
use chrono::Utc;
use recoup_core::{
  event::{InboundEvent, Topic},
  ingest::{Delivery, IngestOutcome, ingest},
  store::RecoveryStore,
};
use tracing::Instrument as _;

use crate::{AppState, error::Error, signature};

pub const TOPIC_HEADER: &str = "x-shopify-topic";
pub const SHOP_HEADER: &str = "x-shopify-shop-domain";
pub const WEBHOOK_ID_HEADER: &str = "x-shopify-webhook-id";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<IngestOutcome>, Error>
where
  S: RecoveryStore + 'static,
{
  // Shop domains are case-insensitive; one spelling is stored.
  let tenant = header(&headers, SHOP_HEADER)
    .ok_or_else(|| Error::BadRequest(format!("missing {SHOP_HEADER} header")))?
    .to_ascii_lowercase();
  let webhook_id = header(&headers, WEBHOOK_ID_HEADER);
  let span = tracing::info_span!("webhook", tenant = tenant.as_str(), webhook_id);

  let outcome = process(&state, &headers, &body, &tenant, webhook_id)
    .instrument(span)
    .await?;
  Ok(Json(outcome))
}

async fn process<S>(
  state: &AppState<S>,
  headers: &HeaderMap,
  body: &[u8],
  tenant: &str,
  webhook_id: Option<&str>,
) -> Result<IngestOutcome, Error>
where
  S: RecoveryStore + 'static,
{
  let secret = state.config.secret_for(tenant).ok_or_else(|| {
    tracing::error!("no webhook secret configured");
    Error::MissingSecret(tenant.to_owned())
  })?;

  let claimed = header(headers, signature::SIGNATURE_HEADER).unwrap_or_default();
  if !signature::verify(secret, body, claimed) {
    tracing::warn!("webhook signature rejected");
    return Err(Error::Unauthorized);
  }

  let topic = header(headers, TOPIC_HEADER)
    .ok_or_else(|| Error::BadRequest(format!("missing {TOPIC_HEADER} header")))?;
  let Ok(topic) = topic.parse::<Topic>();

  let event = InboundEvent::parse(&topic, body)?;
  let delivery = Delivery {
    tenant,
    webhook_id,
    topic: topic.as_str(),
    received_at: Utc::now(),
  };

  Ok(ingest(state.store.as_ref(), &state.policy, delivery, event).await?)
}
