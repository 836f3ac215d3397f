//! Webhook protocol layer for recoup.
//!
//! Exposes an axum [`Router`] that verifies and ingests signed storefront
//! events and mounts the JSON API under `/api`, backed by any
//! [`RecoveryStore`].

pub mod error;
pub mod handlers;
pub mod schedule;
pub mod signature;

pub use error::Error;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::{Router, routing::post};
use recoup_core::{
  classifier::{AbandonmentPolicy, DEFAULT_THRESHOLD_SECS},
  store::RecoveryStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                       String,
  pub port:                       u16,
  pub store_path:                 PathBuf,
  /// Shared secret per shop domain.
  #[serde(default)]
  pub webhook_secrets:            HashMap<String, String>,
  /// Used for any shop without its own entry.
  #[serde(default)]
  pub default_webhook_secret:     Option<String>,
  #[serde(default = "default_threshold_secs")]
  pub abandonment_threshold_secs: u64,
  /// Enables the background inquiry sync when set.
  #[serde(default)]
  pub inquiry_sync_interval_secs: Option<u64>,
}

fn default_threshold_secs() -> u64 { DEFAULT_THRESHOLD_SECS }

impl ServerConfig {
  /// The non-empty shared secret for `tenant`, if one is configured.
  ///
  /// Shop domains compare case-insensitively.
  pub fn secret_for(&self, tenant: &str) -> Option<&str> {
    let non_empty = |s: &&String| !s.trim().is_empty();
    self
      .webhook_secrets
      .iter()
      .find(|(shop, _)| shop.trim().eq_ignore_ascii_case(tenant))
      .map(|(_, secret)| secret)
      .filter(non_empty)
      .or_else(|| self.default_webhook_secret.as_ref().filter(non_empty))
      .map(String::as_str)
  }

  /// Validate the configured threshold into a policy.
  pub fn abandonment_policy(&self) -> recoup_core::Result<AbandonmentPolicy> {
    AbandonmentPolicy::from_secs(self.abandonment_threshold_secs)
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S: RecoveryStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  /// Built once from `config` at startup.
  pub policy: AbandonmentPolicy,
}

impl<S: RecoveryStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      config: Arc::clone(&self.config),
      policy: self.policy,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router: webhook intake plus `/api`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RecoveryStore + 'static,
{
  let api = recoup_api::api_router(Arc::clone(&state.store));

  Router::new()
    .route("/webhooks/shopify", post(handlers::webhook::handler::<S>))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
  };
  use chrono::{Duration, Utc};
  use recoup_core::{cart::CartStatus, store::RecoveryStore as _};
  use recoup_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use crate::handlers::webhook::{SHOP_HEADER, TOPIC_HEADER, WEBHOOK_ID_HEADER};

  const SHOP: &str = "shop.example.com";
  const SECRET: &str = "hush";

  fn test_config() -> ServerConfig {
    ServerConfig {
      host:                       "127.0.0.1".to_string(),
      port:                       8080,
      store_path:                 PathBuf::from(":memory:"),
      webhook_secrets:            HashMap::from([(SHOP.to_string(), SECRET.to_string())]),
      default_webhook_secret:     None,
      abandonment_threshold_secs: DEFAULT_THRESHOLD_SECS,
      inquiry_sync_interval_secs: None,
    }
  }

  async fn make_state_with(config: ServerConfig) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:  Arc::new(store),
      policy: config.abandonment_policy().unwrap(),
      config: Arc::new(config),
    }
  }

  async fn make_state() -> AppState<SqliteStore> { make_state_with(test_config()).await }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(&str, String)>,
    body:    &str,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  /// Deliver `body` for `topic`, signed with `secret`.
  async fn deliver(
    state:  AppState<SqliteStore>,
    topic:  &str,
    body:   &str,
    secret: &str,
  ) -> Response {
    let sig = signature::sign(secret, body.as_bytes()).unwrap();
    oneshot_raw(
      state,
      "POST",
      "/webhooks/shopify",
      vec![
        (SHOP_HEADER, SHOP.to_string()),
        (TOPIC_HEADER, topic.to_string()),
        (WEBHOOK_ID_HEADER, "wh-1".to_string()),
        (signature::SIGNATURE_HEADER, sig),
        ("content-type", "application/json".to_string()),
      ],
      body,
    )
    .await
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn abandoned_cart_body() -> String {
    let seen = Utc::now() - Duration::hours(2);
    json!({
      "id": 98765,
      "email": "alice@example.com",
      "line_items": [{ "title": "Mug", "quantity": 2, "price": "25.00" }],
      "total_price": "50.00",
      "currency": "USD",
      "created_at": seen,
      "updated_at": seen,
    })
    .to_string()
  }

  // ── Webhook intake ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn signed_abandoned_cart_is_stored() {
    let state = make_state().await;
    let resp = deliver(state.clone(), "carts/update", &abandoned_cart_body(), SECRET).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let outcome = json_body(resp).await;
    assert_eq!(outcome["outcome"], "abandoned_cart");
    assert_eq!(outcome["change"], "created");

    let cart = state.store.find_cart(SHOP, "98765").await.unwrap().unwrap();
    assert_eq!(cart.status, CartStatus::Abandoned);
  }

  #[tokio::test]
  async fn tampered_body_is_rejected_without_mutation() {
    let state = make_state().await;
    let body = abandoned_cart_body();
    let sig = signature::sign(SECRET, body.as_bytes()).unwrap();
    let tampered = body.replace("50.00", "0.01");

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/webhooks/shopify",
      vec![
        (SHOP_HEADER, SHOP.to_string()),
        (TOPIC_HEADER, "carts/update".to_string()),
        (signature::SIGNATURE_HEADER, sig),
      ],
      &tampered,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(state.store.find_cart(SHOP, "98765").await.unwrap().is_none());
    assert!(state.store.list_customers(SHOP).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn missing_signature_is_unauthorized() {
    let state = make_state().await;
    let resp = oneshot_raw(
      state,
      "POST",
      "/webhooks/shopify",
      vec![
        (SHOP_HEADER, SHOP.to_string()),
        (TOPIC_HEADER, "carts/update".to_string()),
      ],
      &abandoned_cart_body(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn unconfigured_secret_is_a_server_error() {
    let state = make_state().await;
    let body = abandoned_cart_body();
    let sig = signature::sign(SECRET, body.as_bytes()).unwrap();

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/webhooks/shopify",
      vec![
        (SHOP_HEADER, "unknown.example.com".to_string()),
        (TOPIC_HEADER, "carts/update".to_string()),
        (signature::SIGNATURE_HEADER, sig),
      ],
      &body,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
      state
        .store
        .find_cart("unknown.example.com", "98765")
        .await
        .unwrap()
        .is_none()
    );
  }

  #[tokio::test]
  async fn default_secret_covers_unlisted_shop() {
    let mut state = make_state().await;
    let mut config = (*state.config).clone();
    config.webhook_secrets.clear();
    config.default_webhook_secret = Some(SECRET.to_string());
    state.config = Arc::new(config);

    let resp = deliver(state, "carts/update", &abandoned_cart_body(), SECRET).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn shop_domain_case_is_normalised() {
    let state = make_state_with(ServerConfig {
      webhook_secrets: HashMap::from([("Shop.Example.com".to_string(), SECRET.to_string())]),
      ..test_config()
    })
    .await;

    let body = abandoned_cart_body();
    let sig = signature::sign(SECRET, body.as_bytes()).unwrap();
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/webhooks/shopify",
      vec![
        (SHOP_HEADER, "SHOP.example.com".to_string()),
        (TOPIC_HEADER, "carts/update".to_string()),
        (signature::SIGNATURE_HEADER, sig),
      ],
      &body,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    deliver(state.clone(), "carts/update", &body, SECRET).await;
    let carts = state
      .store
      .list_carts(&recoup_core::cart::CartQuery::default())
      .await
      .unwrap();
    assert_eq!(carts.len(), 1);
    assert_eq!(carts[0].tenant, SHOP);
  }

  #[tokio::test]
  async fn missing_shop_header_is_bad_request() {
    let state = make_state().await;
    let resp = oneshot_raw(
      state,
      "POST",
      "/webhooks/shopify",
      vec![(TOPIC_HEADER, "carts/update".to_string())],
      "{}",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn empty_body_is_bad_request() {
    let state = make_state().await;
    let resp = deliver(state, "carts/update", "", SECRET).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn malformed_body_is_bad_request() {
    let state = make_state().await;
    let resp = deliver(state, "orders/create", "{not json", SECRET).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = json_body(resp).await;
    assert!(err["error"].is_string());
  }

  #[tokio::test]
  async fn unknown_topic_is_acknowledged() {
    let state = make_state().await;
    let resp = deliver(state, "products/update", r#"{"id":1}"#, SECRET).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome = json_body(resp).await;
    assert_eq!(outcome["outcome"], "ignored");
    assert_eq!(outcome["topic"], "products/update");
  }

  #[tokio::test]
  async fn recent_cart_is_acknowledged_without_write() {
    let state = make_state().await;
    let body = json!({ "id": 1, "email": "a@example.com", "updated_at": Utc::now() }).to_string();
    let resp = deliver(state.clone(), "carts/create", &body, SECRET).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["outcome"], "not_abandoned");
    assert!(state.store.find_cart(SHOP, "1").await.unwrap().is_none());
    assert_eq!(state.store.list_customers(SHOP).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn order_recovers_cart_end_to_end() {
    let state = make_state().await;
    deliver(state.clone(), "carts/update", &abandoned_cart_body(), SECRET).await;

    let order = json!({
      "id": 1001,
      "email": "Alice@Example.com",
      "total_price": "50.00",
      "currency": "USD",
    })
    .to_string();
    let resp = deliver(state.clone(), "orders/create", &order, SECRET).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome = json_body(resp).await;
    assert_eq!(outcome["outcome"], "recovered");
    assert_eq!(outcome["found"], 1);
    assert_eq!(outcome["updated"], 1);

    let cart = state.store.find_cart(SHOP, "98765").await.unwrap().unwrap();
    let resp = oneshot_raw(state, "GET", &format!("/api/carts/{}", cart.cart_id), vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched = json_body(resp).await;
    assert_eq!(fetched["status"], "recovered");
    assert_eq!(fetched["recovered_order_id"], "1001");
  }

  // ── API ─────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn email_sent_transition_is_guarded() {
    let state = make_state().await;
    deliver(state.clone(), "carts/update", &abandoned_cart_body(), SECRET).await;
    let cart = state.store.find_cart(SHOP, "98765").await.unwrap().unwrap();
    let uri = format!("/api/carts/{}/email-sent", cart.cart_id);

    let first = json_body(oneshot_raw(state.clone(), "POST", &uri, vec![], "").await).await;
    assert_eq!(first["transitioned"], true);
    assert_eq!(first["status"], "email_sent");

    let second = json_body(oneshot_raw(state, "POST", &uri, vec![], "").await).await;
    assert_eq!(second["transitioned"], false);
  }

  #[tokio::test]
  async fn list_carts_by_status() {
    let state = make_state().await;
    deliver(state.clone(), "carts/update", &abandoned_cart_body(), SECRET).await;

    let resp = oneshot_raw(
      state.clone(),
      "GET",
      &format!("/api/carts?tenant={SHOP}&status=abandoned"),
      vec![],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

    let resp = oneshot_raw(state, "GET", "/api/carts?status=recovered", vec![], "").await;
    assert!(json_body(resp).await.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn unknown_cart_is_404() {
    let state = make_state().await;
    let resp = oneshot_raw(
      state,
      "GET",
      &format!("/api/carts/{}", uuid::Uuid::new_v4()),
      vec![],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn delete_customer_then_get_is_404() {
    let state = make_state().await;
    deliver(state.clone(), "carts/update", &abandoned_cart_body(), SECRET).await;
    let customer = state
      .store
      .find_customer(SHOP, "alice@example.com")
      .await
      .unwrap()
      .unwrap();
    let uri = format!("/api/customers/{}", customer.customer_id);

    let resp = oneshot_raw(state.clone(), "DELETE", &uri, vec![], "").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = oneshot_raw(state.clone(), "GET", &uri, vec![], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let cart = state.store.find_cart(SHOP, "98765").await.unwrap().unwrap();
    assert!(cart.customer_id.is_none());
  }

  #[tokio::test]
  async fn session_intake_then_sync() {
    let state = make_state().await;
    let session = json!({
      "conversation_id": "conv-1",
      "tenant": SHOP,
      "customer_email": "alice@example.com",
      "status": "ended",
      "summary": "asked about shipping",
      "transcript": "...",
      "metadata": { "cart": { "id": "98765", "total_price": "50.00" } },
    })
    .to_string();

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/api/sessions",
      vec![("content-type", "application/json".to_string())],
      &session,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let report = json_body(oneshot_raw(state.clone(), "POST", "/api/inquiries/sync", vec![], "").await).await;
    assert_eq!(report["inserted"], 1);

    let report = json_body(oneshot_raw(state.clone(), "POST", "/api/inquiries/sync", vec![], "").await).await;
    assert_eq!(report["inserted"], 0);
    assert_eq!(report["already_synced"], 1);

    let resp = oneshot_raw(state, "GET", "/api/inquiries/conv-1", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let inquiry = json_body(resp).await;
    assert_eq!(inquiry["cart_id"], "98765");
    assert_eq!(inquiry["summary"], "asked about shipping");
  }

  #[tokio::test]
  async fn scheduled_run_once_reports() {
    let state = make_state().await;
    let report = schedule::run_once(state.store.as_ref()).await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(report.inserted, 0);
  }

  // ── Configuration ───────────────────────────────────────────────────────────

  #[test]
  fn empty_secret_counts_as_missing() {
    let config = ServerConfig {
      webhook_secrets: HashMap::from([(SHOP.to_string(), "  ".to_string())]),
      default_webhook_secret: Some(String::new()),
      ..test_config()
    };
    assert!(config.secret_for(SHOP).is_none());
  }

  #[test]
  fn secret_lookup_ignores_case() {
    let config = ServerConfig {
      webhook_secrets: HashMap::from([("Shop.Example.COM".to_string(), SECRET.to_string())]),
      ..test_config()
    };
    assert_eq!(config.secret_for("shop.example.com"), Some(SECRET));
    assert_eq!(test_config().secret_for("shop.example.com"), Some(SECRET));
  }

  #[test]
  fn invalid_threshold_is_rejected() {
    for secs in [0, u64::MAX] {
      let config = ServerConfig {
        abandonment_threshold_secs: secs,
        ..test_config()
      };
      assert!(config.abandonment_policy().is_err());
    }
    assert!(test_config().abandonment_policy().is_ok());
  }
}
