//! JSON REST API for recoup.
//!
//! Exposes an axum [`Router`] backed by any [`recoup_core::store::RecoveryStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", recoup_api::api_router(store.clone()))
//! ```

pub mod carts;
pub mod customers;
pub mod error;
pub mod inquiries;
pub mod sessions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use recoup_core::store::RecoveryStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RecoveryStore + 'static,
{
  Router::new()
    // Carts
    .route("/carts", get(carts::list::<S>))
    .route("/carts/{id}", get(carts::get_one::<S>))
    .route("/carts/{id}/email-sent", post(carts::email_sent::<S>))
    // Customers
    .route("/customers", get(customers::list::<S>))
    .route(
      "/customers/{id}",
      get(customers::get_one::<S>).delete(customers::delete_one::<S>),
    )
    // Interaction log
    .route("/sessions", post(sessions::record::<S>))
    // Inquiries
    .route("/inquiries", get(inquiries::list::<S>))
    .route("/inquiries/sync", post(inquiries::sync::<S>))
    .route("/inquiries/{conversation_id}", get(inquiries::get_one::<S>))
    .with_state(store)
}
