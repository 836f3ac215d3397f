//! The `RecoveryStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `recoup-store-sqlite`).
//! Higher layers (`recoup-api`, `recoup-webhook`) and the engine operations in
//! this crate depend on this abstraction, not on any concrete backend. The
//! store is the single source of truth; nothing above it caches state.
//!
//! Every write keyed on a natural key is an atomic "insert or merge"
//! primitive. Every status change is a conditional update guarded by
//! [`CartStatus::predecessors`](crate::cart::CartStatus::predecessors), so
//! concurrent or repeated deliveries can never move a cart backwards.

use std::{collections::HashSet, future::Future};

use uuid::Uuid;

use crate::{
  cart::{Attribution, Cart, CartQuery, CartUpsert, NewCart},
  customer::{Customer, NewCustomer},
  inquiry::{Inquiry, InquiryUpsert, InteractionSession, NewInquiry, NewSession},
};

/// Abstraction over a recoup store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RecoveryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Customers ─────────────────────────────────────────────────────────

  /// Insert a customer, or merge into the existing one for
  /// `(tenant, email)`.
  ///
  /// Must be safe under concurrent calls for the same new email: exactly one
  /// row results, and the loser of the race merges instead of failing.
  fn upsert_customer(
    &self,
    input: NewCustomer,
  ) -> impl Future<Output = Result<Customer, Self::Error>> + Send + '_;

  fn get_customer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send + '_;

  /// Look up by natural key. `email` must already be normalised.
  fn find_customer<'a>(
    &'a self,
    tenant: &'a str,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send + 'a;

  fn list_customers<'a>(
    &'a self,
    tenant: &'a str,
  ) -> impl Future<Output = Result<Vec<Customer>, Self::Error>> + Send + 'a;

  /// Delete a customer. Carts that referenced it keep their history with the
  /// reference cleared. Returns `false` if no such customer existed.
  fn delete_customer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Carts ─────────────────────────────────────────────────────────────

  /// Write an abandoned cart keyed on `(tenant, upstream_cart_id)`.
  ///
  /// A new key creates an `abandoned` cart. An existing, unrecovered cart is
  /// merged in place without touching its status. A recovered cart is left
  /// untouched.
  fn upsert_abandoned_cart(
    &self,
    input: NewCart,
  ) -> impl Future<Output = Result<CartUpsert, Self::Error>> + Send + '_;

  fn get_cart(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Cart>, Self::Error>> + Send + '_;

  /// Look up by natural key.
  fn find_cart<'a>(
    &'a self,
    tenant: &'a str,
    upstream_cart_id: &'a str,
  ) -> impl Future<Output = Result<Option<Cart>, Self::Error>> + Send + 'a;

  fn list_carts<'a>(
    &'a self,
    query: &'a CartQuery,
  ) -> impl Future<Output = Result<Vec<Cart>, Self::Error>> + Send + 'a;

  /// All carts for `(tenant, email)` whose status is recoverable.
  fn recoverable_carts<'a>(
    &'a self,
    tenant: &'a str,
    email: &'a str,
  ) -> impl Future<Output = Result<Vec<Cart>, Self::Error>> + Send + 'a;

  /// `abandoned → email_sent`. Returns `false` if the cart was not in a
  /// state that allows the transition (or does not exist).
  fn mark_email_sent(
    &self,
    cart_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// `abandoned | email_sent → recovered`, recording `attribution` alongside
  /// the existing metadata. Returns `false` if the guard did not match.
  fn mark_recovered(
    &self,
    cart_id: Uuid,
    attribution: Attribution,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Interaction log ───────────────────────────────────────────────────

  /// Record or refresh a raw interaction-log row keyed on conversation id.
  fn record_session(
    &self,
    input: NewSession,
  ) -> impl Future<Output = Result<InteractionSession, Self::Error>> + Send + '_;

  /// Every session with status `ended` and a non-null summary.
  fn ended_sessions(
    &self,
  ) -> impl Future<Output = Result<Vec<InteractionSession>, Self::Error>> + Send + '_;

  // ── Inquiries ─────────────────────────────────────────────────────────

  /// The conversation ids already reconciled into inquiries.
  fn inquiry_conversation_ids(
    &self,
  ) -> impl Future<Output = Result<HashSet<String>, Self::Error>> + Send + '_;

  /// Insert an inquiry, or refresh the existing one for its conversation id.
  /// A refresh never clears a recorded response.
  fn upsert_inquiry(
    &self,
    input: NewInquiry,
  ) -> impl Future<Output = Result<InquiryUpsert, Self::Error>> + Send + '_;

  fn get_inquiry<'a>(
    &'a self,
    conversation_id: &'a str,
  ) -> impl Future<Output = Result<Option<Inquiry>, Self::Error>> + Send + 'a;

  fn list_inquiries<'a>(
    &'a self,
    tenant: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<Inquiry>, Self::Error>> + Send + 'a;
}
