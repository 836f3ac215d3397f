//! Core types, trait definitions and engine operations for recoup.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::RecoveryStore`]; the engine operations
//! ([`ingest`], [`recovery`], [`sync`]) take the store as an explicit handle.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cart;
pub mod classifier;
pub mod customer;
pub mod error;
pub mod event;
pub mod identity;
pub mod inquiry;
pub mod ingest;
pub mod metadata;
pub mod recovery;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
