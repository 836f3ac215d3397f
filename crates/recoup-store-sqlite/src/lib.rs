//! SQLite backend for the recoup store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Natural-key writes are
//! insert-then-merge inside an immediate transaction; status changes are
//! conditional updates.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
