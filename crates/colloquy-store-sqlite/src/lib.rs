//! SQLite backend for the Colloquy conversation store and knowledge index.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod similarity;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
