//! SQLite backend for the gold warehouse.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Used for local runs and as the
//! destination in tests.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteSalesWriter, SqliteStore};

#[cfg(test)]
mod tests;
