//! PostgreSQL backend for the gold warehouse.
//!
//! The production destination. Writes go through a [`sqlx::PgPool`]; every
//! trait method that writes opens its own transaction, and a
//! [`PgSalesWriter`] holds one transaction across all sales batches.

mod schema;
mod store;

pub mod config;
pub mod error;

pub use config::DatabaseConfig;
pub use error::{Error, Result};
pub use store::{PgSalesWriter, PgStore};
