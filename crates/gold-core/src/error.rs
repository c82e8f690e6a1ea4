//! Error types for `gold-core`.

use thiserror::Error;

use crate::{model::Table, pipeline::Stage};

/// Boxed error from a storage backend or source reader.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  /// The destination could not be reached; nothing was touched.
  #[error("destination unreachable: {0}")]
  Connection(#[source] BoxError),

  /// A stage raised mid-run. Stages committed before it stay committed.
  #[error("stage {stage} failed: {source}")]
  Stage {
    stage:  Stage,
    #[source]
    source: BoxError,
  },

  #[error("store {store_id} references unknown municipality {municipality:?}")]
  UnresolvedMunicipality { store_id: i64, municipality: String },

  #[error("{table}: no {column} for business key {key}")]
  UnresolvedKey {
    table:  Table,
    column: &'static str,
    key:    String,
  },

  #[error("wide schema v{version}: {message}")]
  Schema { version: u32, message: String },

  #[error("invalid plan: {0}")]
  Plan(String),

  #[error("invalid date range: {start} is after {end}")]
  InvalidDateRange {
    start: chrono::NaiveDate,
    end:   chrono::NaiveDate,
  },

  #[error("invalid {entity} id: {value:?}")]
  InvalidKey { entity: &'static str, value: String },

  #[error("invalid date: {0:?}")]
  InvalidDate(String),

  #[error("sales batch size must be at least 1")]
  InvalidBatchSize,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
