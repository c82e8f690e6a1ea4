//! Error type for `gold-store-sqlite`.

use gold_core::model::Table;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A stored value did not have the type its column promises.
  #[error("cannot decode {table}.{column}: {message}")]
  Decode {
    table:   Table,
    column:  &'static str,
    message: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
