//! Error types for the silver readers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot open {path}: {source}")]
  Open {
    path:   PathBuf,
    #[source]
    source: csv::Error,
  },

  #[error("{path}: {source}")]
  Csv {
    path:   PathBuf,
    #[source]
    source: csv::Error,
  },

  /// A record parsed as CSV but a field failed normalization.
  #[error("{path} line {line}: {source}")]
  Record {
    path:   PathBuf,
    line:   u64,
    #[source]
    source: gold_core::Error,
  },

  #[error("{path}: {source}")]
  Schema {
    path:   PathBuf,
    #[source]
    source: gold_core::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
