//! Conversions between gold-layer values and their SQLite representation.
//!
//! Calendar dates are stored as `YYYY-MM-DD` text. Business keys read back
//! from a dimension arrive as a dynamically typed [`Value`] and are checked
//! against the kind the dimension declares.

use chrono::NaiveDate;
use gold_core::{
  model::Table,
  resolve::{BusinessKey, KeyColumns, KeyKind},
};
use rusqlite::types::Value;

use crate::{Error, Result};

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

// ─── Statements ──────────────────────────────────────────────────────────────

/// `INSERT INTO <table> (<columns>) VALUES (?1, …)` over the table's insert
/// columns.
pub fn insert_sql(table: Table) -> String {
  let columns = table.columns();
  let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
  format!(
    "INSERT INTO {} ({}) VALUES ({})",
    table.name(),
    columns.join(", "),
    placeholders.join(", ")
  )
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn decode_business_key(value: Value, columns: KeyColumns) -> Result<BusinessKey> {
  match (columns.kind, value) {
    (KeyKind::Int, Value::Integer(i)) => Ok(BusinessKey::Int(i)),
    (KeyKind::Text, Value::Text(s)) => Ok(BusinessKey::Text(s)),
    (kind, other) => Err(Error::Decode {
      table:   columns.table,
      column:  columns.business,
      message: format!("expected {kind:?} key, found {:?}", other.data_type()),
    }),
  }
}

pub fn decode_count(table: Table, count: i64) -> Result<u64> {
  u64::try_from(count).map_err(|_| Error::Decode {
    table,
    column: "count(*)",
    message: format!("negative row count {count}"),
  })
}
