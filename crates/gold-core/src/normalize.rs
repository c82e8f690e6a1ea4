//! Business-key normalization.
//!
//! Pure functions that turn the identifiers and dates found in the silver
//! extracts into the typed keys used by the dimensions.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::{Error, Result};

const STORE_PREFIX: &str = "STORE_";
const PRODUCT_PREFIX: &str = "PROD_";

/// `"STORE_012"` and `"12"` both normalize to `12`.
pub fn normalize_store_id(raw: &str) -> Result<i64> {
  normalize_prefixed_id(raw, STORE_PREFIX, "store")
}

/// `"PROD_7"` and `"7"` both normalize to `7`.
pub fn normalize_product_id(raw: &str) -> Result<i64> {
  normalize_prefixed_id(raw, PRODUCT_PREFIX, "product")
}

fn normalize_prefixed_id(raw: &str, prefix: &str, entity: &'static str) -> Result<i64> {
  let trimmed = raw.trim();
  let digits = trimmed.strip_prefix(prefix).unwrap_or(trimmed);
  digits
    .parse::<i64>()
    .ok()
    .filter(|id| *id >= 0)
    .ok_or_else(|| Error::InvalidKey { entity, value: raw.to_owned() })
}

/// Parse a calendar date written as `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or
/// RFC 3339. Any time component is discarded.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate> {
  let s = raw.trim();
  if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    return Ok(d);
  }
  if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
    return Ok(dt.date());
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.date_naive());
  }
  Err(Error::InvalidDate(raw.to_owned()))
}

/// The `YYYYMMDD` integer for `date`.
pub fn date_key(date: NaiveDate) -> i64 {
  i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

/// Yearly observations are keyed to January 1st of that year.
pub fn year_start_key(year: i32) -> Result<i64> {
  NaiveDate::from_ymd_opt(year, 1, 1)
    .map(date_key)
    .ok_or_else(|| Error::InvalidDate(year.to_string()))
}
