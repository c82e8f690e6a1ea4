//! Dimension builders.
//!
//! Turn silver records into dimension rows. The date dimension is generated,
//! municipality rows come from the [`crate::unify`] output, product and store
//! keys pass the business id through unchanged.

use std::collections::HashSet;

use chrono::{Datelike, Month, NaiveDate, Weekday};
use tracing::warn;

use crate::{
  Error, Result,
  model::{DateRow, NewMunicipality, ProductRow, StoreRow},
  normalize::date_key,
  resolve::KeyMap,
  source::{ProductRecord, StoreRecord},
  unify::MunicipalityEntry,
};

// ─── Date ────────────────────────────────────────────────────────────────────

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
  start: NaiveDate,
  end:   NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
    if start > end {
      return Err(Error::InvalidDateRange { start, end });
    }
    Ok(Self { start, end })
  }

  pub fn start(&self) -> NaiveDate { self.start }

  pub fn end(&self) -> NaiveDate { self.end }

  pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
    let end = self.end;
    self.start.iter_days().take_while(move |d| *d <= end)
  }
}

impl Default for DateRange {
  /// 2000-01-01 through 2030-12-31.
  fn default() -> Self {
    Self {
      start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
      end:   NaiveDate::from_ymd_opt(2030, 12, 31).unwrap_or(NaiveDate::MAX),
    }
  }
}

/// All attributes of one day, derived from the date alone.
pub fn date_row(date: NaiveDate) -> DateRow {
  let weekday = date.weekday();
  let month = date.month();
  let month_name = u8::try_from(month)
    .ok()
    .and_then(|m| Month::try_from(m).ok())
    .map(|m| m.name().to_owned())
    .unwrap_or_default();

  DateRow {
    date_key:        date_key(date),
    date,
    day_of_week:     weekday.number_from_monday() as i32,
    day_of_month:    date.day() as i32,
    day_of_year:     date.ordinal() as i32,
    month_of_year:   month as i32,
    quarter_of_year: ((month - 1) / 3 + 1) as i32,
    year:            date.year(),
    month_name,
    day_name:        date.format("%A").to_string(),
    is_weekend:      matches!(weekday, Weekday::Sat | Weekday::Sun),
  }
}

/// One row per calendar day of `range`, no gaps, no duplicates.
pub fn date_dimension(range: DateRange) -> Vec<DateRow> { range.days().map(date_row).collect() }

// ─── Municipality ────────────────────────────────────────────────────────────

pub fn municipality_rows(entries: Vec<MunicipalityEntry>) -> Vec<NewMunicipality> {
  entries
    .into_iter()
    .map(|e| NewMunicipality { name: e.name, code: e.code })
    .collect()
}

// ─── Product ─────────────────────────────────────────────────────────────────

/// `product_key` equals `product_id`. A repeated id keeps its first record.
pub fn product_rows(records: Vec<ProductRecord>) -> Vec<ProductRow> {
  let mut seen = HashSet::new();
  records
    .into_iter()
    .filter(|r| {
      let fresh = seen.insert(r.product_id);
      if !fresh {
        warn!(product_id = r.product_id, "duplicate product id, keeping first");
      }
      fresh
    })
    .map(|r| ProductRow {
      product_key: r.product_id,
      product_id:  r.product_id,
      name:        r.name,
      category:    r.category,
      unit_price:  r.unit_price,
      unit_type:   r.unit_type,
      supplier:    r.supplier,
    })
    .collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// `store_key` equals `store_id`; the municipality is resolved by name.
///
/// Fails on the first store whose municipality is unknown: a store without a
/// municipality would silently break every later join.
pub fn store_rows(records: Vec<StoreRecord>, municipalities: &KeyMap) -> Result<Vec<StoreRow>> {
  let mut seen = HashSet::new();
  let mut rows = Vec::with_capacity(records.len());

  for r in records {
    if !seen.insert(r.store_id) {
      warn!(store_id = r.store_id, "duplicate store id, keeping first");
      continue;
    }
    let municipality_key = municipalities
      .by_name(r.municipality_name.trim())
      .ok_or_else(|| Error::UnresolvedMunicipality {
        store_id:     r.store_id,
        municipality: r.municipality_name.clone(),
      })?;
    rows.push(StoreRow {
      store_key: r.store_id,
      store_id: r.store_id,
      name: r.name,
      address: r.address,
      municipality_key,
    });
  }

  Ok(rows)
}
