//! Fact transforms.
//!
//! Each transform derives the date key from the source's own date
//! representation, swaps every business key for its surrogate through a
//! [`KeyMap`], and projects to the fact's declared columns. What happens to a
//! row whose key does not resolve is chosen per fact by [`KeyPolicy`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
  Error, Result,
  model::{DemographicsFact, SalesFact, Table, TourismFact},
  normalize::{date_key, year_start_key},
  resolve::KeyMap,
  source::{SaleRecord, TourismRecord},
  wide::DemographicsTable,
};

/// Accommodation types the tourism extract is expected to use.
pub const ACCOMMODATION_TYPES: &[&str] = &["guesthouse", "camping", "hotel"];

/// What to do with a fact row whose foreign key has no dimension entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPolicy {
  /// Skip the row and count it.
  Drop,
  /// Abort the stage.
  Fail,
}

/// Fact rows ready to append, plus the number of rows dropped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed<T> {
  pub rows:    Vec<T>,
  pub dropped: u64,
}

/// Resolve one foreign key, honouring `policy`. `Ok(None)` means drop.
fn lookup(
  resolved: Option<i64>,
  policy: KeyPolicy,
  table: Table,
  column: &'static str,
  key: impl FnOnce() -> String,
) -> Result<Option<i64>> {
  match (resolved, policy) {
    (Some(k), _) => Ok(Some(k)),
    (None, KeyPolicy::Drop) => Ok(None),
    (None, KeyPolicy::Fail) => Err(Error::UnresolvedKey { table, column, key: key() }),
  }
}

// ─── Sales ───────────────────────────────────────────────────────────────────

/// Transform one batch of sales. Rows are independent, so any batching of
/// the extract yields the same multiset of facts.
pub fn transform_sales(
  batch: &[SaleRecord],
  dates: &KeyMap,
  products: &KeyMap,
  stores: &KeyMap,
  policy: KeyPolicy,
) -> Result<Transformed<SalesFact>> {
  let mut rows = Vec::with_capacity(batch.len());
  let mut dropped = 0;

  for sale in batch {
    let business_date = date_key(sale.date);
    let date = lookup(dates.by_id(business_date), policy, Table::FactSales, "date_key", || {
      business_date.to_string()
    })?;
    let product = lookup(
      products.by_id(sale.product_id),
      policy,
      Table::FactSales,
      "product_key",
      || sale.product_id.to_string(),
    )?;
    let store = lookup(stores.by_id(sale.store_id), policy, Table::FactSales, "store_key", || {
      sale.store_id.to_string()
    })?;

    match (date, product, store) {
      (Some(date_key), Some(product_key), Some(store_key)) => rows.push(SalesFact {
        date_key,
        product_key,
        store_key,
        sales_amount: sale.sales_amount,
        units_sold: sale.units_sold,
      }),
      _ => dropped += 1,
    }
  }

  Ok(Transformed { rows, dropped })
}

// ─── Tourism ─────────────────────────────────────────────────────────────────

/// Distinct accommodation types outside [`ACCOMMODATION_TYPES`]. Each one is
/// logged; the rows themselves are loaded unchanged.
pub fn unexpected_accommodation_types(records: &[TourismRecord]) -> BTreeSet<String> {
  let unexpected: BTreeSet<String> = records
    .iter()
    .map(|r| r.accommodation_type.as_str())
    .filter(|t| !ACCOMMODATION_TYPES.contains(t))
    .map(str::to_owned)
    .collect();
  for value in &unexpected {
    warn!(accommodation_type = %value, "unexpected accommodation type");
  }
  unexpected
}

pub fn transform_tourism(
  records: &[TourismRecord],
  dates: &KeyMap,
  municipalities: &KeyMap,
  policy: KeyPolicy,
) -> Result<Transformed<TourismFact>> {
  let mut rows = Vec::with_capacity(records.len());
  let mut dropped = 0;

  for record in records {
    let business_date = date_key(record.date);
    let date = lookup(dates.by_id(business_date), policy, Table::FactTourism, "date_key", || {
      business_date.to_string()
    })?;
    let municipality = lookup(
      municipalities.by_name(record.municipality_name.trim()),
      policy,
      Table::FactTourism,
      "municipality_key",
      || record.municipality_name.clone(),
    )?;

    match (date, municipality) {
      (Some(date_key), Some(municipality_key)) => rows.push(TourismFact {
        date_key,
        municipality_key,
        accommodation_type: record.accommodation_type.clone(),
        origin_country: record.origin_country.clone(),
        visitor_count: record.visitor_count,
        revenue: record.revenue,
      }),
      _ => dropped += 1,
    }
  }

  Ok(Transformed { rows, dropped })
}

// ─── Demographics ────────────────────────────────────────────────────────────

/// One cell of the wide table, before key substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
  pub date_key:         i64,
  pub municipality:     String,
  pub gender:           String,
  pub population_count: i64,
}

/// Reshape the wide table into long rows, column by column.
pub fn unpivot_demographics(table: &DemographicsTable) -> Result<Vec<Observation>> {
  let columns = table.layout.columns();
  let mut out = Vec::with_capacity(columns.len() * table.rows.len());

  for (i, column) in columns.iter().enumerate() {
    for row in &table.rows {
      out.push(Observation {
        date_key:         year_start_key(row.year)?,
        municipality:     column.municipality.clone(),
        gender:           column.gender.clone(),
        population_count: row.counts[i],
      });
    }
  }

  Ok(out)
}

pub fn transform_demographics(
  table: &DemographicsTable,
  dates: &KeyMap,
  municipalities: &KeyMap,
  policy: KeyPolicy,
) -> Result<Transformed<DemographicsFact>> {
  let observations = unpivot_demographics(table)?;
  let mut rows = Vec::with_capacity(observations.len());
  let mut dropped = 0;

  for obs in observations {
    let date = lookup(dates.by_id(obs.date_key), policy, Table::FactDemographics, "date_key", || {
      obs.date_key.to_string()
    })?;
    let municipality = lookup(
      municipalities.by_name(&obs.municipality),
      policy,
      Table::FactDemographics,
      "municipality_key",
      || obs.municipality.clone(),
    )?;

    match (date, municipality) {
      (Some(date_key), Some(municipality_key)) => rows.push(DemographicsFact {
        date_key,
        municipality_key,
        gender: obs.gender,
        population_count: obs.population_count,
      }),
      _ => dropped += 1,
    }
  }

  Ok(Transformed { rows, dropped })
}
