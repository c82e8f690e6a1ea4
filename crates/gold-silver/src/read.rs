//! CSV readers for the individual silver extracts.
//!
//! Each extract is deserialized into a raw row mirroring the file's header,
//! then converted through the `gold_core::normalize` functions. Line numbers
//! in errors count the header as line 1.

use std::{
  fs::File,
  path::{Path, PathBuf},
};

use csv::{DeserializeRecordsIntoIter, ReaderBuilder, Trim};
use gold_core::{
  normalize::{normalize_product_id, normalize_store_id, parse_calendar_date},
  source::{ProductRecord, SaleRecord, StoreRecord, TourismRecord},
  wide::{DemographicsTable, WideSchema},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{Error, Result};

// ─── Raw rows ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawProduct {
  product_id: String,
  #[serde(alias = "name")]
  product_name: String,
  #[serde(alias = "category")]
  product_category: String,
  unit_price: f64,
  unit_type: String,
  supplier: String,
}

#[derive(Debug, Deserialize)]
struct RawStore {
  store_id: String,
  #[serde(alias = "name")]
  store_name: String,
  #[serde(alias = "address")]
  store_location: String,
  municipality_name: String,
  municipality_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTourism {
  date: String,
  municipality_name: String,
  municipality_code: Option<String>,
  accommodation_type: String,
  origin_country: String,
  visitor_count: i64,
  revenue: f64,
}

#[derive(Debug, Deserialize)]
struct RawSale {
  store_id: String,
  product_id: String,
  date: String,
  sales_amount: f64,
  units_sold: i64,
}

// ─── Conversions ─────────────────────────────────────────────────────────────

fn product(raw: RawProduct) -> gold_core::Result<ProductRecord> {
  Ok(ProductRecord {
    product_id: normalize_product_id(&raw.product_id)?,
    name:       raw.product_name,
    category:   raw.product_category,
    unit_price: raw.unit_price,
    unit_type:  raw.unit_type,
    supplier:   raw.supplier,
  })
}

fn store(raw: RawStore) -> gold_core::Result<StoreRecord> {
  Ok(StoreRecord {
    store_id:          normalize_store_id(&raw.store_id)?,
    name:              raw.store_name,
    address:           raw.store_location,
    municipality_name: raw.municipality_name,
    municipality_code: raw.municipality_code,
  })
}

fn tourism_record(raw: RawTourism) -> gold_core::Result<TourismRecord> {
  Ok(TourismRecord {
    date:               parse_calendar_date(&raw.date)?,
    municipality_name:  raw.municipality_name,
    municipality_code:  raw.municipality_code,
    accommodation_type: raw.accommodation_type,
    origin_country:     raw.origin_country,
    visitor_count:      raw.visitor_count,
    revenue:            raw.revenue,
  })
}

fn sale(raw: RawSale) -> gold_core::Result<SaleRecord> {
  Ok(SaleRecord {
    store_id:     normalize_store_id(&raw.store_id)?,
    product_id:   normalize_product_id(&raw.product_id)?,
    date:         parse_calendar_date(&raw.date)?,
    sales_amount: raw.sales_amount,
    units_sold:   raw.units_sold,
  })
}

// ─── Whole-file readers ──────────────────────────────────────────────────────

fn open(path: &Path) -> Result<csv::Reader<File>> {
  ReaderBuilder::new()
    .trim(Trim::All)
    .from_path(path)
    .map_err(|source| Error::Open { path: path.to_owned(), source })
}

fn read_all<R, T>(path: &Path, convert: impl Fn(R) -> gold_core::Result<T>) -> Result<Vec<T>>
where
  R: DeserializeOwned,
{
  let mut reader = open(path)?;
  let mut out = Vec::new();

  for (i, result) in reader.deserialize::<R>().enumerate() {
    let raw = result.map_err(|source| Error::Csv { path: path.to_owned(), source })?;
    let record = convert(raw).map_err(|source| Error::Record {
      path: path.to_owned(),
      line: i as u64 + 2,
      source,
    })?;
    out.push(record);
  }

  debug!(path = %path.display(), records = out.len(), "extract read");
  Ok(out)
}

pub fn products(path: &Path) -> Result<Vec<ProductRecord>> { read_all(path, product) }

pub fn stores(path: &Path) -> Result<Vec<StoreRecord>> { read_all(path, store) }

pub fn tourism(path: &Path) -> Result<Vec<TourismRecord>> { read_all(path, tourism_record) }

/// Read the wide demographics table, validating its header against `schema`.
pub fn demographics(path: &Path, schema: &WideSchema) -> Result<DemographicsTable> {
  let mut reader = open(path)?;
  let headers = reader
    .headers()
    .map_err(|source| Error::Csv { path: path.to_owned(), source })?
    .clone();
  let headers: Vec<&str> = headers.iter().collect();
  let layout = schema
    .layout(&headers)
    .map_err(|source| Error::Schema { path: path.to_owned(), source })?;

  let mut rows = Vec::new();
  for (i, result) in reader.records().enumerate() {
    let record = result.map_err(|source| Error::Csv { path: path.to_owned(), source })?;
    let fields: Vec<&str> = record.iter().collect();
    let row = layout.parse_row(&fields).map_err(|source| Error::Record {
      path: path.to_owned(),
      line: i as u64 + 2,
      source,
    })?;
    rows.push(row);
  }

  debug!(
    path = %path.display(),
    years = rows.len(),
    columns = layout.columns().len(),
    "demographics read"
  );
  Ok(DemographicsTable { layout, rows })
}

// ─── Sales stream ────────────────────────────────────────────────────────────

/// Sales in batches of at most `batch_size` rows, read lazily from disk.
///
/// Stops after the first error.
pub struct SalesBatches {
  path:       PathBuf,
  rows:       DeserializeRecordsIntoIter<File, RawSale>,
  batch_size: usize,
  line:       u64,
  done:       bool,
}

impl SalesBatches {
  pub fn open(path: PathBuf, batch_size: usize) -> Result<Self> {
    let reader = open(&path)?;
    Ok(Self {
      path,
      rows: reader.into_deserialize(),
      batch_size: batch_size.max(1),
      line: 1,
      done: false,
    })
  }
}

impl Iterator for SalesBatches {
  type Item = Result<Vec<SaleRecord>>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    let mut batch = Vec::with_capacity(self.batch_size.min(8192));
    while batch.len() < self.batch_size {
      let Some(result) = self.rows.next() else {
        self.done = true;
        break;
      };
      self.line += 1;

      let converted = result
        .map_err(|source| Error::Csv { path: self.path.clone(), source })
        .and_then(|raw| {
          sale(raw).map_err(|source| Error::Record {
            path: self.path.clone(),
            line: self.line,
            source,
          })
        });

      match converted {
        Ok(record) => batch.push(record),
        Err(e) => {
          self.done = true;
          return Some(Err(e));
        }
      }
    }

    if batch.is_empty() { None } else { Some(Ok(batch)) }
  }
}
