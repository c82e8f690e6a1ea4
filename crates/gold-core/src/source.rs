//! Silver-layer records and the [`SilverSource`] trait.
//!
//! Readers (e.g. `gold-silver`) implement the trait; the loader only sees
//! typed, normalized records. [`InMemorySource`] serves tests and embedders.

use std::convert::Infallible;

use chrono::NaiveDate;

use crate::wide::DemographicsTable;

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
  pub product_id: i64,
  pub name:       String,
  pub category:   String,
  pub unit_price: f64,
  pub unit_type:  String,
  pub supplier:   String,
}

/// A store, referencing its municipality by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
  pub store_id:          i64,
  pub name:              String,
  pub address:           String,
  pub municipality_name: String,
  pub municipality_code: Option<String>,
}

/// One (date, municipality, accommodation, origin) observation.
#[derive(Debug, Clone, PartialEq)]
pub struct TourismRecord {
  pub date:               NaiveDate,
  pub municipality_name:  String,
  pub municipality_code:  Option<String>,
  pub accommodation_type: String,
  pub origin_country:     String,
  pub visitor_count:      i64,
  pub revenue:            f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
  pub store_id:     i64,
  pub product_id:   i64,
  pub date:         NaiveDate,
  pub sales_amount: f64,
  pub units_sold:   i64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Batches of sales records, each at most the requested size.
pub type SaleBatches<'a, E> = Box<dyn Iterator<Item = Result<Vec<SaleRecord>, E>> + Send + 'a>;

/// Access to the immutable silver extracts of one run.
///
/// Every method may be called more than once; each call reads the extract
/// afresh.
pub trait SilverSource {
  type Error: std::error::Error + Send + Sync + 'static;

  fn demographics(&self) -> Result<DemographicsTable, Self::Error>;

  fn tourism(&self) -> Result<Vec<TourismRecord>, Self::Error>;

  fn products(&self) -> Result<Vec<ProductRecord>, Self::Error>;

  fn stores(&self) -> Result<Vec<StoreRecord>, Self::Error>;

  /// Stream sales in batches of at most `batch_size` rows. The full extract
  /// is never required to fit in memory.
  fn sales(&self, batch_size: usize) -> Result<SaleBatches<'_, Self::Error>, Self::Error>;
}

// ─── In-memory source ────────────────────────────────────────────────────────

/// A [`SilverSource`] over records already held in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
  pub demographics: DemographicsTable,
  pub tourism:      Vec<TourismRecord>,
  pub products:     Vec<ProductRecord>,
  pub stores:       Vec<StoreRecord>,
  pub sales:        Vec<SaleRecord>,
}

impl SilverSource for InMemorySource {
  type Error = Infallible;

  fn demographics(&self) -> Result<DemographicsTable, Infallible> { Ok(self.demographics.clone()) }

  fn tourism(&self) -> Result<Vec<TourismRecord>, Infallible> { Ok(self.tourism.clone()) }

  fn products(&self) -> Result<Vec<ProductRecord>, Infallible> { Ok(self.products.clone()) }

  fn stores(&self) -> Result<Vec<StoreRecord>, Infallible> { Ok(self.stores.clone()) }

  fn sales(&self, batch_size: usize) -> Result<SaleBatches<'_, Infallible>, Infallible> {
    Ok(Box::new(
      self.sales.chunks(batch_size.max(1)).map(|chunk| Ok(chunk.to_vec())),
    ))
  }
}
