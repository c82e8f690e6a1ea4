//! Silver-layer readers for the gold loader.
//!
//! Reads the intermediate CSV extracts from one directory and hands the
//! loader typed, normalized records. Pure synchronous; no database
//! dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use gold_core::source::SilverSource;
//! use gold_silver::SilverDir;
//!
//! let silver = SilverDir::new("silver");
//! let stores = silver.stores().unwrap();
//! println!("{} stores", stores.len());
//! ```

pub mod error;
mod read;

use std::path::{Path, PathBuf};

pub use error::{Error, Result};
use gold_core::{
  source::{ProductRecord, SaleBatches, SilverSource, StoreRecord, TourismRecord},
  wide::{DemographicsTable, WideSchema},
};

pub const DEMOGRAPHICS_FILE: &str = "demographics.csv";
pub const TOURISM_FILE: &str = "tourism.csv";
pub const PRODUCTS_FILE: &str = "products.csv";
pub const STORES_FILE: &str = "stores.csv";
pub const SALES_FILE: &str = "grocery_sales.csv";

// ─── Public types ────────────────────────────────────────────────────────────

/// A directory of silver extracts.
#[derive(Debug, Clone)]
pub struct SilverDir {
  root:   PathBuf,
  schema: WideSchema,
}

impl SilverDir {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into(), schema: WideSchema::V1 }
  }

  /// Use a different wide demographics schema.
  pub fn with_schema(mut self, schema: WideSchema) -> Self {
    self.schema = schema;
    self
  }

  pub fn root(&self) -> &Path { &self.root }

  fn path(&self, file: &str) -> PathBuf { self.root.join(file) }
}

// ─── SilverSource impl ───────────────────────────────────────────────────────

impl SilverSource for SilverDir {
  type Error = Error;

  fn demographics(&self) -> Result<DemographicsTable> {
    read::demographics(&self.path(DEMOGRAPHICS_FILE), &self.schema)
  }

  fn tourism(&self) -> Result<Vec<TourismRecord>> { read::tourism(&self.path(TOURISM_FILE)) }

  fn products(&self) -> Result<Vec<ProductRecord>> { read::products(&self.path(PRODUCTS_FILE)) }

  fn stores(&self) -> Result<Vec<StoreRecord>> { read::stores(&self.path(STORES_FILE)) }

  fn sales(&self, batch_size: usize) -> Result<SaleBatches<'_, Error>> {
    let batches = read::SalesBatches::open(self.path(SALES_FILE), batch_size)?;
    Ok(Box::new(batches))
  }
}
