//! The `WarehouseStore` trait.
//!
//! Implemented by destination backends (`gold-store-sqlite`,
//! `gold-store-postgres`). The loader depends on this abstraction only.

use std::future::Future;

use crate::{
  model::{
    DateRow, DemographicsFact, NewMunicipality, ProductRow, SalesFact, StoreRow, Table,
    TourismFact,
  },
  resolve::{BusinessKey, KeyColumns},
};

/// Abstraction over the relational destination of the gold layer.
///
/// Every write method runs in a transaction of its own: either all of its
/// rows become visible or none do. Sales arrive in batches, so they go through
/// a [`BatchWriter`] whose single transaction spans the whole stage. Loads
/// append; they never upsert.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait WarehouseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  type SalesWriter: BatchWriter<SalesFact, Error = Self::Error>;

  /// Round-trip to the destination to prove it is reachable.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Create the seven tables if they do not exist yet.
  fn create_tables(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Empty `tables` in the given order, resetting generated keys, inside one
  /// transaction. A failure on any table leaves every table untouched.
  fn clear_tables<'a>(
    &'a self,
    tables: &'a [Table],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Dimensions ────────────────────────────────────────────────────────

  fn load_dates(
    &self,
    rows: Vec<DateRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Insert municipalities; the destination assigns `municipality_key`.
  fn load_municipalities(
    &self,
    rows: Vec<NewMunicipality>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn load_products(
    &self,
    rows: Vec<ProductRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn load_stores(
    &self,
    rows: Vec<StoreRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Facts (append-only) ───────────────────────────────────────────────

  /// Open the transaction that every sales batch of this run is written in.
  fn begin_sales(
    &self,
  ) -> impl Future<Output = Result<Self::SalesWriter, Self::Error>> + Send + '_;

  fn append_tourism(
    &self,
    rows: Vec<TourismFact>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn append_demographics(
    &self,
    rows: Vec<DemographicsFact>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Every `(business, surrogate)` pair of a committed dimension.
  fn key_pairs(
    &self,
    columns: KeyColumns,
  ) -> impl Future<Output = Result<Vec<(BusinessKey, i64)>, Self::Error>> + Send + '_;

  fn row_count(&self, table: Table) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

/// An open transaction receiving one fact table in batches.
///
/// Nothing appended is visible to other readers until [`commit`]. The caller
/// must end every writer with either [`commit`] or [`rollback`].
///
/// [`commit`]: BatchWriter::commit
/// [`rollback`]: BatchWriter::rollback
pub trait BatchWriter<T>: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  fn append(
    &mut self,
    rows: Vec<T>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn commit(self) -> impl Future<Output = Result<(), Self::Error>> + Send;

  fn rollback(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
