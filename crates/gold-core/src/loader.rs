//! The silver-to-gold orchestrator.
//!
//! [`Loader::run`] executes the [`Plan`] stage by stage. Each stage writes
//! through its own store transaction, so a failure leaves the stages already
//! committed intact and aborts the rest of the run. Sales batches share one
//! transaction that is committed only after the last batch.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  dimension::{DateRange, date_dimension, municipality_rows, product_rows, store_rows},
  error::BoxError,
  model::Table,
  pipeline::{Artifact, Plan, Stage},
  resolve::{KeyColumns, KeyMap, resolve_keys},
  source::SilverSource,
  store::{BatchWriter, WarehouseStore},
  transform::{
    KeyPolicy, transform_demographics, transform_sales, transform_tourism,
    unexpected_accommodation_types,
  },
  unify::{DEFAULT_AGGREGATE_REGION, IdentityUnifier},
};

pub const DEFAULT_SALES_BATCH_SIZE: usize = 100_000;

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LoadOptions {
  pub date_range:          DateRange,
  /// Name of the whole-region rollup excluded from the municipality dimension.
  pub aggregate_region:    String,
  pub sales_batch_size:    usize,
  pub sales_policy:        KeyPolicy,
  pub tourism_policy:      KeyPolicy,
  pub demographics_policy: KeyPolicy,
}

impl Default for LoadOptions {
  fn default() -> Self {
    Self {
      date_range:          DateRange::default(),
      aggregate_region:    DEFAULT_AGGREGATE_REGION.to_owned(),
      sales_batch_size:    DEFAULT_SALES_BATCH_SIZE,
      sales_policy:        KeyPolicy::Fail,
      tourism_policy:      KeyPolicy::Fail,
      demographics_policy: KeyPolicy::Drop,
    }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// What a completed run wrote.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
  pub run_id:        Uuid,
  /// Rows written per table.
  pub rows:          BTreeMap<Table, u64>,
  /// Fact rows skipped because a key did not resolve.
  pub dropped:       BTreeMap<Table, u64>,
  pub sales_batches: u64,
}

impl LoadReport {
  pub fn rows(&self, table: Table) -> u64 { self.rows.get(&table).copied().unwrap_or(0) }

  pub fn dropped(&self, table: Table) -> u64 { self.dropped.get(&table).copied().unwrap_or(0) }

  pub fn total_dropped(&self) -> u64 { self.dropped.values().sum() }

  fn record(&mut self, table: Table, written: u64) {
    *self.rows.entry(table).or_default() += written;
  }

  fn record_dropped(&mut self, table: Table, dropped: u64) {
    if dropped > 0 {
      *self.dropped.entry(table).or_default() += dropped;
    }
  }
}

// ─── Loader ──────────────────────────────────────────────────────────────────

/// Key maps read back from committed dimensions.
#[derive(Default)]
struct KeyMaps {
  dates:          Option<KeyMap>,
  municipalities: Option<KeyMap>,
  products:       Option<KeyMap>,
  stores:         Option<KeyMap>,
}

fn require(slot: &Option<KeyMap>, artifact: Artifact) -> Result<&KeyMap> {
  slot
    .as_ref()
    .ok_or_else(|| Error::Plan(format!("{artifact:?} requested before it was built")))
}

/// Rebuilds the gold model in `store` from the extracts in `source`.
pub struct Loader<'a, W, S> {
  store:   &'a W,
  source:  &'a S,
  options: LoadOptions,
}

impl<'a, W, S> Loader<'a, W, S>
where
  W: WarehouseStore,
  S: SilverSource,
{
  pub fn new(store: &'a W, source: &'a S, options: LoadOptions) -> Self {
    Self { store, source, options }
  }

  pub fn options(&self) -> &LoadOptions { &self.options }

  /// Clear every table, then rebuild dimensions and facts.
  pub async fn run(&self) -> Result<LoadReport> { self.run_plan(&Plan::standard()?).await }

  /// Execute `plan`. A failed connection check aborts before any table is
  /// touched; a failed stage aborts the remaining stages.
  pub async fn run_plan(&self, plan: &Plan) -> Result<LoadReport> {
    if self.options.sales_batch_size == 0 {
      return Err(Error::InvalidBatchSize);
    }

    let run_id = Uuid::new_v4();
    let span = info_span!("load", %run_id);

    async {
      self.store.ping().await.map_err(|e| Error::Connection(Box::new(e)))?;
      info!("destination reachable");

      let mut report = LoadReport { run_id, ..LoadReport::default() };
      let mut keys = KeyMaps::default();

      for &stage in plan.stages() {
        self
          .execute(stage, &mut keys, &mut report)
          .instrument(info_span!("stage", %stage))
          .await
          .map_err(|source| Error::Stage { stage, source })?;
      }

      if report.total_dropped() > 0 {
        warn!(dropped = report.total_dropped(), "some fact rows had unresolved keys");
      }
      info!("load complete");
      Ok::<_, Error>(report)
    }
    .instrument(span)
    .await
  }

  async fn execute(
    &self,
    stage: Stage,
    keys: &mut KeyMaps,
    report: &mut LoadReport,
  ) -> Result<(), BoxError> {
    match stage {
      Stage::ClearTables => {
        self.store.clear_tables(&Table::CLEAR_ORDER).await?;
        info!(tables = Table::CLEAR_ORDER.len(), "tables cleared");
      }

      // ── Dimensions ────────────────────────────────────────────────────

      Stage::LoadDates => {
        let rows = date_dimension(self.options.date_range);
        let written = self.store.load_dates(rows).await?;
        self.loaded(report, Table::DimDate, written);
      }

      Stage::LoadMunicipalities => {
        let demographics = self.source.demographics()?;
        let stores = self.source.stores()?;
        let tourism = self.source.tourism()?;
        let entries = IdentityUnifier::new(&self.options.aggregate_region).unify(
          demographics.layout.municipalities(),
          &stores,
          &tourism,
        );
        let without_code = entries.iter().filter(|e| e.code.is_none()).count();
        debug!(municipalities = entries.len(), without_code, "identities unified");
        let written = self.store.load_municipalities(municipality_rows(entries)).await?;
        self.loaded(report, Table::DimMunicipality, written);
      }

      Stage::LoadProducts => {
        let rows = product_rows(self.source.products()?);
        let written = self.store.load_products(rows).await?;
        self.loaded(report, Table::DimProduct, written);
      }

      Stage::LoadStores => {
        let municipalities = require(&keys.municipalities, Artifact::MunicipalityKeys)?;
        let rows = store_rows(self.source.stores()?, municipalities)?;
        let written = self.store.load_stores(rows).await?;
        self.loaded(report, Table::DimStore, written);
      }

      // ── Key maps ──────────────────────────────────────────────────────

      Stage::ResolveDateKeys => {
        keys.dates = Some(resolve_keys(self.store, KeyColumns::DATE).await?);
      }
      Stage::ResolveMunicipalityKeys => {
        keys.municipalities = Some(resolve_keys(self.store, KeyColumns::MUNICIPALITY).await?);
      }
      Stage::ResolveProductKeys => {
        keys.products = Some(resolve_keys(self.store, KeyColumns::PRODUCT).await?);
      }
      Stage::ResolveStoreKeys => {
        keys.stores = Some(resolve_keys(self.store, KeyColumns::STORE).await?);
      }

      // ── Facts ─────────────────────────────────────────────────────────

      Stage::LoadSales => {
        let dates = require(&keys.dates, Artifact::DateKeys)?;
        let products = require(&keys.products, Artifact::ProductKeys)?;
        let stores = require(&keys.stores, Artifact::StoreKeys)?;

        let batches = self.source.sales(self.options.sales_batch_size)?;
        let mut writer = self.store.begin_sales().await?;
        let mut staged = LoadReport::default();

        let appended = async {
          for (index, batch) in batches.enumerate() {
            let batch = batch?;
            let out =
              transform_sales(&batch, dates, products, stores, self.options.sales_policy)?;
            let written = writer.append(out.rows).await?;
            debug!(batch = index + 1, read = batch.len(), written, "sales batch appended");
            staged.record(Table::FactSales, written);
            staged.record_dropped(Table::FactSales, out.dropped);
            staged.sales_batches += 1;
          }
          Ok::<_, BoxError>(())
        }
        .await;

        if let Err(err) = appended {
          if let Err(rollback) = writer.rollback().await {
            warn!(error = %rollback, "sales rollback failed");
          }
          return Err(err);
        }
        writer.commit().await?;

        report.record(Table::FactSales, staged.rows(Table::FactSales));
        report.record_dropped(Table::FactSales, staged.dropped(Table::FactSales));
        report.sales_batches += staged.sales_batches;
        info!(
          table = %Table::FactSales,
          rows = report.rows(Table::FactSales),
          batches = report.sales_batches,
          "loaded"
        );
      }

      Stage::LoadTourism => {
        let dates = require(&keys.dates, Artifact::DateKeys)?;
        let municipalities = require(&keys.municipalities, Artifact::MunicipalityKeys)?;

        let records = self.source.tourism()?;
        unexpected_accommodation_types(&records);
        let out = transform_tourism(&records, dates, municipalities, self.options.tourism_policy)?;
        report.record_dropped(Table::FactTourism, out.dropped);
        let written = self.store.append_tourism(out.rows).await?;
        self.loaded(report, Table::FactTourism, written);
      }

      Stage::LoadDemographics => {
        let dates = require(&keys.dates, Artifact::DateKeys)?;
        let municipalities = require(&keys.municipalities, Artifact::MunicipalityKeys)?;

        let table = self.source.demographics()?;
        let out =
          transform_demographics(&table, dates, municipalities, self.options.demographics_policy)?;
        report.record_dropped(Table::FactDemographics, out.dropped);
        let written = self.store.append_demographics(out.rows).await?;
        self.loaded(report, Table::FactDemographics, written);
      }
    }

    Ok(())
  }

  fn loaded(&self, report: &mut LoadReport, table: Table, written: u64) {
    report.record(table, written);
    let dropped = report.dropped(table);
    if dropped > 0 {
      info!(%table, rows = written, dropped, "loaded");
    } else {
      info!(%table, rows = written, "loaded");
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use chrono::NaiveDate;

  use super::*;
  use crate::{
    model::{
      DateRow, DemographicsFact, NewMunicipality, ProductRow, SalesFact, StoreRow, TourismFact,
    },
    resolve::BusinessKey,
    source::{InMemorySource, ProductRecord, SaleRecord, StoreRecord},
    wide::{DemographicsTable, WideSchema},
  };

  #[derive(Debug, thiserror::Error)]
  #[error("fake store: {0}")]
  struct FakeError(&'static str);

  /// Records every call; fails `ping` or one table's load on demand.
  #[derive(Default)]
  struct RecordingStore {
    unreachable: bool,
    fail_on:     Option<Table>,
    calls:       Arc<Mutex<Vec<String>>>,
    municipals:  Mutex<Vec<String>>,
  }

  struct RecordingSales {
    fail:  bool,
    calls: Arc<Mutex<Vec<String>>>,
  }

  impl BatchWriter<SalesFact> for RecordingSales {
    type Error = FakeError;

    async fn append(&mut self, rows: Vec<SalesFact>) -> Result<u64, FakeError> {
      self.calls.lock().unwrap().push("fact_sales".into());
      if self.fail {
        return Err(FakeError("write refused"));
      }
      Ok(rows.len() as u64)
    }

    async fn commit(self) -> Result<(), FakeError> {
      self.calls.lock().unwrap().push("commit".into());
      Ok(())
    }

    async fn rollback(self) -> Result<(), FakeError> {
      self.calls.lock().unwrap().push("rollback".into());
      Ok(())
    }
  }

  impl RecordingStore {
    fn note(&self, table: Table, rows: usize) -> Result<u64, FakeError> {
      self.calls.lock().unwrap().push(table.name().to_owned());
      if self.fail_on == Some(table) {
        return Err(FakeError("write refused"));
      }
      Ok(rows as u64)
    }

    fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
  }

  impl WarehouseStore for RecordingStore {
    type Error = FakeError;
    type SalesWriter = RecordingSales;

    async fn ping(&self) -> Result<(), FakeError> {
      if self.unreachable { Err(FakeError("connection refused")) } else { Ok(()) }
    }

    async fn create_tables(&self) -> Result<(), FakeError> { Ok(()) }

    async fn clear_tables<'a>(&'a self, _tables: &'a [Table]) -> Result<(), FakeError> {
      self.calls.lock().unwrap().push("clear".into());
      Ok(())
    }

    async fn load_dates(&self, rows: Vec<DateRow>) -> Result<u64, FakeError> {
      self.note(Table::DimDate, rows.len())
    }

    async fn load_municipalities(&self, rows: Vec<NewMunicipality>) -> Result<u64, FakeError> {
      self.municipals.lock().unwrap().extend(rows.iter().map(|m| m.name.clone()));
      self.note(Table::DimMunicipality, rows.len())
    }

    async fn load_products(&self, rows: Vec<ProductRow>) -> Result<u64, FakeError> {
      self.note(Table::DimProduct, rows.len())
    }

    async fn load_stores(&self, rows: Vec<StoreRow>) -> Result<u64, FakeError> {
      self.note(Table::DimStore, rows.len())
    }

    async fn begin_sales(&self) -> Result<RecordingSales, FakeError> {
      self.calls.lock().unwrap().push("begin".into());
      Ok(RecordingSales {
        fail:  self.fail_on == Some(Table::FactSales),
        calls: Arc::clone(&self.calls),
      })
    }

    async fn append_tourism(&self, rows: Vec<TourismFact>) -> Result<u64, FakeError> {
      self.note(Table::FactTourism, rows.len())
    }

    async fn append_demographics(&self, rows: Vec<DemographicsFact>) -> Result<u64, FakeError> {
      self.note(Table::FactDemographics, rows.len())
    }

    async fn key_pairs(
      &self,
      columns: KeyColumns,
    ) -> Result<Vec<(BusinessKey, i64)>, FakeError> {
      Ok(match columns.table {
        Table::DimMunicipality => self
          .municipals
          .lock()
          .unwrap()
          .iter()
          .enumerate()
          .map(|(i, n)| (BusinessKey::Text(n.clone()), i as i64 + 1))
          .collect(),
        Table::DimDate => vec![(BusinessKey::Int(20200115), 20200115)],
        Table::DimProduct => vec![(BusinessKey::Int(1), 1)],
        Table::DimStore => vec![(BusinessKey::Int(1), 1)],
        _ => Vec::new(),
      })
    }

    async fn row_count(&self, _table: Table) -> Result<u64, FakeError> { Ok(0) }
  }

  fn source() -> InMemorySource {
    InMemorySource {
      demographics: DemographicsTable::parse(&WideSchema::V1, &["år", "Sund Män"], &[vec![
        "2020", "500",
      ]])
      .unwrap(),
      tourism:      Vec::new(),
      products:     vec![ProductRecord {
        product_id: 1,
        name:       "Bread".into(),
        category:   "Bakery".into(),
        unit_price: 2.0,
        unit_type:  "pcs".into(),
        supplier:   "Bageri".into(),
      }],
      stores:       vec![StoreRecord {
        store_id:          1,
        name:              "Sund Butik".into(),
        address:           "Kastelholm".into(),
        municipality_name: "Sund".into(),
        municipality_code: Some("295".into()),
      }],
      sales:        Vec::new(),
    }
  }

  fn sale(product_id: i64) -> SaleRecord {
    SaleRecord {
      store_id: 1,
      product_id,
      date: NaiveDate::from_ymd_opt(2020, 1, 15).unwrap(),
      sales_amount: 4.0,
      units_sold: 2,
    }
  }

  fn sales_calls(store: &RecordingStore) -> Vec<String> {
    let calls = store.calls();
    let begin = calls.iter().position(|c| c == "begin").unwrap();
    calls[begin..calls.len().min(begin + 5)].to_vec()
  }

  fn options() -> LoadOptions {
    LoadOptions {
      date_range: DateRange::new(
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
      )
      .unwrap(),
      ..LoadOptions::default()
    }
  }

  #[tokio::test]
  async fn unreachable_destination_touches_nothing() {
    let store = RecordingStore { unreachable: true, ..Default::default() };
    let src = source();
    let err = Loader::new(&store, &src, options()).run().await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert!(store.calls().is_empty());
  }

  #[tokio::test]
  async fn failed_stage_aborts_the_rest() {
    let store = RecordingStore { fail_on: Some(Table::DimProduct), ..Default::default() };
    let src = source();
    let err = Loader::new(&store, &src, options()).run().await.unwrap_err();

    assert!(matches!(err, Error::Stage { stage: Stage::LoadProducts, .. }));
    assert_eq!(store.calls(), vec!["clear", "dim_date", "dim_municipality", "dim_product"]);
  }

  #[tokio::test]
  async fn zero_batch_size_is_rejected() {
    let store = RecordingStore::default();
    let src = source();
    let opts = LoadOptions { sales_batch_size: 0, ..options() };
    let err = Loader::new(&store, &src, opts).run().await.unwrap_err();
    assert!(matches!(err, Error::InvalidBatchSize));
  }

  #[tokio::test]
  async fn sales_batches_commit_once() {
    let store = RecordingStore::default();
    let src = InMemorySource { sales: vec![sale(1), sale(1), sale(1)], ..source() };
    let opts = LoadOptions { sales_batch_size: 2, ..options() };
    let report = Loader::new(&store, &src, opts).run().await.unwrap();

    assert_eq!(report.rows(Table::FactSales), 3);
    assert_eq!(report.sales_batches, 2);
    assert_eq!(sales_calls(&store), vec![
      "begin",
      "fact_sales",
      "fact_sales",
      "commit",
      "fact_tourism"
    ]);
  }

  #[tokio::test]
  async fn unresolved_sale_rolls_back_earlier_batches() {
    let store = RecordingStore::default();
    let src = InMemorySource { sales: vec![sale(1), sale(1), sale(99)], ..source() };
    let opts = LoadOptions { sales_batch_size: 1, ..options() };
    let err = Loader::new(&store, &src, opts).run().await.unwrap_err();

    assert!(matches!(err, Error::Stage { stage: Stage::LoadSales, .. }));
    assert_eq!(sales_calls(&store), vec!["begin", "fact_sales", "fact_sales", "rollback"]);
  }

  #[tokio::test]
  async fn failed_sales_write_rolls_back() {
    let store = RecordingStore { fail_on: Some(Table::FactSales), ..Default::default() };
    let src = InMemorySource { sales: vec![sale(1)], ..source() };
    let err = Loader::new(&store, &src, options()).run().await.unwrap_err();

    assert!(matches!(err, Error::Stage { stage: Stage::LoadSales, .. }));
    assert_eq!(sales_calls(&store), vec!["begin", "fact_sales", "rollback"]);
  }
}
