//! Integration tests: full loader runs against an in-memory `SqliteStore`.

use chrono::NaiveDate;
use gold_core::{
  Error as CoreError, LoadOptions, LoadReport, Loader, Stage, Table,
  dimension::DateRange,
  resolve::{BusinessKey, KeyColumns},
  source::{InMemorySource, ProductRecord, SaleRecord, StoreRecord, TourismRecord},
  store::WarehouseStore,
  transform::KeyPolicy,
  wide::{DemographicsTable, WideSchema},
};
use rusqlite::types::FromSql;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// First column of every row `sql` returns.
async fn column<T>(s: &SqliteStore, sql: &'static str) -> Vec<T>
where
  T: FromSql + Send + 'static,
{
  s.conn
    .call(move |conn| {
      let mut stmt = conn.prepare(sql)?;
      let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<T>>>()?;
      Ok(rows)
    })
    .await
    .unwrap()
}

async fn count(s: &SqliteStore, table: Table) -> u64 { s.row_count(table).await.unwrap() }

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

fn demographics() -> DemographicsTable {
  DemographicsTable::parse(
    &WideSchema::V1,
    &[
      "år",
      "Mariehamn Kvinnor",
      "Mariehamn Män",
      "Mariehamn Total",
      "Sund Kvinnor",
      "Sund Män",
      "Åland Kvinnor",
      "Åland Män",
    ],
    &[
      vec!["2020", "6000", "5800", "11800", "510", "520", "15000", "14900"],
      vec!["2021", "6050", "5810", "11860", "505", "522", "15020", "14950"],
    ],
  )
  .unwrap()
}

fn product(id: i64, name: &str, price: f64) -> ProductRecord {
  ProductRecord {
    product_id: id,
    name:       name.into(),
    category:   "Groceries".into(),
    unit_price: price,
    unit_type:  "pcs".into(),
    supplier:   "Ålands Centralandelslag".into(),
  }
}

fn shop(id: i64, municipality: &str, code: Option<&str>) -> StoreRecord {
  StoreRecord {
    store_id:          id,
    name:              format!("Butik {id}"),
    address:           format!("Storagatan {id}"),
    municipality_name: municipality.into(),
    municipality_code: code.map(str::to_owned),
  }
}

fn visit(date: NaiveDate, municipality: &str, code: &str, kind: &str) -> TourismRecord {
  TourismRecord {
    date,
    municipality_name: municipality.into(),
    municipality_code: Some(code.into()),
    accommodation_type: kind.into(),
    origin_country: "Sweden".into(),
    visitor_count: 40,
    revenue: 1800.0,
  }
}

fn sale(store_id: i64, product_id: i64, date: NaiveDate, amount: f64, units: i64) -> SaleRecord {
  SaleRecord { store_id, product_id, date, sales_amount: amount, units_sold: units }
}

fn source() -> InMemorySource {
  InMemorySource {
    demographics: demographics(),
    tourism:      vec![
      visit(ymd(2023, 6, 1), "Mariehamn", "478", "hotel"),
      visit(ymd(2023, 6, 2), "Sund", "295", "camping"),
      visit(ymd(2023, 6, 3), "Sund", "295", "houseboat"),
    ],
    products:     vec![product(10, "Mjölk", 1.35), product(11, "Limpa", 3.90)],
    stores:       vec![shop(1, "Mariehamn", Some("478")), shop(2, "Sund", None)],
    sales:        vec![
      sale(1, 10, ymd(2023, 1, 1), 13.5, 10),
      sale(1, 11, ymd(2023, 1, 1), 7.8, 2),
      sale(2, 10, ymd(2023, 1, 2), 2.7, 2),
      sale(2, 11, ymd(2023, 1, 3), 3.9, 1),
      sale(1, 10, ymd(2023, 1, 3), 1.35, 1),
    ],
  }
}

fn options() -> LoadOptions {
  LoadOptions {
    date_range: DateRange::new(ymd(2020, 1, 1), ymd(2023, 12, 31)).unwrap(),
    ..LoadOptions::default()
  }
}

async fn load(s: &SqliteStore, src: &InMemorySource, options: LoadOptions) -> LoadReport {
  Loader::new(s, src, options).run().await.expect("load run")
}

// ─── Full run ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_populates_every_table() {
  let s = store().await;
  let report = load(&s, &source(), options()).await;

  // 2020 is a leap year.
  assert_eq!(count(&s, Table::DimDate).await, 366 + 3 * 365);
  assert_eq!(count(&s, Table::DimMunicipality).await, 2);
  assert_eq!(count(&s, Table::DimProduct).await, 2);
  assert_eq!(count(&s, Table::DimStore).await, 2);
  assert_eq!(count(&s, Table::FactSales).await, 5);
  assert_eq!(count(&s, Table::FactTourism).await, 3);
  // Two real municipalities, two genders, two years; totals are skipped.
  assert_eq!(count(&s, Table::FactDemographics).await, 8);

  for table in Table::CREATE_ORDER {
    assert_eq!(report.rows(table), count(&s, table).await, "{table}");
  }
}

#[tokio::test]
async fn aggregate_region_is_excluded_and_its_counts_dropped() {
  let s = store().await;
  let report = load(&s, &source(), options()).await;

  let names: Vec<String> = column(&s, "SELECT name FROM dim_municipality ORDER BY name").await;
  assert_eq!(names, vec!["Mariehamn", "Sund"]);
  assert_eq!(report.dropped(Table::FactDemographics), 4);
  assert_eq!(report.dropped(Table::FactSales), 0);
}

#[tokio::test]
async fn municipality_codes_come_from_any_source() {
  let s = store().await;
  load(&s, &source(), options()).await;

  let codes: Vec<Option<String>> =
    column(&s, "SELECT municipality_code FROM dim_municipality ORDER BY name").await;
  assert_eq!(codes, vec![Some("478".to_owned()), Some("295".to_owned())]);
}

#[tokio::test]
async fn unexpected_accommodation_type_is_loaded_unchanged() {
  let s = store().await;
  load(&s, &source(), options()).await;

  let kinds: Vec<String> =
    column(&s, "SELECT DISTINCT accommodation_type FROM fact_tourism ORDER BY 1").await;
  assert_eq!(kinds, vec!["camping", "hotel", "houseboat"]);
}

// ─── Keys ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn product_and_store_keys_equal_business_ids() {
  let s = store().await;
  load(&s, &source(), options()).await;

  let products: Vec<i64> =
    column(&s, "SELECT COUNT(*) FROM dim_product WHERE product_key <> product_id").await;
  assert_eq!(products, vec![0]);
  let stores: Vec<i64> =
    column(&s, "SELECT COUNT(*) FROM dim_store WHERE store_key <> store_id").await;
  assert_eq!(stores, vec![0]);
}

#[tokio::test]
async fn store_municipality_matches_dimension_key() {
  let s = store().await;
  load(&s, &source(), options()).await;

  let mismatched: Vec<i64> = column(
    &s,
    "SELECT COUNT(*) FROM dim_store st
     JOIN dim_municipality m ON m.municipality_key = st.municipality_key
     WHERE (st.store_id = 1 AND m.name <> 'Mariehamn')
        OR (st.store_id = 2 AND m.name <> 'Sund')",
  )
  .await;
  assert_eq!(mismatched, vec![0]);

  let orphans: Vec<i64> = column(
    &s,
    "SELECT COUNT(*) FROM fact_sales f
     LEFT JOIN dim_store st ON st.store_key = f.store_key
     WHERE st.store_key IS NULL",
  )
  .await;
  assert_eq!(orphans, vec![0]);
}

#[tokio::test]
async fn date_key_resolves_to_itself() {
  let s = store().await;
  load(&s, &source(), options()).await;

  let pairs = s.key_pairs(KeyColumns::DATE).await.unwrap();
  assert_eq!(pairs.len(), 366 + 3 * 365);
  assert!(pairs.iter().all(|(b, k)| *b == BusinessKey::Int(*k)));

  let dates: Vec<String> =
    column(&s, "SELECT date FROM dim_date WHERE date_key = 20230101").await;
  assert_eq!(dates, vec!["2023-01-01"]);
}

#[tokio::test]
async fn demographics_are_keyed_to_january_first() {
  let s = store().await;
  load(&s, &source(), options()).await;

  let keys: Vec<i64> =
    column(&s, "SELECT DISTINCT date_key FROM fact_demographics ORDER BY 1").await;
  assert_eq!(keys, vec![20200101, 20210101]);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unresolved_store_municipality_aborts_before_facts() {
  let s = store().await;
  let mut src = source();
  // The aggregate region never becomes a municipality row.
  src.stores.push(shop(3, "Åland", None));

  let err = Loader::new(&s, &src, options()).run().await.unwrap_err();
  let CoreError::Stage { stage, source } = err else {
    panic!("expected a stage failure");
  };
  assert_eq!(stage, Stage::LoadStores);
  assert!(matches!(
    source.downcast_ref::<CoreError>(),
    Some(CoreError::UnresolvedMunicipality { store_id: 3, .. })
  ));

  assert_eq!(count(&s, Table::DimStore).await, 0);
  assert_eq!(count(&s, Table::FactSales).await, 0);
  assert_eq!(count(&s, Table::FactTourism).await, 0);
  assert_eq!(count(&s, Table::FactDemographics).await, 0);
  // Stages committed before the failure stay committed.
  assert_eq!(count(&s, Table::DimMunicipality).await, 2);
}

#[tokio::test]
async fn unknown_product_fails_or_drops_by_policy() {
  let mut src = source();
  src.sales.push(sale(1, 99, ymd(2023, 1, 4), 5.0, 1));

  let s = store().await;
  let err = Loader::new(&s, &src, options()).run().await.unwrap_err();
  assert!(matches!(err, CoreError::Stage { stage: Stage::LoadSales, .. }));

  let s = store().await;
  let report = load(&s, &src, LoadOptions { sales_policy: KeyPolicy::Drop, ..options() }).await;
  assert_eq!(report.dropped(Table::FactSales), 1);
  assert_eq!(count(&s, Table::FactSales).await, 5);
}

#[tokio::test]
async fn failed_sales_stage_leaves_no_batches_behind() {
  let mut src = source();
  src.sales.push(sale(1, 99, ymd(2023, 1, 4), 5.0, 1));

  let s = store().await;
  let opts = LoadOptions { sales_batch_size: 1, ..options() };
  let err = Loader::new(&s, &src, opts.clone()).run().await.unwrap_err();
  assert!(matches!(err, CoreError::Stage { stage: Stage::LoadSales, .. }));

  assert_eq!(count(&s, Table::FactSales).await, 0);
  assert_eq!(count(&s, Table::DimProduct).await, 2);
  assert_eq!(count(&s, Table::DimStore).await, 2);

  // The rolled-back transaction does not linger on the connection.
  src.sales.pop();
  let report = load(&s, &src, opts).await;
  assert_eq!(report.rows(Table::FactSales), 5);
  assert_eq!(count(&s, Table::FactSales).await, 5);
}

#[tokio::test]
async fn sale_outside_date_range_is_unresolved() {
  let mut src = source();
  src.sales.push(sale(1, 10, ymd(2031, 1, 1), 5.0, 1));

  let s = store().await;
  let report = load(&s, &src, LoadOptions { sales_policy: KeyPolicy::Drop, ..options() }).await;
  assert_eq!(report.dropped(Table::FactSales), 1);
}

// ─── Batching ────────────────────────────────────────────────────────────────

const SALES_ROWS: &str = "SELECT date_key || '|' || product_key || '|' || store_key || '|' ||
                                 sales_amount || '|' || units_sold
                          FROM fact_sales ORDER BY 1";

#[tokio::test]
async fn sales_batch_size_does_not_change_result() {
  let src = source();

  let small = store().await;
  let report = load(&small, &src, LoadOptions { sales_batch_size: 1, ..options() }).await;
  assert_eq!(report.sales_batches, 5);

  let large = store().await;
  let report = load(&large, &src, LoadOptions { sales_batch_size: 1000, ..options() }).await;
  assert_eq!(report.sales_batches, 1);

  let a: Vec<String> = column(&small, SALES_ROWS).await;
  let b: Vec<String> = column(&large, SALES_ROWS).await;
  assert_eq!(a, b);
  assert_eq!(a.len(), 5);
}

// ─── Clear and rerun ─────────────────────────────────────────────────────────

#[tokio::test]
async fn clear_is_all_or_nothing() {
  let s = store().await;
  load(&s, &source(), options()).await;

  s.conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER block_store_clear BEFORE DELETE ON dim_store
         BEGIN SELECT RAISE(ABORT, 'clear blocked'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  assert!(s.clear_tables(&Table::CLEAR_ORDER).await.is_err());
  // fact_sales was emptied before dim_store failed; the rollback restores it.
  assert_eq!(count(&s, Table::FactSales).await, 5);
  assert_eq!(count(&s, Table::DimStore).await, 2);
}

#[tokio::test]
async fn rerun_replaces_rather_than_appends() {
  let s = store().await;
  let src = source();
  let first = load(&s, &src, options()).await;
  let second = load(&s, &src, options()).await;

  assert_eq!(first.rows, second.rows);
  for table in Table::CREATE_ORDER {
    assert_eq!(count(&s, table).await, second.rows(table), "{table}");
  }

  let keys: Vec<i64> =
    column(&s, "SELECT municipality_key FROM dim_municipality ORDER BY 1").await;
  assert_eq!(keys, vec![1, 2]);
  let sales_keys: Vec<i64> = column(&s, "SELECT MIN(sales_key) FROM fact_sales").await;
  assert_eq!(sales_keys, vec![1]);
}

#[tokio::test]
async fn create_tables_is_idempotent() {
  let s = store().await;
  s.create_tables().await.unwrap();
  s.create_tables().await.unwrap();
  s.ping().await.unwrap();
  assert_eq!(count(&s, Table::DimDate).await, 0);
}
