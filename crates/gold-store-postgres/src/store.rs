//! [`PgStore`]: the PostgreSQL implementation of [`WarehouseStore`].

use gold_core::{
  model::{
    DateRow, DemographicsFact, NewMunicipality, ProductRow, SalesFact, StoreRow, Table,
    TourismFact,
  },
  resolve::{BusinessKey, KeyColumns, KeyKind},
  store::{BatchWriter, WarehouseStore},
};
use sqlx::{
  PgConnection, PgPool, Postgres, QueryBuilder, Transaction,
  postgres::PgPoolOptions,
  query_builder::Separated,
};
use tracing::{debug, info};

use crate::{DatabaseConfig, Error, Result, schema::TABLES};

/// PostgreSQL accepts at most this many bind parameters per statement.
const BIND_LIMIT: usize = 65_535;

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  /// Build a lazily connecting pool. Nothing touches the network until the
  /// first query, so an unreachable server surfaces from [`WarehouseStore::ping`].
  pub fn new(config: &DatabaseConfig) -> Self {
    info!(host = %config.host, port = config.port, db = %config.db, "postgres pool configured");
    let pool = PgPoolOptions::new()
      .max_connections(config.max_connections)
      .acquire_timeout(config.acquire_timeout())
      .connect_lazy_with(config.connect_options());
    Self { pool }
  }

  /// Insert `rows` into `table` in a transaction of its own.
  async fn insert<'r, T, F>(&self, table: Table, rows: &'r [T], push: F) -> Result<u64>
  where
    T: Sync,
    F: FnMut(Separated<'_, 'r, Postgres, &'static str>, &'r T) + Send,
  {
    if rows.is_empty() {
      return Ok(0);
    }

    let mut tx = self.pool.begin().await?;
    let written = insert_rows(&mut tx, table, rows, push).await?;
    tx.commit().await?;

    debug!(%table, rows = written, "committed");
    Ok(written)
  }
}

/// Multi-row `INSERT` of `rows` into `table` on `conn`, chunked below the
/// bind limit.
async fn insert_rows<'r, T, F>(
  conn: &mut PgConnection,
  table: Table,
  rows: &'r [T],
  mut push: F,
) -> Result<u64>
where
  T: Sync,
  F: FnMut(Separated<'_, 'r, Postgres, &'static str>, &'r T) + Send,
{
  let columns = table.columns();
  let per_statement = BIND_LIMIT / columns.len();
  let head = format!("INSERT INTO {} ({}) ", table.name(), columns.join(", "));

  let mut written = 0;
  for chunk in rows.chunks(per_statement) {
    let mut qb: QueryBuilder<'r, Postgres> = QueryBuilder::new(&head);
    qb.push_values(chunk, &mut push);
    written += qb.build().execute(&mut *conn).await?.rows_affected();
  }
  Ok(written)
}

fn push_sale<'r>(mut b: Separated<'_, 'r, Postgres, &'static str>, r: &'r SalesFact) {
  b.push_bind(r.date_key)
    .push_bind(r.product_key)
    .push_bind(r.store_key)
    .push_bind(r.sales_amount)
    .push_bind(r.units_sold);
}

// ─── WarehouseStore impl ─────────────────────────────────────────────────────

impl WarehouseStore for PgStore {
  type Error = Error;
  type SalesWriter = PgSalesWriter;

  async fn ping(&self) -> Result<()> {
    sqlx::query("SELECT 1").execute(&self.pool).await?;
    Ok(())
  }

  async fn create_tables(&self) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    for (table, ddl) in TABLES {
      sqlx::query(ddl).execute(&mut *tx).await?;
      debug!(%table, "ensured");
    }
    tx.commit().await?;
    info!(tables = TABLES.len(), "tables created");
    Ok(())
  }

  async fn clear_tables<'a>(&'a self, tables: &'a [Table]) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    for table in tables {
      let sql = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", table.name());
      sqlx::query(&sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    debug!(tables = tables.len(), "cleared");
    Ok(())
  }

  // ── Dimensions ────────────────────────────────────────────────────────────

  async fn load_dates(&self, rows: Vec<DateRow>) -> Result<u64> {
    self
      .insert(Table::DimDate, &rows, |mut b, r| {
        b.push_bind(r.date_key)
          .push_bind(r.date)
          .push_bind(r.day_of_week)
          .push_bind(r.day_of_month)
          .push_bind(r.day_of_year)
          .push_bind(r.month_of_year)
          .push_bind(r.quarter_of_year)
          .push_bind(r.year)
          .push_bind(&r.month_name)
          .push_bind(&r.day_name)
          .push_bind(r.is_weekend);
      })
      .await
  }

  async fn load_municipalities(&self, rows: Vec<NewMunicipality>) -> Result<u64> {
    self
      .insert(Table::DimMunicipality, &rows, |mut b, r| {
        b.push_bind(&r.name).push_bind(&r.code);
      })
      .await
  }

  async fn load_products(&self, rows: Vec<ProductRow>) -> Result<u64> {
    self
      .insert(Table::DimProduct, &rows, |mut b, r| {
        b.push_bind(r.product_key)
          .push_bind(r.product_id)
          .push_bind(&r.name)
          .push_bind(&r.category)
          .push_bind(r.unit_price)
          .push_bind(&r.unit_type)
          .push_bind(&r.supplier);
      })
      .await
  }

  async fn load_stores(&self, rows: Vec<StoreRow>) -> Result<u64> {
    self
      .insert(Table::DimStore, &rows, |mut b, r| {
        b.push_bind(r.store_key)
          .push_bind(r.store_id)
          .push_bind(&r.name)
          .push_bind(&r.address)
          .push_bind(r.municipality_key);
      })
      .await
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn begin_sales(&self) -> Result<PgSalesWriter> {
    Ok(PgSalesWriter { tx: self.pool.begin().await? })
  }

  async fn append_tourism(&self, rows: Vec<TourismFact>) -> Result<u64> {
    self
      .insert(Table::FactTourism, &rows, |mut b, r| {
        b.push_bind(r.date_key)
          .push_bind(r.municipality_key)
          .push_bind(&r.accommodation_type)
          .push_bind(&r.origin_country)
          .push_bind(r.visitor_count)
          .push_bind(r.revenue);
      })
      .await
  }

  async fn append_demographics(&self, rows: Vec<DemographicsFact>) -> Result<u64> {
    self
      .insert(Table::FactDemographics, &rows, |mut b, r| {
        b.push_bind(r.date_key)
          .push_bind(r.municipality_key)
          .push_bind(&r.gender)
          .push_bind(r.population_count);
      })
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn key_pairs(&self, columns: KeyColumns) -> Result<Vec<(BusinessKey, i64)>> {
    let table = columns.table.name();
    let pairs = match columns.kind {
      KeyKind::Int => {
        let sql = format!(
          "SELECT {}::BIGINT, {}::BIGINT FROM {table}",
          columns.business, columns.surrogate
        );
        sqlx::query_as::<_, (i64, i64)>(&sql)
          .fetch_all(&self.pool)
          .await?
          .into_iter()
          .map(|(b, s)| (BusinessKey::Int(b), s))
          .collect()
      }
      KeyKind::Text => {
        let sql = format!(
          "SELECT {}::TEXT, {}::BIGINT FROM {table}",
          columns.business, columns.surrogate
        );
        sqlx::query_as::<_, (String, i64)>(&sql)
          .fetch_all(&self.pool)
          .await?
          .into_iter()
          .map(|(b, s)| (BusinessKey::Text(b), s))
          .collect()
      }
    };
    Ok(pairs)
  }

  async fn row_count(&self, table: Table) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.name());
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
    u64::try_from(count).map_err(|_| Error::Decode {
      table,
      column: "count(*)",
      message: format!("negative row count {count}"),
    })
  }
}

// ─── Sales writer ────────────────────────────────────────────────────────────

/// Sales batches inserted into one transaction held for the whole stage.
/// Dropping the writer without committing rolls the transaction back.
pub struct PgSalesWriter {
  tx: Transaction<'static, Postgres>,
}

impl BatchWriter<SalesFact> for PgSalesWriter {
  type Error = Error;

  async fn append(&mut self, rows: Vec<SalesFact>) -> Result<u64> {
    insert_rows(&mut self.tx, Table::FactSales, &rows, push_sale).await
  }

  async fn commit(self) -> Result<()> {
    self.tx.commit().await?;
    debug!(table = %Table::FactSales, "committed");
    Ok(())
  }

  async fn rollback(self) -> Result<()> {
    self.tx.rollback().await?;
    debug!(table = %Table::FactSales, "rolled back");
    Ok(())
  }
}
