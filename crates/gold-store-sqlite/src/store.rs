//! [`SqliteStore`]: the SQLite implementation of [`WarehouseStore`].

use std::path::Path;

use gold_core::{
  model::{
    DateRow, DemographicsFact, NewMunicipality, ProductRow, SalesFact, StoreRow, Table,
    TourismFact,
  },
  resolve::{BusinessKey, KeyColumns},
  store::{BatchWriter, WarehouseStore},
};
use rusqlite::{CachedStatement, Connection, params, types::Value};
use tracing::debug;

use crate::{
  Result,
  encode::{decode_business_key, decode_count, encode_date, insert_sql},
  schema::{PRAGMAS, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A gold warehouse in one SQLite database, with WAL journaling and foreign
/// keys enforced.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open `path`, applying the pragmas and creating missing tables in one
  /// transaction.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Same as [`open`](Self::open) against a private in-memory database.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        create_in_transaction(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert `rows` into `table` inside one transaction.
  async fn insert<T, F>(&self, table: Table, rows: Vec<T>, bind: F) -> Result<u64>
  where
    T: Send + 'static,
    F: Fn(&mut CachedStatement<'_>, &T) -> rusqlite::Result<usize> + Send + 'static,
  {
    if rows.is_empty() {
      return Ok(0);
    }

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0u64;
        {
          let mut stmt = tx.prepare_cached(&insert_sql(table))?;
          for row in &rows {
            written += bind(&mut stmt, row)? as u64;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;

    debug!(%table, rows = written, "committed");
    Ok(written)
  }
}

fn create_in_transaction(conn: &mut Connection) -> rusqlite::Result<()> {
  let tx = conn.transaction()?;
  tx.execute_batch(SCHEMA)?;
  tx.commit()
}

// ─── WarehouseStore impl ─────────────────────────────────────────────────────

impl WarehouseStore for SqliteStore {
  type Error = crate::Error;
  type SalesWriter = SqliteSalesWriter;

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn create_tables(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        create_in_transaction(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn clear_tables<'a>(&'a self, tables: &'a [Table]) -> Result<()> {
    let names: Vec<&'static str> = tables.iter().map(|t| t.name()).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for name in &names {
          tx.execute(&format!("DELETE FROM {name}"), [])?;
          tx.execute("DELETE FROM sqlite_sequence WHERE name = ?1", params![name])?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(tables = tables.len(), "cleared");
    Ok(())
  }

  // ── Dimensions ────────────────────────────────────────────────────────────

  async fn load_dates(&self, rows: Vec<DateRow>) -> Result<u64> {
    self
      .insert(Table::DimDate, rows, |stmt, r| {
        stmt.execute(params![
          r.date_key,
          encode_date(r.date),
          r.day_of_week,
          r.day_of_month,
          r.day_of_year,
          r.month_of_year,
          r.quarter_of_year,
          r.year,
          r.month_name,
          r.day_name,
          r.is_weekend,
        ])
      })
      .await
  }

  async fn load_municipalities(&self, rows: Vec<NewMunicipality>) -> Result<u64> {
    self
      .insert(Table::DimMunicipality, rows, |stmt, r| stmt.execute(params![r.name, r.code]))
      .await
  }

  async fn load_products(&self, rows: Vec<ProductRow>) -> Result<u64> {
    self
      .insert(Table::DimProduct, rows, |stmt, r| {
        stmt.execute(params![
          r.product_key,
          r.product_id,
          r.name,
          r.category,
          r.unit_price,
          r.unit_type,
          r.supplier,
        ])
      })
      .await
  }

  async fn load_stores(&self, rows: Vec<StoreRow>) -> Result<u64> {
    self
      .insert(Table::DimStore, rows, |stmt, r| {
        stmt.execute(params![r.store_key, r.store_id, r.name, r.address, r.municipality_key])
      })
      .await
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn begin_sales(&self) -> Result<SqliteSalesWriter> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
      })
      .await?;
    Ok(SqliteSalesWriter { conn: self.conn.clone() })
  }

  async fn append_tourism(&self, rows: Vec<TourismFact>) -> Result<u64> {
    self
      .insert(Table::FactTourism, rows, |stmt, r| {
        stmt.execute(params![
          r.date_key,
          r.municipality_key,
          r.accommodation_type,
          r.origin_country,
          r.visitor_count,
          r.revenue,
        ])
      })
      .await
  }

  async fn append_demographics(&self, rows: Vec<DemographicsFact>) -> Result<u64> {
    self
      .insert(Table::FactDemographics, rows, |stmt, r| {
        stmt.execute(params![r.date_key, r.municipality_key, r.gender, r.population_count])
      })
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn key_pairs(&self, columns: KeyColumns) -> Result<Vec<(BusinessKey, i64)>> {
    let sql = format!(
      "SELECT {}, {} FROM {}",
      columns.business,
      columns.surrogate,
      columns.table.name()
    );

    let raw: Vec<(Value, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raw
      .into_iter()
      .map(|(business, surrogate)| Ok((decode_business_key(business, columns)?, surrogate)))
      .collect()
  }

  async fn row_count(&self, table: Table) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.name());
    let count: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
      .await?;
    decode_count(table, count)
  }
}

// ─── Sales writer ────────────────────────────────────────────────────────────

/// Sales batches appended inside one open transaction on the store's
/// connection. No other write may use the store until the writer is
/// committed or rolled back.
pub struct SqliteSalesWriter {
  conn: tokio_rusqlite::Connection,
}

impl SqliteSalesWriter {
  async fn end(self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    debug!(table = %Table::FactSales, statement = sql, "sales transaction ended");
    Ok(())
  }
}

impl BatchWriter<SalesFact> for SqliteSalesWriter {
  type Error = crate::Error;

  async fn append(&mut self, rows: Vec<SalesFact>) -> Result<u64> {
    if rows.is_empty() {
      return Ok(0);
    }

    let written = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&insert_sql(Table::FactSales))?;
        let mut written = 0u64;
        for r in &rows {
          written += stmt.execute(params![
            r.date_key,
            r.product_key,
            r.store_key,
            r.sales_amount,
            r.units_sold
          ])? as u64;
        }
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn commit(self) -> Result<()> { self.end("COMMIT").await }

  async fn rollback(self) -> Result<()> { self.end("ROLLBACK").await }
}
