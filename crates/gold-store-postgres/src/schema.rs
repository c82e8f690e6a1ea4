//! PostgreSQL DDL for the star schema.

use gold_core::model::Table;

/// One `CREATE TABLE IF NOT EXISTS` per table, in foreign-key order.
pub const TABLES: [(Table, &str); 7] = [
  (
    Table::DimMunicipality,
    "CREATE TABLE IF NOT EXISTS dim_municipality (
       municipality_key  BIGSERIAL PRIMARY KEY,
       name              TEXT NOT NULL UNIQUE,
       municipality_code TEXT
     )",
  ),
  (
    Table::DimDate,
    "CREATE TABLE IF NOT EXISTS dim_date (
       date_key        BIGINT  PRIMARY KEY,
       date            DATE    NOT NULL UNIQUE,
       day_of_week     INTEGER NOT NULL,
       day_of_month    INTEGER NOT NULL,
       day_of_year     INTEGER NOT NULL,
       month_of_year   INTEGER NOT NULL,
       quarter_of_year INTEGER NOT NULL,
       year            INTEGER NOT NULL,
       month_name      TEXT    NOT NULL,
       day_name        TEXT    NOT NULL,
       is_weekend      BOOLEAN NOT NULL
     )",
  ),
  (
    Table::DimProduct,
    "CREATE TABLE IF NOT EXISTS dim_product (
       product_key BIGINT PRIMARY KEY,
       product_id  BIGINT NOT NULL UNIQUE,
       name        TEXT   NOT NULL,
       category    TEXT,
       unit_price  DOUBLE PRECISION,
       unit_type   TEXT,
       supplier    TEXT
     )",
  ),
  (
    Table::DimStore,
    "CREATE TABLE IF NOT EXISTS dim_store (
       store_key        BIGINT PRIMARY KEY,
       store_id         BIGINT NOT NULL UNIQUE,
       name             TEXT   NOT NULL,
       address          TEXT,
       municipality_key BIGINT NOT NULL REFERENCES dim_municipality(municipality_key)
     )",
  ),
  (
    Table::FactSales,
    "CREATE TABLE IF NOT EXISTS fact_sales (
       sales_key    BIGSERIAL PRIMARY KEY,
       date_key     BIGINT NOT NULL REFERENCES dim_date(date_key),
       product_key  BIGINT NOT NULL REFERENCES dim_product(product_key),
       store_key    BIGINT NOT NULL REFERENCES dim_store(store_key),
       sales_amount DOUBLE PRECISION NOT NULL,
       units_sold   BIGINT NOT NULL
     )",
  ),
  (
    Table::FactTourism,
    "CREATE TABLE IF NOT EXISTS fact_tourism (
       tourism_key        BIGSERIAL PRIMARY KEY,
       date_key           BIGINT NOT NULL REFERENCES dim_date(date_key),
       municipality_key   BIGINT NOT NULL REFERENCES dim_municipality(municipality_key),
       accommodation_type TEXT   NOT NULL,
       origin_country     TEXT   NOT NULL,
       visitor_count      BIGINT NOT NULL,
       revenue            DOUBLE PRECISION NOT NULL
     )",
  ),
  (
    Table::FactDemographics,
    "CREATE TABLE IF NOT EXISTS fact_demographics (
       demographics_key BIGSERIAL PRIMARY KEY,
       date_key         BIGINT NOT NULL REFERENCES dim_date(date_key),
       municipality_key BIGINT NOT NULL REFERENCES dim_municipality(municipality_key),
       gender           TEXT   NOT NULL,
       population_count BIGINT NOT NULL
     )",
  ),
];
