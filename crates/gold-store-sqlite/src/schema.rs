//! SQL schema for the SQLite gold store.
//!
//! Dates are stored as `YYYY-MM-DD` text and booleans as `0`/`1`. Generated
//! keys use `AUTOINCREMENT` so that clearing a table can reset them through
//! `sqlite_sequence`.

/// Connection settings, applied outside any transaction.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// The seven tables in foreign-key order; idempotent thanks to
/// `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS dim_municipality (
    municipality_key  INTEGER PRIMARY KEY AUTOINCREMENT,
    name              TEXT NOT NULL UNIQUE,
    municipality_code TEXT
);

CREATE TABLE IF NOT EXISTS dim_date (
    date_key        INTEGER PRIMARY KEY,   -- YYYYMMDD
    date            TEXT    NOT NULL UNIQUE,
    day_of_week     INTEGER NOT NULL,      -- 1 = Monday
    day_of_month    INTEGER NOT NULL,
    day_of_year     INTEGER NOT NULL,
    month_of_year   INTEGER NOT NULL,
    quarter_of_year INTEGER NOT NULL,
    year            INTEGER NOT NULL,
    month_name      TEXT    NOT NULL,
    day_name        TEXT    NOT NULL,
    is_weekend      INTEGER NOT NULL
);

-- product_key and store_key carry the business id unchanged.
CREATE TABLE IF NOT EXISTS dim_product (
    product_key INTEGER PRIMARY KEY,
    product_id  INTEGER NOT NULL UNIQUE,
    name        TEXT    NOT NULL,
    category    TEXT,
    unit_price  REAL,
    unit_type   TEXT,
    supplier    TEXT
);

CREATE TABLE IF NOT EXISTS dim_store (
    store_key        INTEGER PRIMARY KEY,
    store_id         INTEGER NOT NULL UNIQUE,
    name             TEXT    NOT NULL,
    address          TEXT,
    municipality_key INTEGER NOT NULL REFERENCES dim_municipality(municipality_key)
);

-- Facts are append-only between clears.
CREATE TABLE IF NOT EXISTS fact_sales (
    sales_key    INTEGER PRIMARY KEY AUTOINCREMENT,
    date_key     INTEGER NOT NULL REFERENCES dim_date(date_key),
    product_key  INTEGER NOT NULL REFERENCES dim_product(product_key),
    store_key    INTEGER NOT NULL REFERENCES dim_store(store_key),
    sales_amount REAL    NOT NULL,
    units_sold   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS fact_tourism (
    tourism_key        INTEGER PRIMARY KEY AUTOINCREMENT,
    date_key           INTEGER NOT NULL REFERENCES dim_date(date_key),
    municipality_key   INTEGER NOT NULL REFERENCES dim_municipality(municipality_key),
    accommodation_type TEXT    NOT NULL,
    origin_country     TEXT    NOT NULL,
    visitor_count      INTEGER NOT NULL,
    revenue            REAL    NOT NULL
);

CREATE TABLE IF NOT EXISTS fact_demographics (
    demographics_key INTEGER PRIMARY KEY AUTOINCREMENT,
    date_key         INTEGER NOT NULL REFERENCES dim_date(date_key),
    municipality_key INTEGER NOT NULL REFERENCES dim_municipality(municipality_key),
    gender           TEXT    NOT NULL,
    population_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sales_date    ON fact_sales(date_key);
CREATE INDEX IF NOT EXISTS idx_tourism_muni  ON fact_tourism(municipality_key);
CREATE INDEX IF NOT EXISTS idx_demo_muni     ON fact_demographics(municipality_key);
";
