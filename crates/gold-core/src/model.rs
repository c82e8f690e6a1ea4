//! Gold-layer rows: the star schema written by the loader.
//!
//! Four dimensions (date, municipality, product, store) and three facts
//! (sales, tourism, demographics). Each row type lists its fields in the
//! destination's declared column order; [`Table::columns`] is the matching
//! projection used by every backend.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Tables ──────────────────────────────────────────────────────────────────

/// One of the seven destination tables.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Table {
  DimDate,
  DimMunicipality,
  DimProduct,
  DimStore,
  FactSales,
  FactTourism,
  FactDemographics,
}

impl Table {
  /// Foreign-key order: every table comes after the tables it references.
  pub const CREATE_ORDER: [Table; 7] = [
    Table::DimMunicipality,
    Table::DimDate,
    Table::DimProduct,
    Table::DimStore,
    Table::FactSales,
    Table::FactTourism,
    Table::FactDemographics,
  ];

  /// Facts first, then the store dimension before the dimension it references.
  pub const CLEAR_ORDER: [Table; 7] = [
    Table::FactSales,
    Table::FactTourism,
    Table::FactDemographics,
    Table::DimStore,
    Table::DimProduct,
    Table::DimMunicipality,
    Table::DimDate,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Table::DimDate => "dim_date",
      Table::DimMunicipality => "dim_municipality",
      Table::DimProduct => "dim_product",
      Table::DimStore => "dim_store",
      Table::FactSales => "fact_sales",
      Table::FactTourism => "fact_tourism",
      Table::FactDemographics => "fact_demographics",
    }
  }

  /// Columns written on insert, in declared order. Destination-generated
  /// keys (`municipality_key`, and the fact row keys) are not listed.
  pub fn columns(self) -> &'static [&'static str] {
    match self {
      Table::DimDate => &[
        "date_key",
        "date",
        "day_of_week",
        "day_of_month",
        "day_of_year",
        "month_of_year",
        "quarter_of_year",
        "year",
        "month_name",
        "day_name",
        "is_weekend",
      ],
      Table::DimMunicipality => &["name", "municipality_code"],
      Table::DimProduct => &[
        "product_key",
        "product_id",
        "name",
        "category",
        "unit_price",
        "unit_type",
        "supplier",
      ],
      Table::DimStore => &["store_key", "store_id", "name", "address", "municipality_key"],
      Table::FactSales => &[
        "date_key",
        "product_key",
        "store_key",
        "sales_amount",
        "units_sold",
      ],
      Table::FactTourism => &[
        "date_key",
        "municipality_key",
        "accommodation_type",
        "origin_country",
        "visitor_count",
        "revenue",
      ],
      Table::FactDemographics => {
        &["date_key", "municipality_key", "gender", "population_count"]
      }
    }
  }

  pub fn is_fact(self) -> bool {
    matches!(self, Table::FactSales | Table::FactTourism | Table::FactDemographics)
  }
}

impl fmt::Display for Table {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

// ─── Dimensions ──────────────────────────────────────────────────────────────

/// One calendar day. `date_key` is the `YYYYMMDD` integer and doubles as the
/// surrogate key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRow {
  pub date_key:        i64,
  pub date:            NaiveDate,
  /// 1 = Monday … 7 = Sunday.
  pub day_of_week:     i32,
  pub day_of_month:    i32,
  pub day_of_year:     i32,
  pub month_of_year:   i32,
  pub quarter_of_year: i32,
  pub year:            i32,
  pub month_name:      String,
  pub day_name:        String,
  pub is_weekend:      bool,
}

/// A municipality awaiting insertion; the destination assigns its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMunicipality {
  pub name: String,
  pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
  /// Always equal to `product_id`.
  pub product_key: i64,
  pub product_id:  i64,
  pub name:        String,
  pub category:    String,
  pub unit_price:  f64,
  pub unit_type:   String,
  pub supplier:    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRow {
  /// Always equal to `store_id`.
  pub store_key:        i64,
  pub store_id:         i64,
  pub name:             String,
  pub address:          String,
  pub municipality_key: i64,
}

// ─── Facts ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SalesFact {
  pub date_key:     i64,
  pub product_key:  i64,
  pub store_key:    i64,
  pub sales_amount: f64,
  pub units_sold:   i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TourismFact {
  pub date_key:           i64,
  pub municipality_key:   i64,
  pub accommodation_type: String,
  pub origin_country:     String,
  pub visitor_count:      i64,
  pub revenue:            f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemographicsFact {
  pub date_key:         i64,
  pub municipality_key: i64,
  pub gender:           String,
  pub population_count: i64,
}
