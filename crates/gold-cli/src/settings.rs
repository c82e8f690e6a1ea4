//! Layered runtime settings.
//!
//! Loader options: built-in defaults, then the optional TOML file, then
//! `GOLD_*` environment variables. Database options come from `POSTGRES_*`
//! variables only.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::NaiveDate;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use gold_core::{
  LoadOptions,
  dimension::DateRange,
  loader::DEFAULT_SALES_BATCH_SIZE,
  transform::KeyPolicy,
  unify::DEFAULT_AGGREGATE_REGION,
};
use gold_store_postgres::DatabaseConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub silver_dir:          PathBuf,
  pub sales_batch_size:    usize,
  pub date_start:          NaiveDate,
  pub date_end:            NaiveDate,
  pub aggregate_region:    String,
  pub sales_policy:        KeyPolicy,
  pub tourism_policy:      KeyPolicy,
  pub demographics_policy: KeyPolicy,
}

impl Default for Settings {
  fn default() -> Self {
    let options = LoadOptions::default();
    Self {
      silver_dir:          PathBuf::from("silver"),
      sales_batch_size:    DEFAULT_SALES_BATCH_SIZE,
      date_start:          options.date_range.start(),
      date_end:            options.date_range.end(),
      aggregate_region:    DEFAULT_AGGREGATE_REGION.to_owned(),
      sales_policy:        options.sales_policy,
      tourism_policy:      options.tourism_policy,
      demographics_policy: options.demographics_policy,
    }
  }
}

impl Settings {
  /// Read `path` if it exists, then apply `GOLD_*` overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::from_builder(
      Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(Environment::with_prefix("GOLD")),
    )
    .with_context(|| format!("failed to load settings from {}", path.display()))
  }

  fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
    let settings = builder.build().context("failed to read settings")?;
    settings.try_deserialize().context("failed to deserialise Settings")
  }

  pub fn load_options(&self) -> anyhow::Result<LoadOptions> {
    let date_range = DateRange::new(self.date_start, self.date_end)
      .context("date_start must not be after date_end")?;
    Ok(LoadOptions {
      date_range,
      aggregate_region: self.aggregate_region.clone(),
      sales_batch_size: self.sales_batch_size,
      sales_policy: self.sales_policy,
      tourism_policy: self.tourism_policy,
      demographics_policy: self.demographics_policy,
    })
  }
}

/// PostgreSQL connection settings from `POSTGRES_HOST`, `POSTGRES_PORT`,
/// `POSTGRES_DB`, `POSTGRES_USER` and `POSTGRES_PASSWORD`.
pub fn database() -> anyhow::Result<DatabaseConfig> {
  Config::builder()
    .add_source(Environment::with_prefix("POSTGRES"))
    .build()
    .context("failed to read POSTGRES_* variables")?
    .try_deserialize()
    .context("failed to deserialise DatabaseConfig")
}

#[cfg(test)]
mod tests {
  use config::FileFormat;

  use super::*;

  fn from_toml(toml: &str) -> anyhow::Result<Settings> {
    Settings::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
  }

  #[test]
  fn empty_file_gives_defaults() {
    let s = from_toml("").unwrap();
    assert_eq!(s.silver_dir, PathBuf::from("silver"));
    assert_eq!(s.sales_batch_size, 100_000);
    assert_eq!(s.aggregate_region, "Åland");

    let options = s.load_options().unwrap();
    assert_eq!(options.date_range, DateRange::default());
    assert_eq!(options.sales_policy, KeyPolicy::Fail);
    assert_eq!(options.demographics_policy, KeyPolicy::Drop);
  }

  #[test]
  fn file_overrides_defaults() {
    let s = from_toml(
      r#"
        silver_dir = "/data/silver"
        sales_batch_size = 5000
        date_start = "2015-01-01"
        date_end = "2015-12-31"
        sales_policy = "drop"
      "#,
    )
    .unwrap();

    let options = s.load_options().unwrap();
    assert_eq!(s.silver_dir, PathBuf::from("/data/silver"));
    assert_eq!(options.sales_batch_size, 5000);
    assert_eq!(options.date_range.days().count(), 365);
    assert_eq!(options.sales_policy, KeyPolicy::Drop);
    assert_eq!(options.tourism_policy, KeyPolicy::Fail);
  }

  #[test]
  fn inverted_dates_are_rejected() {
    let s = from_toml("date_start = \"2020-01-02\"\ndate_end = \"2020-01-01\"").unwrap();
    assert!(s.load_options().is_err());
  }

  #[test]
  fn unknown_policy_is_rejected() {
    assert!(from_toml("sales_policy = \"ignore\"").is_err());
  }
}
