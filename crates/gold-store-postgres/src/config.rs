//! Connection settings for the PostgreSQL destination.

use std::{fmt, time::Duration};

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

/// Where the gold tables live. Field names match the `POSTGRES_*`
/// environment variables with the prefix removed.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
  pub host:            String,
  pub port:            u16,
  pub db:              String,
  pub user:            String,
  pub password:        String,
  pub max_connections: u32,
  /// Seconds to wait for a pooled connection before giving up.
  pub acquire_timeout: u64,
}

impl Default for DatabaseConfig {
  fn default() -> Self {
    Self {
      host:            "localhost".into(),
      port:            5432,
      db:              "gold_db".into(),
      user:            "gold_user".into(),
      password:        "gold_password".into(),
      max_connections: 4,
      acquire_timeout: 10,
    }
  }
}

impl DatabaseConfig {
  pub fn connect_options(&self) -> PgConnectOptions {
    PgConnectOptions::new()
      .host(&self.host)
      .port(self.port)
      .database(&self.db)
      .username(&self.user)
      .password(&self.password)
  }

  pub fn acquire_timeout(&self) -> Duration { Duration::from_secs(self.acquire_timeout) }
}

impl fmt::Debug for DatabaseConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DatabaseConfig")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("db", &self.db)
      .field("user", &self.user)
      .field("password", &"***")
      .field("max_connections", &self.max_connections)
      .field("acquire_timeout", &self.acquire_timeout)
      .finish()
  }
}
