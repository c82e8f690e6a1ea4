//! Business-key → surrogate-key resolution.
//!
//! After a dimension is committed, the loader reads it back through
//! [`resolve_keys`] and gets a [`KeyMap`] for the fact transforms. The date
//! dimension maps `date_key` onto itself through the same generic path.

use std::{collections::HashMap, fmt};

use tracing::debug;

use crate::{model::Table, store::WarehouseStore};

/// A natural identifier read back from a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BusinessKey {
  Int(i64),
  Text(String),
}

impl fmt::Display for BusinessKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BusinessKey::Int(i) => write!(f, "{i}"),
      BusinessKey::Text(s) => write!(f, "{s:?}"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
  Int,
  Text,
}

/// Which column pair of a dimension forms the lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColumns {
  pub table:     Table,
  pub business:  &'static str,
  pub surrogate: &'static str,
  pub kind:      KeyKind,
}

impl KeyColumns {
  pub const DATE: KeyColumns = KeyColumns {
    table:     Table::DimDate,
    business:  "date_key",
    surrogate: "date_key",
    kind:      KeyKind::Int,
  };
  pub const MUNICIPALITY: KeyColumns = KeyColumns {
    table:     Table::DimMunicipality,
    business:  "name",
    surrogate: "municipality_key",
    kind:      KeyKind::Text,
  };
  pub const PRODUCT: KeyColumns = KeyColumns {
    table:     Table::DimProduct,
    business:  "product_id",
    surrogate: "product_key",
    kind:      KeyKind::Int,
  };
  pub const STORE: KeyColumns = KeyColumns {
    table:     Table::DimStore,
    business:  "store_id",
    surrogate: "store_key",
    kind:      KeyKind::Int,
  };

  pub fn is_identity(&self) -> bool { self.business == self.surrogate }
}

/// Lookup from one dimension's business key to its surrogate key.
#[derive(Debug, Clone)]
pub struct KeyMap {
  columns: KeyColumns,
  ints:    HashMap<i64, i64>,
  names:   HashMap<String, i64>,
}

impl KeyMap {
  pub fn from_pairs(
    columns: KeyColumns,
    pairs: impl IntoIterator<Item = (BusinessKey, i64)>,
  ) -> Self {
    let mut map = Self { columns, ints: HashMap::new(), names: HashMap::new() };
    for (key, surrogate) in pairs {
      match key {
        BusinessKey::Int(i) => {
          map.ints.insert(i, surrogate);
        }
        BusinessKey::Text(s) => {
          map.names.insert(s, surrogate);
        }
      }
    }
    map
  }

  pub fn columns(&self) -> KeyColumns { self.columns }

  pub fn by_id(&self, id: i64) -> Option<i64> { self.ints.get(&id).copied() }

  pub fn by_name(&self, name: &str) -> Option<i64> { self.names.get(name).copied() }

  pub fn get(&self, key: &BusinessKey) -> Option<i64> {
    match key {
      BusinessKey::Int(i) => self.by_id(*i),
      BusinessKey::Text(s) => self.by_name(s),
    }
  }

  pub fn len(&self) -> usize { self.ints.len() + self.names.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Read a committed dimension back and build its key map.
pub async fn resolve_keys<W: WarehouseStore>(
  store: &W,
  columns: KeyColumns,
) -> Result<KeyMap, W::Error> {
  let pairs = store.key_pairs(columns).await?;
  let map = KeyMap::from_pairs(columns, pairs);
  debug!(table = %columns.table, keys = map.len(), "key map built");
  Ok(map)
}
