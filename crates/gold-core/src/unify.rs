//! Municipality identity unification.
//!
//! The same municipality shows up in three independently shaped sources: the
//! demographics column headers (name only), the store list and the tourism
//! observations (name and code). The unifier concatenates the three name
//! streams and keeps one entry per name.
//!
//! Two sources may disagree on the code for one name. The first non-null code
//! seen wins; later disagreements are logged, not reconciled.

use std::collections::{HashMap, hash_map::Entry};

use tracing::warn;

use crate::source::{StoreRecord, TourismRecord};

/// The whole-region rollup present in the demographics extract.
pub const DEFAULT_AGGREGATE_REGION: &str = "Åland";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MunicipalityEntry {
  pub name: String,
  pub code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityUnifier {
  /// Lowercased name of the aggregate pseudo-entity to exclude.
  aggregate: String,
}

impl Default for IdentityUnifier {
  fn default() -> Self { Self::new(DEFAULT_AGGREGATE_REGION) }
}

impl IdentityUnifier {
  pub fn new(aggregate_region: &str) -> Self {
    Self { aggregate: aggregate_region.trim().to_lowercase() }
  }

  pub fn is_aggregate(&self, name: &str) -> bool { name.trim().to_lowercase() == self.aggregate }

  /// One entry per distinct name across the three sources, in first-seen
  /// order. Callers must not rely on that order.
  pub fn unify<'a>(
    &self,
    demographics: impl IntoIterator<Item = &'a str>,
    stores: &[StoreRecord],
    tourism: &[TourismRecord],
  ) -> Vec<MunicipalityEntry> {
    let stream = demographics
      .into_iter()
      .map(|name| (name, None))
      .chain(
        stores
          .iter()
          .map(|s| (s.municipality_name.as_str(), s.municipality_code.as_deref())),
      )
      .chain(
        tourism
          .iter()
          .map(|t| (t.municipality_name.as_str(), t.municipality_code.as_deref())),
      );

    let mut entries: Vec<MunicipalityEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (raw_name, raw_code) in stream {
      let name = raw_name.trim();
      if name.is_empty() || self.is_aggregate(name) {
        continue;
      }
      let code = raw_code.map(str::trim).filter(|c| !c.is_empty());

      match index.entry(name.to_owned()) {
        Entry::Vacant(slot) => {
          slot.insert(entries.len());
          entries.push(MunicipalityEntry {
            name: name.to_owned(),
            code: code.map(str::to_owned),
          });
        }
        Entry::Occupied(slot) => {
          let entry = &mut entries[*slot.get()];
          if entry.code.is_none() {
            entry.code = code.map(str::to_owned);
          } else if let (Some(kept), Some(c)) = (entry.code.as_deref(), code)
            && kept != c
          {
            warn!(municipality = name, kept, ignored = c, "conflicting municipality codes");
          }
        }
      }
    }

    entries
  }
}
