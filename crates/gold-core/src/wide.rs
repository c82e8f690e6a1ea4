//! The wide demographics format.
//!
//! The silver demographics extract carries one row per year and one column
//! per `"<Municipality> <Label>"` pair. [`WideSchema`] describes that layout
//! explicitly and [`WideSchema::layout`] validates a header row against it,
//! rather than guessing dimension columns by substring.

use crate::{Error, Result};

/// A versioned description of the wide demographics header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideSchema {
  pub version:     u32,
  pub year_column: &'static str,
  /// Exactly one occurrence separates the municipality from the label.
  pub separator:   char,
  /// Labels that become fact rows (`gender` column).
  pub genders:     &'static [&'static str],
  /// Labels that are recognised but derived upstream, and skipped.
  pub derived:     &'static [&'static str],
}

impl WideSchema {
  pub const V1: WideSchema = WideSchema {
    version:     1,
    year_column: "år",
    separator:   ' ',
    genders:     &["Kvinnor", "Män"],
    derived:     &["Total"],
  };

  /// Validate `headers` and locate the year and gender columns.
  pub fn layout<S: AsRef<str>>(&self, headers: &[S]) -> Result<WideLayout> {
    let mut year_index = None;
    let mut columns = Vec::new();

    for (index, raw) in headers.iter().enumerate() {
      let header = clean_header(raw.as_ref());

      if header == self.year_column {
        if year_index.replace(index).is_some() {
          return Err(self.violation(format!("duplicate year column {header:?}")));
        }
        continue;
      }

      let mut parts = header.split(self.separator);
      let (Some(municipality), Some(label), None) = (parts.next(), parts.next(), parts.next())
      else {
        return Err(self.violation(format!(
          "column {header:?} is not \"<municipality>{}<label>\"",
          self.separator
        )));
      };
      if municipality.is_empty() {
        return Err(self.violation(format!("column {header:?} has no municipality")));
      }

      if self.genders.contains(&label) {
        columns.push(WideColumn {
          index,
          municipality: municipality.to_owned(),
          gender: label.to_owned(),
        });
      } else if !self.derived.contains(&label) {
        return Err(self.violation(format!("column {header:?} has unknown label {label:?}")));
      }
    }

    let year_index = year_index
      .ok_or_else(|| self.violation(format!("missing year column {:?}", self.year_column)))?;

    Ok(WideLayout { schema: *self, width: headers.len(), year_index, columns })
  }

  fn violation(&self, message: String) -> Error {
    Error::Schema { version: self.version, message }
  }
}

fn clean_header(raw: &str) -> &str { raw.trim_start_matches('\u{feff}').trim() }

/// One gender column of the wide table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideColumn {
  /// Position in the source header row.
  pub index:        usize,
  pub municipality: String,
  pub gender:       String,
}

/// A validated header: where the year lives and which columns to unpivot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideLayout {
  schema:     WideSchema,
  width:      usize,
  year_index: usize,
  columns:    Vec<WideColumn>,
}

impl WideLayout {
  pub fn columns(&self) -> &[WideColumn] { &self.columns }

  /// Distinct municipality names, in header order.
  pub fn municipalities(&self) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for column in &self.columns {
      if !names.contains(&column.municipality.as_str()) {
        names.push(&column.municipality);
      }
    }
    names
  }

  /// Parse one data record. Empty population cells read as zero.
  pub fn parse_row(&self, fields: &[&str]) -> Result<WideRow> {
    if fields.len() != self.width {
      return Err(self.schema.violation(format!(
        "row has {} fields, header has {}",
        fields.len(),
        self.width
      )));
    }

    let year_raw = fields[self.year_index].trim().trim_matches('"');
    let year = year_raw
      .parse::<i32>()
      .map_err(|_| self.schema.violation(format!("invalid year {year_raw:?}")))?;

    let counts = self
      .columns
      .iter()
      .map(|column| {
        let raw = fields[column.index].trim();
        if raw.is_empty() {
          return Ok(0);
        }
        raw.parse::<i64>().map_err(|_| {
          self.schema.violation(format!(
            "invalid count {raw:?} for {} {} in {year}",
            column.municipality, column.gender
          ))
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(WideRow { year, counts })
  }
}

/// One year of the wide table; `counts[i]` belongs to `layout.columns()[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideRow {
  pub year:   i32,
  pub counts: Vec<i64>,
}

/// The whole demographics extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemographicsTable {
  pub layout: WideLayout,
  pub rows:   Vec<WideRow>,
}

impl DemographicsTable {
  /// Build a table from a header and raw records.
  pub fn parse<S: AsRef<str>>(
    schema: &WideSchema,
    headers: &[S],
    records: &[Vec<&str>],
  ) -> Result<Self> {
    let layout = schema.layout(headers)?;
    let rows = records
      .iter()
      .map(|record| layout.parse_row(record))
      .collect::<Result<Vec<_>>>()?;
    Ok(Self { layout, rows })
  }
}
