//! Row-aligned extraction table.
//!
//! Columns are keyed by field name and kept in first-seen order. After every
//! extraction pass all columns have the same length: a column that receives
//! fewer values than the longest one is padded with empty placeholders, and a
//! column first seen on a later pass is back-filled for the earlier rows.
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ExtractionTable {
    columns: Vec<(String, Vec<String>)>,
}

impl ExtractionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, i.e. the length of the longest column.
    pub fn row_count(&self) -> usize {
        self.columns
            .iter()
            .map(|(_, values)| values.len())
            .max()
            .unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Cells of row `index` in column order; short columns read as "".
    pub fn row(&self, index: usize) -> Vec<&str> {
        self.columns
            .iter()
            .map(|(_, values)| values.get(index).map(String::as_str).unwrap_or(""))
            .collect()
    }

    /// Append one cell to `field`, creating the column if needed.
    pub fn push(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| name == field) {
            Some((_, values)) => values.push(value),
            None => self.columns.push((field.to_string(), vec![value])),
        }
    }

    /// Merge the rows of one extraction pass below the existing rows.
    pub fn append(&mut self, mut pass: ExtractionTable) {
        pass.level();
        let base = self.row_count();
        self.level();
        for (field, values) in pass.columns {
            match self.columns.iter_mut().find(|(name, _)| *name == field) {
                Some((_, existing)) => existing.extend(values),
                None => {
                    let mut column = vec![String::new(); base];
                    column.extend(values);
                    self.columns.push((field, column));
                }
            }
        }
        self.level();
    }

    /// Pad every column with placeholders up to the longest column.
    pub fn level(&mut self) {
        let rows = self.row_count();
        for (_, values) in &mut self.columns {
            values.resize(rows, String::new());
        }
    }

    pub fn is_aligned(&self) -> bool {
        let rows = self.row_count();
        self.columns.iter().all(|(_, values)| values.len() == rows)
    }

    /// Columns as an ordered map, handy for comparisons that ignore column order.
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.columns.iter().cloned().collect()
    }
}

impl PartialEq for ExtractionTable {
    fn eq(&self, other: &Self) -> bool {
        self.to_map() == other.to_map()
    }
}

impl Serialize for ExtractionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, values) in &self.columns {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}
