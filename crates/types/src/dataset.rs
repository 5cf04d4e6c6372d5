use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ResourceHandle;

/// Field set of a single remote list item, keyed by the source's field identifiers.
pub type RawRecord = Map<String, Value>;

/// A record conforming to the canonical column schema.
///
/// Absent values are represented by [`Value::Null`], which is distinct from an
/// empty string. Column order follows first appearance in the source record,
/// with backfilled columns appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalRow {
    columns: IndexMap<String, Value>,
}

impl CanonicalRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `column`, if the column exists.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Returns the value under `column` as a string slice when it is a string.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(Value::as_str)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// True when the column is missing or holds the absent marker.
    pub fn is_absent(&self, column: &str) -> bool {
        self.columns.get(column).is_none_or(Value::is_null)
    }

    /// Inserts or replaces a column value, returning the previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.columns.insert(column.into(), value)
    }

    /// Marks `column` as present-but-absent unless it already exists.
    pub fn backfill(&mut self, column: &str) {
        if !self.columns.contains_key(column) {
            self.columns.insert(column.to_string(), Value::Null);
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(column, value)| (column.as_str(), value))
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.columns
    }
}

impl From<IndexMap<String, Value>> for CanonicalRow {
    fn from(columns: IndexMap<String, Value>) -> Self {
        Self { columns }
    }
}

impl FromIterator<(String, Value)> for CanonicalRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// One complete, immutable snapshot of a remote list.
///
/// Cloning is cheap: rows are shared. A later fetch produces a new `Dataset`
/// rather than mutating an existing one.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Arc<[CanonicalRow]>,
    source: Option<ResourceHandle>,
}

impl Dataset {
    pub fn new(rows: Vec<CanonicalRow>) -> Self {
        Self {
            rows: rows.into(),
            source: None,
        }
    }

    /// A valid dataset with zero rows ("no responses yet").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attaches the handle of the list this snapshot was read from.
    pub fn with_source(mut self, source: ResourceHandle) -> Self {
        self.source = Some(source);
        self
    }

    pub fn source(&self) -> Option<&ResourceHandle> {
        self.source.as_ref()
    }

    pub fn rows(&self) -> &[CanonicalRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of column names across all rows, in first-seen order.
    pub fn column_names(&self) -> IndexSet<&str> {
        self.rows.iter().flat_map(CanonicalRow::column_names).collect()
    }

    /// Builds a new dataset holding the rows for which `keep` returns true.
    pub fn retain<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&CanonicalRow) -> bool,
    {
        let rows: Vec<CanonicalRow> = self.rows.iter().filter(|row| keep(row)).cloned().collect();
        Dataset {
            rows: rows.into(),
            source: self.source.clone(),
        }
    }

    /// Returns true when both datasets share the same row storage.
    pub fn shares_rows_with(&self, other: &Dataset) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a CanonicalRow;
    type IntoIter = std::slice::Iter<'a, CanonicalRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl Serialize for Dataset {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}
