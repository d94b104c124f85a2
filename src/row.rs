//! Row shapes flowing through a pipeline.
//!
//! A parser hands out positional rows; [`crate::transform::Mappify`] turns
//! them into keyed [`Record`]s and [`crate::transform::Vectorize`] turns them
//! back. Stages dispatch on the [`Row`] variant rather than inspecting cells.

use std::fmt;

use heck::ToSnakeCase;
use itertools::Itertools;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::data::Value;

/// Identifies a cell by position or by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column {
    Index(usize),
    Key(String),
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Index(idx) => write!(f, "#{idx}"),
            Column::Key(key) => write!(f, "'{key}'"),
        }
    }
}

impl From<usize> for Column {
    fn from(value: usize) -> Self {
        Column::Index(value)
    }
}

impl From<&str> for Column {
    fn from(value: &str) -> Self {
        Column::Key(value.to_string())
    }
}

impl From<String> for Column {
    fn from(value: String) -> Self {
        Column::Key(value)
    }
}

/// Insertion-ordered mapping from column key to value.
///
/// Records are narrow (one entry per CSV column), so lookups scan the entry
/// list; keeping the order is what lets [`crate::transform::Vectorize`]
/// recover a header from the first record it sees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces `key`, returning the previous value. New keys are
    /// appended so the original column order survives.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Serializes as a map in key order.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.iter().map(|(k, v)| format!("{k}: {v:?}")).join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Positional(Vec<Value>),
    Keyed(Record),
}

impl Row {
    /// Builds a positional row of string cells, the shape a CSV parser yields.
    pub fn from_strings<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Row::Positional(cells.into_iter().map(|c| Value::String(c.into())).collect())
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self, Row::Keyed(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Row::Positional(cells) => cells.len(),
            Row::Keyed(record) => record.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a cell; `None` when the column is absent or addresses the
    /// wrong row shape.
    pub fn get(&self, column: &Column) -> Option<&Value> {
        match (self, column) {
            (Row::Positional(cells), Column::Index(idx)) => cells.get(*idx),
            (Row::Keyed(record), Column::Key(key)) => record.get(key),
            _ => None,
        }
    }

    /// Columns present in this row, in row order.
    pub fn columns(&self) -> Vec<Column> {
        match self {
            Row::Positional(cells) => (0..cells.len()).map(Column::Index).collect(),
            Row::Keyed(record) => record.keys().map(|k| Column::Key(k.to_string())).collect(),
        }
    }

    /// Renders every cell as text, in row order.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            Row::Positional(cells) => cells.iter().map(Value::as_display).collect(),
            Row::Keyed(record) => record.values().map(Value::as_display).collect(),
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Row::Keyed(record) => Some(record),
            Row::Positional(_) => None,
        }
    }

    pub fn into_cells(self) -> Option<Vec<Value>> {
        match self {
            Row::Positional(cells) => Some(cells),
            Row::Keyed(_) => None,
        }
    }
}

impl From<Record> for Row {
    fn from(value: Record) -> Self {
        Row::Keyed(value)
    }
}

impl From<Vec<Value>> for Row {
    fn from(value: Vec<Value>) -> Self {
        Row::Positional(value)
    }
}

/// Turns a raw header cell into a record key. Only surrounding whitespace
/// is removed, so the key still reads back as the original cell.
pub fn keyify(header: &str) -> String {
    header.trim().to_string()
}

/// `snake_case` record key for a header cell, falling back to the trimmed
/// cell when conversion leaves nothing (e.g. punctuation-only headers).
pub fn snake_case_key(header: &str) -> String {
    let trimmed = header.trim();
    let converted = trimmed.to_snake_case();
    if converted.is_empty() {
        trimmed.to_string()
    } else {
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyify_only_trims_header_cells() {
        assert_eq!(keyify("this"), "this");
        assert_eq!(keyify("  Order ID "), "Order ID");
        assert_eq!(keyify("unitPrice"), "unitPrice");
    }

    #[test]
    fn snake_case_key_normalizes_header_cells() {
        assert_eq!(snake_case_key("  Order ID "), "order_id");
        assert_eq!(snake_case_key("unitPrice"), "unit_price");
        assert_eq!(snake_case_key("#"), "#");
    }

    #[test]
    fn record_serializes_as_ordered_map() {
        let record: Record = [("b", Value::Long(2)), ("a", Value::Null)].into_iter().collect();
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"b":2,"a":null}"#);
    }

    #[test]
    fn record_insert_preserves_first_position() {
        let mut record: Record = [("a", "1"), ("b", "2")].into_iter().collect();
        let previous = record.insert("a", 10_i64);
        assert_eq!(previous, Some(Value::from("1")));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&Value::Long(10)));
    }

    #[test]
    fn row_lookup_respects_shape() {
        let positional = Row::from_strings(["x", "y"]);
        assert_eq!(positional.get(&Column::Index(1)), Some(&Value::from("y")));
        assert_eq!(positional.get(&Column::from("x")), None);

        let keyed = Row::Keyed([("x", "1")].into_iter().collect());
        assert_eq!(keyed.get(&Column::from("x")), Some(&Value::from("1")));
        assert_eq!(keyed.get(&Column::Index(0)), None);
    }
}
