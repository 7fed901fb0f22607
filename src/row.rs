use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;

use allocative::{Allocative, Key, Visitor};
use serde::de::{Deserialize, Deserializer, MapAccess};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::symbols::Symbol;
use crate::value::Value;

/// An ordered column -> value mapping.
///
/// Column order is the order of first insertion and is kept through
/// serialization, so a row written to JSON reads back field for field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<K, V> {
    fields: Vec<(K, V)>,
}

/// A raw table row, as produced by a row source.
pub type Row = Record<String, Value>;

/// A row stored in a dataset: every column name and value replaced by its symbol.
pub type EncodedRow = Record<Symbol, Symbol>;

impl<K, V> Record<K, V> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.fields.iter().map(|(k, v)| (k, v))
    }

    /// Column keys in row order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.fields.iter().map(|(k, _)| k)
    }
}

fn key_str<K: Borrow<str>>(key: &K) -> &str {
    key.borrow()
}

impl<K: Borrow<str>, V> Record<K, V> {
    /// Sets a column, replacing its value in place if the column already exists.
    pub fn insert(&mut self, key: K, value: V) {
        match self
            .fields
            .iter_mut()
            .find(|(k, _)| key_str(k) == key_str(&key))
        {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.fields
            .iter()
            .find(|(k, _)| key_str(k) == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl Row {
    /// Column names in row order.
    pub fn columns(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

impl<K, V> Default for Record<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A, B> FromIterator<(A, B)> for Record<K, V>
where
    K: Borrow<str>,
    A: Into<K>,
    B: Into<V>,
{
    fn from_iter<I: IntoIterator<Item = (A, B)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k.into(), v.into());
        }
        record
    }
}

impl<K, V> IntoIterator for Record<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Allocative, V: Allocative> Allocative for Record<K, V> {
    fn visit<'a, 'b: 'a>(&self, visitor: &'a mut Visitor<'b>) {
        let mut visitor = visitor.enter_self_sized::<Self>();
        if self.fields.capacity() != 0 {
            let mut buffer =
                visitor.enter_unique(Key::new("fields"), std::mem::size_of::<*const (K, V)>());
            for (k, v) in &self.fields {
                buffer.visit_field(Key::new("key"), k);
                buffer.visit_field(Key::new("value"), v);
            }
            buffer.visit_simple(
                Key::new("spare_capacity"),
                (self.fields.capacity() - self.fields.len()) * std::mem::size_of::<(K, V)>(),
            );
            buffer.exit();
        }
        visitor.exit();
    }
}

impl<K: Serialize, V: Serialize> Serialize for Record<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct RecordVisitor<K, V>(PhantomData<(K, V)>);

impl<'de, K, V> serde::de::Visitor<'de> for RecordVisitor<K, V>
where
    K: Deserialize<'de> + Borrow<str>,
    V: Deserialize<'de>,
{
    type Value = Record<K, V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of column to value")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
        let mut record = Record::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<K, V>()? {
            record.insert(k, v);
        }
        Ok(record)
    }
}

impl<'de, K, V> Deserialize<'de> for Record<K, V>
where
    K: Deserialize<'de> + Borrow<str>,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::from_iter([
            ("city", Value::from("NY")),
            ("year", Value::from(2020)),
        ])
    }

    #[test]
    fn test_row_keeps_insertion_order() {
        let row = sample();
        assert_eq!(row.columns(), vec!["city", "year"]);
        assert_eq!(row.get("year"), Some(&Value::Int(2020)));
        assert_eq!(row.get("month"), None);
    }

    #[test]
    fn test_insert_replaces_existing_column() {
        let mut row = sample();
        row.insert("city".into(), Value::from("LA"));
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("city"), Some(&Value::from("LA")));
        assert_eq!(row.columns(), vec!["city", "year"]);
    }

    #[test]
    fn test_row_json_keeps_order() {
        let row = Row::from_iter([("z", Value::Int(1)), ("a", Value::Int(2))]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"z":1,"a":2}"#);

        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_encoded_row_json() {
        let encoded = EncodedRow::from_iter([("1", Symbol::from("2")), ("3", Symbol::from("4"))]);
        let json = serde_json::to_string(&encoded).unwrap();
        assert_eq!(json, r#"{"1":"2","3":"4"}"#);
        let back: EncodedRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("3").map(Symbol::as_str), Some("4"));
    }
}
