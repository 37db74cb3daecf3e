//! Dynamically shaped records exchanged between every layer.
//!
//! A [`Record`] maps field names to tagged [`Value`]s. Composite records
//! carry their children as [`Value::Records`] under the reserved child key
//! (see [`crate::relation::CHILD_RECORDS_KEY`]); read responses attach
//! resolved children under each Bean's entity name the same way.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use vouch_db::{DbRow, DbTimestamp, DbValue};

/// A record could not be built from its external representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Field '{0}' holds a nested object; only lists of records may nest")]
    NestedObject(String),

    #[error("Field '{0}' holds a list whose elements are not all objects")]
    ScalarList(String),
}

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DbTimestamp),
    /// Ordered child records
    Records(Vec<Record>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
            Value::Records(_) => "records",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Record]> {
        match self {
            Value::Records(records) => Some(records),
            _ => None,
        }
    }

    /// The bound-parameter form of this value.
    ///
    /// Child record lists have no column type of their own and bind as
    /// their JSON text.
    pub fn to_db_value(&self) -> DbValue {
        match self {
            Value::Null => DbValue::Null,
            Value::Bool(v) => DbValue::Boolean(*v),
            Value::Integer(v) => DbValue::Integer(*v),
            Value::Real(v) => DbValue::Real(*v),
            Value::Text(v) => DbValue::Text(v.clone()),
            Value::Timestamp(v) => DbValue::Timestamp(v.clone()),
            Value::Records(_) => DbValue::Text(self.to_json().to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Integer(v) => serde_json::Value::from(*v),
            Value::Real(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(v) => serde_json::Value::String(v.clone()),
            Value::Timestamp(v) => serde_json::Value::String(v.to_rfc3339()),
            Value::Records(records) => serde_json::Value::Array(
                records.iter().map(Record::to_json).collect(),
            ),
        }
    }

    /// Build a value from JSON found under `key`.
    pub fn from_json(key: &str, json: serde_json::Value) -> Result<Self, RecordError> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(v) => Ok(Value::Bool(v)),
            serde_json::Value::Number(n) => Ok(match n.as_i64() {
                Some(v) => Value::Integer(v),
                None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
            }),
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Array(items) => {
                let mut records = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::Object(map) => records.push(Record::from_json_map(map)?),
                        _ => return Err(RecordError::ScalarList(key.to_string())),
                    }
                }
                Ok(Value::Records(records))
            }
            serde_json::Value::Object(_) => Err(RecordError::NestedObject(key.to_string())),
        }
    }
}

impl From<DbValue> for Value {
    fn from(value: DbValue) -> Self {
        match value {
            DbValue::Null => Value::Null,
            DbValue::Integer(v) => Value::Integer(v),
            DbValue::Real(v) => Value::Real(v),
            DbValue::Text(v) => Value::Text(v),
            DbValue::Blob(v) => Value::Text(String::from_utf8_lossy(&v).into_owned()),
            DbValue::Boolean(v) => Value::Bool(v),
            DbValue::Timestamp(v) => Value::Timestamp(v),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<DbTimestamp> for Value {
    fn from(v: DbTimestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Vec<Record>> for Value {
    fn from(v: Vec<Record>) -> Self {
        Value::Records(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A mapping from field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Present and not null.
    pub fn has_value(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|v| !v.is_null())
    }

    /// Text value of a field, if it holds text.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overwrite this record's values with every entry of `other`.
    pub fn overlay(&mut self, other: &Record) {
        for (name, value) in other.iter() {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Copy `names` from `other` where this record has no value yet.
    pub fn fill_missing_from<'a>(&mut self, other: &Record, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            if self.has_value(name) {
                continue;
            }
            if let Some(value) = other.get(name).filter(|v| !v.is_null()) {
                self.values.insert(name.to_string(), value.clone());
            }
        }
    }

    /// Build a record from a result row, keyed by column name.
    pub fn from_db_row(row: DbRow) -> Self {
        row.into_pairs()
            .map(|(column, value)| (column, Value::from(value)))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, RecordError> {
        let mut record = Record::new();
        for (key, json) in map {
            let value = Value::from_json(&key, json)?;
            record.values.insert(key, value);
        }
        Ok(record)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = RecordError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::Object(map) => Record::from_json_map(map),
            serde_json::Value::Null => Err(RecordError::NotAnObject("null")),
            serde_json::Value::Bool(_) => Err(RecordError::NotAnObject("boolean")),
            serde_json::Value::Number(_) => Err(RecordError::NotAnObject("number")),
            serde_json::Value::String(_) => Err(RecordError::NotAnObject("string")),
            serde_json::Value::Array(_) => Err(RecordError::NotAnObject("array")),
        }
    }
}

impl From<Record> for serde_json::Value {
    fn from(record: Record) -> Self {
        record.to_json()
    }
}
