//! Bound parameters, result cells and rows.

use crate::error::BackendError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A UTC instant, stored as a DuckDB `TIMESTAMP` (microsecond precision)
/// and rendered as RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DbTimestamp(DateTime<Utc>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid timestamp: {0}")]
pub struct TimestampError(String);

impl DbTimestamp {
    /// Now, truncated to microseconds so that a stored value reads back
    /// equal to the one written.
    pub fn now() -> Self {
        let now = Utc::now();
        Self(DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now))
    }

    pub fn from_rfc3339(value: &str) -> Result<Self, TimestampError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| TimestampError(format!("{}: {}", value, e)))
    }

    pub fn from_unix_millis(ms: i64) -> Result<Self, TimestampError> {
        DateTime::from_timestamp_millis(ms)
            .map(Self)
            .ok_or_else(|| TimestampError(format!("{} ms is out of range", ms)))
    }

    fn from_unix_micros(us: i64) -> Option<Self> {
        DateTime::from_timestamp_micros(us).map(Self)
    }

    pub fn unix_micros(&self) -> i64 {
        self.0.timestamp_micros()
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl std::fmt::Display for DbTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl serde::Serialize for DbTimestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> serde::Deserialize<'de> for DbTimestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DbTimestamp::from_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}

/// A statement parameter or a result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
    Timestamp(DbTimestamp),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    pub(crate) fn to_duckdb(&self) -> duckdb::types::Value {
        use duckdb::types::{TimeUnit, Value};
        match self {
            DbValue::Null => Value::Null,
            DbValue::Integer(v) => Value::BigInt(*v),
            DbValue::Real(v) => Value::Double(*v),
            DbValue::Text(v) => Value::Text(v.clone()),
            DbValue::Blob(v) => Value::Blob(v.clone()),
            DbValue::Boolean(v) => Value::Boolean(*v),
            DbValue::Timestamp(v) => Value::Timestamp(TimeUnit::Microsecond, v.unix_micros()),
        }
    }

    pub(crate) fn from_duckdb(cell: duckdb::types::ValueRef<'_>) -> Self {
        use duckdb::types::{TimeUnit, ValueRef};
        match cell {
            ValueRef::Null => DbValue::Null,
            ValueRef::Boolean(v) => DbValue::Boolean(v),
            ValueRef::TinyInt(v) => DbValue::Integer(v.into()),
            ValueRef::SmallInt(v) => DbValue::Integer(v.into()),
            ValueRef::Int(v) => DbValue::Integer(v.into()),
            ValueRef::BigInt(v) => DbValue::Integer(v),
            ValueRef::UTinyInt(v) => DbValue::Integer(v.into()),
            ValueRef::USmallInt(v) => DbValue::Integer(v.into()),
            ValueRef::UInt(v) => DbValue::Integer(v.into()),
            // COUNT(*) and friends come back as HUGEINT/UBIGINT.
            ValueRef::HugeInt(v) => DbValue::Integer(v as i64),
            ValueRef::UBigInt(v) => DbValue::Integer(v as i64),
            ValueRef::Float(v) => DbValue::Real(v.into()),
            ValueRef::Double(v) => DbValue::Real(v),
            ValueRef::Text(v) => DbValue::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => DbValue::Blob(v.to_vec()),
            ValueRef::Timestamp(unit, v) => {
                let micros = match unit {
                    TimeUnit::Second => v.saturating_mul(1_000_000),
                    TimeUnit::Millisecond => v.saturating_mul(1_000),
                    TimeUnit::Microsecond => v,
                    TimeUnit::Nanosecond => v / 1_000,
                };
                DbTimestamp::from_unix_micros(micros)
                    .map(DbValue::Timestamp)
                    .unwrap_or(DbValue::Integer(micros))
            }
            other => {
                tracing::warn!("Unmapped DuckDB cell {:?}; reading it as text", other);
                DbValue::Text(format!("{:?}", other))
            }
        }
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        DbValue::Real(v)
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Boolean(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_owned())
    }
}

impl From<DbTimestamp> for DbValue {
    fn from(v: DbTimestamp) -> Self {
        DbValue::Timestamp(v)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(DbValue::Null, Into::into)
    }
}

impl TryFrom<DbValue> for i64 {
    type Error = BackendError;

    fn try_from(value: DbValue) -> Result<Self, Self::Error> {
        match value {
            DbValue::Integer(v) => Ok(v),
            other => Err(BackendError::TypeConversion(format!("expected integer, got {:?}", other))),
        }
    }
}

impl TryFrom<DbValue> for String {
    type Error = BackendError;

    fn try_from(value: DbValue) -> Result<Self, Self::Error> {
        match value {
            DbValue::Text(v) => Ok(v),
            other => Err(BackendError::TypeConversion(format!("expected text, got {:?}", other))),
        }
    }
}

impl TryFrom<DbValue> for DbTimestamp {
    type Error = BackendError;

    fn try_from(value: DbValue) -> Result<Self, Self::Error> {
        match value {
            DbValue::Timestamp(v) => Ok(v),
            DbValue::Text(v) => DbTimestamp::from_rfc3339(&v)
                .map_err(|e| BackendError::TypeConversion(e.to_string())),
            other => Err(BackendError::TypeConversion(format!(
                "expected timestamp, got {:?}",
                other
            ))),
        }
    }
}

/// One result row: column names in projection order with their cells.
#[derive(Debug, Clone)]
pub struct DbRow {
    columns: std::rc::Rc<[String]>,
    values: Vec<DbValue>,
}

impl DbRow {
    pub(crate) fn new(columns: std::rc::Rc<[String]>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DbValue> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&DbValue> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.values.get(index)
    }

    /// `(column, value)` pairs in projection order.
    pub fn into_pairs(self) -> impl Iterator<Item = (String, DbValue)> {
        let columns = self.columns;
        self.values
            .into_iter()
            .enumerate()
            .map(move |(i, value)| (columns[i].clone(), value))
    }

    pub(crate) fn into_first(self) -> Option<DbValue> {
        self.values.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_parse_and_render_in_utc() {
        let ts = DbTimestamp::from_rfc3339("2025-01-18T10:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-18T08:00:00+00:00");
        assert_eq!(ts, DbTimestamp::from_unix_millis(1_737_187_200_000).unwrap());
        assert!(DbTimestamp::from_rfc3339("yesterday").is_err());
    }

    #[test]
    fn timestamps_serialize_as_strings() {
        let ts = DbTimestamp::from_unix_millis(0).unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"1970-01-01T00:00:00+00:00\"");
        let back: DbTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn scalar_conversions_check_the_variant() {
        assert_eq!(i64::try_from(DbValue::Integer(3)).unwrap(), 3);
        assert!(i64::try_from(DbValue::Null).is_err());
        assert_eq!(String::try_from(DbValue::from("x")).unwrap(), "x");
        assert!(String::try_from(DbValue::Integer(1)).is_err());
    }

    #[test]
    fn option_maps_none_to_null() {
        assert_eq!(DbValue::from(None::<i64>), DbValue::Null);
        assert_eq!(DbValue::from(Some("a")), DbValue::Text("a".into()));
    }
}
