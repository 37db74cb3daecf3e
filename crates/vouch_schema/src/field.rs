//! Field definitions and value coercion.

use crate::record::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vouch_db::DbTimestamp;

/// Declared type of a field. Drives relation DDL and binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    #[default]
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
}

impl DataType {
    /// Column type used when creating relations.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "VARCHAR",
            Self::Integer => "BIGINT",
            Self::Real => "DOUBLE",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A value could not be converted to the field's declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: expected {expected}, found {found}")]
pub struct CoerceError {
    pub field: String,
    pub expected: DataType,
    pub found: String,
}

/// One column of an entity.
///
/// Declaration order within an entity is significant: it is the column
/// order of every generated statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default)]
    pub data_type: DataType,

    /// Must be present and non-null on submission
    #[serde(default)]
    pub required: bool,

    /// Upper bound on character count for TEXT values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl Field {
    /// A nullable TEXT field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: false,
            data_type: DataType::Text,
            required: false,
            max_length: None,
        }
    }

    /// A primary-key field. Primary keys are always required.
    pub fn primary(name: impl Into<String>) -> Self {
        Self {
            primary_key: true,
            required: true,
            ..Self::new(name)
        }
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Convert `value` to this field's declared type.
    ///
    /// Null stays null. Text is parsed for the non-text types; anything else
    /// that cannot be represented losslessly is an error.
    pub fn coerce(&self, value: &Value) -> Result<Value, CoerceError> {
        let fail = || CoerceError {
            field: self.name.clone(),
            expected: self.data_type,
            found: value.kind_name().to_string(),
        };

        match (self.data_type, value) {
            (_, Value::Null) => Ok(Value::Null),
            (_, Value::Records(_)) => Err(fail()),

            (DataType::Text, Value::Text(s)) => Ok(Value::Text(s.clone())),
            (DataType::Text, Value::Integer(v)) => Ok(Value::Text(v.to_string())),
            (DataType::Text, Value::Real(v)) => Ok(Value::Text(v.to_string())),
            (DataType::Text, Value::Bool(v)) => Ok(Value::Text(v.to_string())),
            (DataType::Text, Value::Timestamp(ts)) => Ok(Value::Text(ts.to_rfc3339())),

            (DataType::Integer, Value::Integer(v)) => Ok(Value::Integer(*v)),
            // i64::MAX as f64 rounds up to 2^63, which is already out of range.
            (DataType::Integer, Value::Real(v))
                if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 =>
            {
                Ok(Value::Integer(*v as i64))
            }
            (DataType::Integer, Value::Text(s)) => {
                s.trim().parse::<i64>().map(Value::Integer).map_err(|_| fail())
            }

            (DataType::Real, Value::Real(v)) => Ok(Value::Real(*v)),
            (DataType::Real, Value::Integer(v)) => Ok(Value::Real(*v as f64)),
            (DataType::Real, Value::Text(s)) => {
                s.trim().parse::<f64>().map(Value::Real).map_err(|_| fail())
            }

            (DataType::Boolean, Value::Bool(v)) => Ok(Value::Bool(*v)),
            (DataType::Boolean, Value::Integer(0)) => Ok(Value::Bool(false)),
            (DataType::Boolean, Value::Integer(1)) => Ok(Value::Bool(true)),
            (DataType::Boolean, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "y" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "n" | "no" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },

            (DataType::Timestamp, Value::Timestamp(ts)) => Ok(Value::Timestamp(ts.clone())),
            (DataType::Timestamp, Value::Text(s)) => DbTimestamp::from_rfc3339(s.trim())
                .map(Value::Timestamp)
                .map_err(|_| fail()),
            (DataType::Timestamp, Value::Integer(ms)) => DbTimestamp::from_unix_millis(*ms)
                .map(Value::Timestamp)
                .map_err(|_| fail()),

            _ => Err(fail()),
        }
    }
}
