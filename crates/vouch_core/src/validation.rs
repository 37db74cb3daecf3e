//! Field-level validation before anything is persisted.

use crate::decompose::{prepare_child, route};
use crate::status::ValidationErrors;
use vouch_schema::{DataType, Entity, Record, Value, CHILD_RECORDS_KEY};

/// Checks a record against its schema.
pub trait ValidationService {
    /// Field name to error message; empty when the record is valid.
    fn validate(&self, entity: &Entity, record: &Record) -> ValidationErrors;
}

/// Default rules derived from field metadata: required and primary-key
/// fields present, values coercible to their declared type, TEXT within
/// `max_length`. Child records are checked against their Bean and
/// reported as `beans[<index>].<field>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    fn check_fields(entity: &Entity, record: &Record, prefix: &str, errors: &mut ValidationErrors) {
        for field in entity.fields() {
            let key = format!("{}{}", prefix, field.name);
            let value = record.get(&field.name).unwrap_or(&Value::Null);

            if value.is_null() {
                if field.required || field.primary_key {
                    errors.insert(key, format!("{} is required", field.name));
                }
                continue;
            }

            let coerced = match field.coerce(value) {
                Ok(coerced) => coerced,
                Err(err) => {
                    errors.insert(
                        key,
                        format!("expected {}, found {}", err.expected, err.found),
                    );
                    continue;
                }
            };

            if let (DataType::Text, Some(max), Value::Text(text)) =
                (field.data_type, field.max_length, &coerced)
            {
                let len = text.chars().count();
                if len > max {
                    errors.insert(
                        key,
                        format!("must be at most {} characters, got {}", max, len),
                    );
                }
            }
        }
    }
}

impl ValidationService for SchemaValidator {
    fn validate(&self, entity: &Entity, record: &Record) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        Self::check_fields(entity, record, "", &mut errors);

        let Some(children) = record.get(CHILD_RECORDS_KEY) else {
            return errors;
        };
        let children = match children {
            Value::Records(children) => children,
            Value::Null => return errors,
            other => {
                errors.insert(
                    CHILD_RECORDS_KEY.to_string(),
                    format!("expected a list of records, found {}", other.kind_name()),
                );
                return errors;
            }
        };

        for (index, child) in children.iter().enumerate() {
            let prefix = format!("{}[{}]", CHILD_RECORDS_KEY, index);
            match route(entity, child) {
                Ok(bean) => {
                    let prepared = prepare_child(entity, bean, record, child);
                    Self::check_fields(bean, &prepared, &format!("{}.", prefix), &mut errors);
                }
                Err(err) => {
                    errors.insert(prefix, err.to_string());
                }
            }
        }
        errors
    }
}
