//! Entity schemas: a top-level Module, or a Bean owned by one.

use crate::field::{CoerceError, Field};
use crate::record::Record;
use crate::relation::{is_bookkeeping_column, BEAN_TAG_KEY, CHILD_RECORDS_KEY};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// Discriminant between a top-level entity and an owned child entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Module,
    Bean,
}

/// A schema that failed structural checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Invalid identifier '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidIdentifier(String),

    #[error("Entity '{0}' declares no primary-key field")]
    NoPrimaryKey(String),

    #[error("Entity '{entity}' declares field '{field}' more than once")]
    DuplicateField { entity: String, field: String },

    #[error("Entity '{entity}' uses reserved name '{field}' as a field")]
    ReservedField { entity: String, field: String },

    #[error("Bean '{0}' cannot own beans")]
    NestedBean(String),

    #[error("Module '{module}' owns bean '{bean}' more than once")]
    DuplicateBean { module: String, bean: String },
}

/// Schema of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    entity_name: String,
    kind: EntityKind,
    fields: Vec<Field>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    beans: Vec<Entity>,
}

impl Entity {
    pub fn module(entity_name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            entity_name: entity_name.into(),
            kind: EntityKind::Module,
            fields,
            beans: Vec::new(),
        }
    }

    pub fn bean(entity_name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            entity_name: entity_name.into(),
            kind: EntityKind::Bean,
            fields,
            beans: Vec::new(),
        }
    }

    /// Attach an owned Bean. The child is always re-tagged as a Bean.
    pub fn with_bean(mut self, mut bean: Entity) -> Self {
        bean.kind = EntityKind::Bean;
        self.beans.push(bean);
        self
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_sub_bean(&self) -> bool {
        self.kind == EntityKind::Bean
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn beans(&self) -> &[Entity] {
        &self.beans
    }

    pub fn bean_named(&self, name: &str) -> Option<&Entity> {
        self.beans.iter().find(|b| b.entity_name == name)
    }

    pub fn has_beans(&self) -> bool {
        !self.beans.is_empty()
    }

    pub fn primary_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    pub fn primary_field_names(&self) -> Vec<&str> {
        self.primary_fields().map(|f| f.name.as_str()).collect()
    }

    pub fn non_primary_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.primary_key)
    }

    pub fn is_primary_field(&self, name: &str) -> bool {
        self.primary_fields().any(|f| f.name == name)
    }

    /// Check identifiers, keys and reserved names for this entity and its
    /// beans.
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_identifier(&self.entity_name)?;

        let mut seen = HashSet::new();
        for field in &self.fields {
            check_identifier(&field.name)?;
            if is_bookkeeping_column(&field.name)
                || field.name == CHILD_RECORDS_KEY
                || field.name == BEAN_TAG_KEY
            {
                return Err(SchemaError::ReservedField {
                    entity: self.entity_name.clone(),
                    field: field.name.clone(),
                });
            }
            if !seen.insert(field.name.to_ascii_uppercase()) {
                return Err(SchemaError::DuplicateField {
                    entity: self.entity_name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        if self.primary_fields().next().is_none() {
            return Err(SchemaError::NoPrimaryKey(self.entity_name.clone()));
        }

        if self.is_sub_bean() && self.has_beans() {
            return Err(SchemaError::NestedBean(self.entity_name.clone()));
        }

        let mut bean_names = HashSet::new();
        for bean in &self.beans {
            if !bean_names.insert(bean.entity_name.as_str()) {
                return Err(SchemaError::DuplicateBean {
                    module: self.entity_name.clone(),
                    bean: bean.entity_name.clone(),
                });
            }
            bean.validate()?;
        }
        Ok(())
    }

    /// Coerce every declared field present in `record` to its declared type.
    ///
    /// Keys that are not declared fields are kept as-is.
    pub fn coerce_record(&self, record: &Record) -> Result<Record, CoerceError> {
        let mut out = Record::new();
        for (name, value) in record.iter() {
            let coerced = match self.field(name) {
                Some(field) => field.coerce(value)?,
                None => value.clone(),
            };
            out.insert(name.clone(), coerced);
        }
        Ok(out)
    }

    /// The primary-key values present in `record`, in declaration order.
    pub fn key_of(&self, record: &Record) -> Record {
        self.primary_fields()
            .filter_map(|f| {
                record
                    .get(&f.name)
                    .filter(|v| !v.is_null())
                    .map(|v| (f.name.clone(), v.clone()))
            })
            .collect()
    }

    /// Whether every primary-key field of this entity has a value in
    /// `record`.
    pub fn has_full_key(&self, record: &Record) -> bool {
        self.primary_fields().all(|f| record.has_value(&f.name))
    }

    /// Restrict `record` to the declared fields.
    pub fn project(&self, record: &Record) -> Record {
        self.fields
            .iter()
            .filter_map(|f| record.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect::<Record>()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(name: &str) -> Result<(), SchemaError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}
