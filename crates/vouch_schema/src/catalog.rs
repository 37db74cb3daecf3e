//! Metadata lookup: the [`MetadataProvider`] seam and a declarative
//! [`Catalog`] implementation loaded from JSON or TOML.

use crate::entity::{Entity, SchemaError};
use crate::field::Field;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A Bean has no lifecycle of its own.
    #[error("'{0}' is a bean and is only reachable through its module")]
    NotAModule(String),

    #[error("Invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Entity '{0}' is registered more than once")]
    DuplicateEntity(String),

    #[error("Failed to parse catalog: {0}")]
    Parse(String),

    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves Module schemas by name.
pub trait MetadataProvider {
    fn schema(&self, entity_name: &str) -> Result<Entity, MetadataError>;

    fn primary_field_names(&self, entity_name: &str) -> Result<Vec<String>, MetadataError> {
        Ok(self
            .schema(entity_name)?
            .primary_field_names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityDef {
    entity_name: String,
    fields: Vec<Field>,
    #[serde(default)]
    beans: Vec<EntityDef>,
}

impl EntityDef {
    fn into_entity(self, as_bean: bool) -> Entity {
        let base = if as_bean {
            Entity::bean(self.entity_name, self.fields)
        } else {
            Entity::module(self.entity_name, self.fields)
        };
        self.beans
            .into_iter()
            .fold(base, |entity, bean| entity.with_bean(bean.into_entity(true)))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    entities: Vec<EntityDef>,
}

/// In-memory set of Module schemas.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    modules: BTreeMap<String, Entity>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validated Module.
    pub fn register(&mut self, entity: Entity) -> Result<(), MetadataError> {
        entity.validate()?;
        let name = entity.entity_name().to_string();
        if self.modules.contains_key(&name) || self.find_bean(&name).is_some() {
            return Err(MetadataError::DuplicateEntity(name));
        }
        self.modules.insert(name, entity);
        Ok(())
    }

    pub fn with_entity(mut self, entity: Entity) -> Result<Self, MetadataError> {
        self.register(entity)?;
        Ok(self)
    }

    pub fn from_json_str(text: &str) -> Result<Self, MetadataError> {
        let file: CatalogFile =
            serde_json::from_str(text).map_err(|e| MetadataError::Parse(e.to_string()))?;
        Self::from_file(file)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, MetadataError> {
        let file: CatalogFile =
            toml::from_str(text).map_err(|e| MetadataError::Parse(e.to_string()))?;
        Self::from_file(file)
    }

    /// Load a catalog file. `.toml` files parse as TOML, anything else as
    /// JSON.
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let text = std::fs::read_to_string(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }

    fn from_file(file: CatalogFile) -> Result<Self, MetadataError> {
        let mut catalog = Catalog::new();
        for def in file.entities {
            catalog.register(def.into_entity(false))?;
        }
        Ok(catalog)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Entity> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn find_bean(&self, name: &str) -> Option<&Entity> {
        self.modules.values().find_map(|m| m.bean_named(name))
    }
}

impl MetadataProvider for Catalog {
    fn schema(&self, entity_name: &str) -> Result<Entity, MetadataError> {
        if let Some(module) = self.modules.get(entity_name) {
            return Ok(module.clone());
        }
        match self.find_bean(entity_name) {
            Some(_) => Err(MetadataError::NotAModule(entity_name.to_string())),
            None => Err(MetadataError::UnknownEntity(entity_name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::DataType;

    const JSON: &str = r#"{
        "entities": [{
            "entityName": "EMPLOYEE",
            "fields": [
                {"name": "EMP_ID", "primaryKey": true, "dataType": "INTEGER"},
                {"name": "NAME", "required": true, "maxLength": 40}
            ],
            "beans": [{
                "entityName": "ADDRESS",
                "fields": [
                    {"name": "ADDR_ID", "primaryKey": true, "dataType": "INTEGER"},
                    {"name": "EMP_ID", "dataType": "INTEGER"},
                    {"name": "CITY"}
                ]
            }]
        }]
    }"#;

    #[test]
    fn loads_modules_and_beans_from_json() {
        let catalog = Catalog::from_json_str(JSON).unwrap();
        assert_eq!(catalog.len(), 1);

        let employee = catalog.schema("EMPLOYEE").unwrap();
        assert_eq!(employee.primary_field_names(), vec!["EMP_ID"]);
        assert_eq!(employee.field("NAME").unwrap().max_length, Some(40));
        assert!(employee.beans()[0].is_sub_bean());

        let address = &employee.beans()[0];
        assert_eq!(address.entity_name(), "ADDRESS");
        assert_eq!(address.field("EMP_ID").unwrap().data_type, DataType::Integer);
    }

    #[test]
    fn beans_do_not_resolve_as_modules() {
        let catalog = Catalog::from_json_str(JSON).unwrap();
        assert!(matches!(
            catalog.schema("ADDRESS"),
            Err(MetadataError::NotAModule(name)) if name == "ADDRESS"
        ));
        assert!(catalog.primary_field_names("ADDRESS").is_err());
    }

    #[test]
    fn loads_toml() {
        let catalog = Catalog::from_toml_str(
            r#"
            [[entities]]
            entityName = "DEPARTMENT"
            fields = [
                { name = "DEPT_ID", primaryKey = true },
                { name = "TITLE" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(
            catalog.primary_field_names("DEPARTMENT").unwrap(),
            vec!["DEPT_ID".to_string()]
        );
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let catalog = Catalog::from_json_str(JSON).unwrap();
        assert!(matches!(
            catalog.schema("PAYROLL"),
            Err(MetadataError::UnknownEntity(name)) if name == "PAYROLL"
        ));
    }

    #[test]
    fn rejects_invalid_schemas_and_duplicates() {
        let keyless = r#"{"entities":[{"entityName":"E","fields":[{"name":"A"}]}]}"#;
        assert!(matches!(
            Catalog::from_json_str(keyless),
            Err(MetadataError::Schema(SchemaError::NoPrimaryKey(_)))
        ));

        let twice = r#"{"entities":[
            {"entityName":"E","fields":[{"name":"A","primaryKey":true}]},
            {"entityName":"E","fields":[{"name":"A","primaryKey":true}]}
        ]}"#;
        assert!(matches!(
            Catalog::from_json_str(twice),
            Err(MetadataError::DuplicateEntity(_))
        ));
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, JSON).unwrap();
        assert!(Catalog::load(&path).unwrap().schema("EMPLOYEE").is_ok());

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Catalog::load(&missing), Err(MetadataError::Io { .. })));
    }
}
