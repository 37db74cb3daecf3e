//! Entity metadata and dynamic records.
//!
//! Every business entity is described by metadata rather than code:
//!
//! 1. **Field**: a named, typed column; declaration order is column order
//! 2. **Entity**: a Module, or a Bean owned by exactly one Module
//! 3. **Record**: field name to [`Value`], with children under `beans`
//! 4. **Relation**: staging (`_TEMP`), authoritative (`_MASTER`) and
//!    history (`_HIST`), each with its own bookkeeping columns
//!
//! # Modules
//!
//! - [`field`]: field definitions and value coercion
//! - [`entity`]: Module/Bean schemas and structural checks
//! - [`record`]: tagged values and records
//! - [`relation`]: relation naming and bookkeeping columns
//! - [`catalog`]: the [`MetadataProvider`] seam and a file-backed catalog

pub mod catalog;
pub mod entity;
pub mod field;
pub mod record;
pub mod relation;

pub use catalog::{Catalog, MetadataError, MetadataProvider};
pub use entity::{is_valid_identifier, Entity, EntityKind, SchemaError};
pub use field::{CoerceError, DataType, Field};
pub use record::{Record, RecordError, Value};
pub use relation::{Relation, BEAN_TAG_KEY, CHILD_RECORDS_KEY};
