//! Maker-checker lifecycle for metadata-described entities.
//!
//! A maker submits a change; it waits in the staging relation until a
//! checker approves it (authoritative + history), rejects it (history) or
//! returns it for rectification (staging, back to the maker).
//!
//! # Modules
//!
//! - [`statement`]: parameterized SQL from schema + record
//! - [`store`]: transactions and write outcomes over the three relations
//! - [`decompose`]: parent/child splitting and read-side recomposition
//! - [`validation`]: the [`ValidationService`] seam and [`SchemaValidator`]
//! - [`lifecycle`]: [`LifecycleOrchestrator`], the top-level operations
//! - [`status`]: request kinds, actions and operation outcomes

pub mod actor;
pub mod decompose;
pub mod error;
pub mod lifecycle;
pub mod statement;
pub mod status;
pub mod store;
pub mod validation;

pub use actor::{Actor, Stamp};
pub use error::LifecycleError;
pub use lifecycle::LifecycleOrchestrator;
pub use statement::{Statement, StatementBuilder, StatementKind, UpdateTarget};
pub use status::{
    Action, DecisionStatus, RectifyStatus, RequestKind, RowStatus, SubmitStatus, ValidationErrors,
};
pub use store::{StoreError, StoreTx, TransactionalStore, WriteOutcome};
pub use validation::{SchemaValidator, ValidationService};
