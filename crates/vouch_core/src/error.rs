//! Errors that are not lifecycle outcomes.
//!
//! Submit, decide and rectify report their results as statuses; only an
//! unknown entity escapes them as an error. Reads additionally fail with
//! [`LifecycleError::NotPrimaryKeyField`] and
//! [`LifecycleError::DataNotAvailable`].

use thiserror::Error;
use vouch_db::BackendError;
use vouch_schema::MetadataError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("'{field}' is not a primary-key field of {entity}")]
    NotPrimaryKeyField { entity: String, field: String },

    #[error("Data not available in {0}")]
    DataNotAvailable(String),

    #[error("Store error: {0}")]
    Store(#[from] BackendError),
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::Metadata(_) => "METADATA_ERROR",
            LifecycleError::NotPrimaryKeyField { .. } => "NOT_PRIMARY_KEY_FIELD",
            LifecycleError::DataNotAvailable(_) => "DATA_NOT_AVAILABLE",
            LifecycleError::Store(_) => "STORE_ERROR",
        }
    }
}
