use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Unsupported database URL: {0}")]
    UnsupportedUrl(String),

    #[error("Cannot prepare database location: {0}")]
    Location(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A cell or scalar did not have the requested type.
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Query returned no rows")]
    NoRows,

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}
