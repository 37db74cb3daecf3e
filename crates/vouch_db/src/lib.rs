//! Embedded DuckDB storage for vouch.
//!
//! One database file (or a private in-memory database in tests) holds the
//! staging, authoritative and history relations of every entity. Writes
//! that must land together go through [`DbConnection::transaction`]:
//!
//! ```rust,ignore
//! use vouch_db::{BackendError, DbConnection, DbValue};
//!
//! let conn = DbConnection::open_from_url("duckdb:./vouch.duckdb")?;
//! conn.transaction(|tx| {
//!     tx.execute("INSERT INTO t (id) VALUES (?)", &[DbValue::from(1_i64)])?;
//!     Ok::<_, BackendError>(())
//! })?;
//! ```

mod connection;
mod error;
mod value;

pub use connection::{quote_ident, DbConnection, DbTransaction};
pub use error::BackendError;
pub use value::{DbRow, DbTimestamp, DbValue, TimestampError};
