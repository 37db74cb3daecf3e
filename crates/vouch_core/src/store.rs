//! Transactional store over the staging, authoritative and history
//! relations.
//!
//! Ordinary conditions (zero rows affected, a builder that refused to
//! build) are [`WriteOutcome`]s, not errors. Only backend faults are hard
//! failures.

use crate::statement::{Statement, StatementBuilder};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};
use vouch_db::{BackendError, DbConnection, DbTransaction};
use vouch_schema::{Entity, Record, Relation};

/// Result of one write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied(u64),
    NoRowsAffected,
    /// The builder produced no statement (no primary-key value)
    Refused,
}

impl WriteOutcome {
    fn from_rows(rows: u64) -> Self {
        if rows == 0 {
            WriteOutcome::NoRowsAffected
        } else {
            WriteOutcome::Applied(rows)
        }
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Applied(rows) => write!(f, "applied to {} row(s)", rows),
            WriteOutcome::NoRowsAffected => f.write_str("affected no rows"),
            WriteOutcome::Refused => f.write_str("refused: no primary-key value"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A required write did not apply.
    #[error("{step} {outcome}")]
    StepFailed { step: String, outcome: WriteOutcome },

    #[error("Malformed row in {table}: {reason}")]
    MalformedRow { table: String, reason: String },
}

/// Executes builder output against the physical relations.
#[derive(Debug)]
pub struct TransactionalStore {
    conn: DbConnection,
}

impl TransactionalStore {
    pub fn new(conn: DbConnection) -> Self {
        Self { conn }
    }

    /// Open by URL (`duckdb::memory:` or `duckdb:<path>`).
    pub fn open(url: &str) -> Result<Self, BackendError> {
        Ok(Self::new(DbConnection::open_from_url(url)?))
    }

    pub fn connection(&self) -> &DbConnection {
        &self.conn
    }

    /// Run a select outside any transaction. A refused statement reads
    /// nothing.
    pub fn read(&self, stmt: Option<Statement>) -> Result<Vec<Record>, BackendError> {
        let Some(stmt) = stmt else {
            return Ok(Vec::new());
        };
        let rows = self.conn.query_all(&stmt.sql, &stmt.params)?;
        debug!(table = %stmt.table, rows = rows.len(), "read");
        Ok(rows.into_iter().map(Record::from_db_row).collect())
    }

    /// Run `op` in one transaction: commit on `Ok`, roll back everything
    /// on `Err`.
    pub fn transaction<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: From<BackendError>,
        F: FnOnce(&mut StoreTx<'_, '_>) -> Result<T, E>,
    {
        self.conn.transaction(|tx| {
            let mut store_tx = StoreTx { tx };
            op(&mut store_tx)
        })
    }

    /// Create the staging, authoritative and history relations for
    /// `entity` and each of its beans, if absent.
    pub fn ensure_relations(&self, entity: &Entity) -> Result<(), BackendError> {
        let entities = std::iter::once(entity).chain(entity.beans().iter());
        let ddl: Vec<String> = entities
            .flat_map(|e| {
                let builder = StatementBuilder::new(e);
                Relation::ALL.map(|relation| builder.create_table(relation))
            })
            .collect();

        self.conn.transaction(|tx| {
            for sql in &ddl {
                tx.execute_batch(sql)?;
            }
            Ok::<_, BackendError>(())
        })?;
        info!(entity = entity.entity_name(), relations = ddl.len(), "Relations ready");
        Ok(())
    }
}

/// Store operations bound to an open transaction.
pub struct StoreTx<'t, 'c> {
    tx: &'t mut DbTransaction<'c>,
}

impl StoreTx<'_, '_> {
    pub fn read(&mut self, stmt: Option<Statement>) -> Result<Vec<Record>, BackendError> {
        let Some(stmt) = stmt else {
            return Ok(Vec::new());
        };
        let rows = self.tx.query_all(&stmt.sql, &stmt.params)?;
        Ok(rows.into_iter().map(Record::from_db_row).collect())
    }

    /// Whether a select finds at least one row.
    pub fn exists(&mut self, stmt: Option<Statement>) -> Result<bool, BackendError> {
        Ok(!self.read(stmt)?.is_empty())
    }

    /// Execute an insert, update or delete.
    pub fn write(&mut self, stmt: Option<Statement>) -> Result<WriteOutcome, BackendError> {
        let Some(stmt) = stmt else {
            return Ok(WriteOutcome::Refused);
        };
        let rows = self.tx.execute(&stmt.sql, &stmt.params)?;
        let outcome = WriteOutcome::from_rows(rows);
        debug!(
            table = %stmt.table,
            kind = stmt.kind.as_str(),
            outcome = %outcome,
            "write"
        );
        Ok(outcome)
    }

    /// Execute a write that must touch at least one row.
    pub fn apply(&mut self, stmt: Option<Statement>) -> Result<u64, StoreError> {
        let step = stmt
            .as_ref()
            .map(|s| format!("{} on {}", s.kind.as_str(), s.table))
            .unwrap_or_else(|| "write".to_string());
        match self.write(stmt)? {
            WriteOutcome::Applied(rows) => Ok(rows),
            outcome => Err(StoreError::StepFailed { step, outcome }),
        }
    }
}
