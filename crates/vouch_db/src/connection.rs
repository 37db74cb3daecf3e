//! DuckDB connection and closure-scoped transactions.
//!
//! Every statement runs inside a `debug_span` carrying the leading keyword
//! and an FNV-1a hash of the statement text, so logs identify statements
//! without recording bound values.

use crate::error::BackendError;
use crate::value::{DbRow, DbValue};
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug_span, info};

const MEMORY_URL: &str = "duckdb::memory:";
const FILE_SCHEME: &str = "duckdb:";

/// A single-threaded handle to one DuckDB database.
///
/// Clones share the underlying connection.
#[derive(Clone)]
pub struct DbConnection {
    conn: Rc<duckdb::Connection>,
    location: Rc<str>,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("location", &self.location)
            .finish()
    }
}

impl DbConnection {
    /// `duckdb::memory:` for a private in-memory database, or
    /// `duckdb:<path>` for a file (created along with its directory).
    pub fn open_from_url(url: &str) -> Result<Self, BackendError> {
        if url == MEMORY_URL {
            return Self::open_in_memory();
        }
        match url.strip_prefix(FILE_SCHEME) {
            Some(path) if !path.is_empty() => Self::open_file(Path::new(path)),
            _ => Err(BackendError::UnsupportedUrl(url.to_string())),
        }
    }

    pub fn open_file(path: &Path) -> Result<Self, BackendError> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| BackendError::Location(format!("{}: {}", dir.display(), e)))?;
        }
        let conn = duckdb::Connection::open(path)?;
        info!("Opened DuckDB database: {}", path.display());
        Ok(Self {
            conn: Rc::new(conn),
            location: path.display().to_string().into(),
        })
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = duckdb::Connection::open_in_memory()?;
        info!("Opened in-memory DuckDB database");
        Ok(Self {
            conn: Rc::new(conn),
            location: Rc::from(":memory:"),
        })
    }

    /// Run one statement and return the affected row count.
    pub fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        run_execute(&self.conn, sql, params)
    }

    pub fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        run_batch(&self.conn, sql)
    }

    pub fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        run_query(&self.conn, sql, params)
    }

    /// First cell of the first row.
    pub fn query_scalar<T>(&self, sql: &str, params: &[DbValue]) -> Result<T, BackendError>
    where
        T: TryFrom<DbValue, Error = BackendError>,
    {
        let first = self
            .query_all(sql, params)?
            .into_iter()
            .next()
            .and_then(DbRow::into_first)
            .ok_or(BackendError::NoRows)?;
        T::try_from(first)
    }

    /// Run `op` between BEGIN and COMMIT.
    ///
    /// Any `Err` from `op` rolls the transaction back and is returned as-is,
    /// so callers can abort with their own error type.
    pub fn transaction<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: From<BackendError>,
        F: FnOnce(&mut DbTransaction<'_>) -> Result<T, E>,
    {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(BackendError::from)?;

        let mut tx = DbTransaction { conn: &self.conn };
        match op(&mut tx) {
            Ok(value) => match self.conn.execute_batch("COMMIT") {
                Ok(()) => Ok(value),
                Err(commit_err) => {
                    // DuckDB keeps the transaction open after a failed COMMIT.
                    let _ = self.conn.execute_batch("ROLLBACK");
                    Err(BackendError::Transaction(format!("commit failed: {}", commit_err)).into())
                }
            },
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                    return Err(BackendError::Transaction(format!(
                        "rollback failed: {}",
                        rollback_err
                    ))
                    .into());
                }
                Err(err)
            }
        }
    }
}

/// Statement access inside [`DbConnection::transaction`].
pub struct DbTransaction<'c> {
    conn: &'c duckdb::Connection,
}

impl DbTransaction<'_> {
    pub fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        run_execute(self.conn, sql, params)
    }

    pub fn execute_batch(&mut self, sql: &str) -> Result<(), BackendError> {
        run_batch(self.conn, sql)
    }

    pub fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        run_query(self.conn, sql, params)
    }
}

fn run_execute(
    conn: &duckdb::Connection,
    sql: &str,
    params: &[DbValue],
) -> Result<u64, BackendError> {
    let span = debug_span!(
        "db.exec",
        op = leading_keyword(sql),
        sql_hash = %fnv1a_hex(sql),
        params = params.len(),
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let started = Instant::now();

    let bound: Vec<duckdb::types::Value> = params.iter().map(DbValue::to_duckdb).collect();
    let affected = conn
        .prepare(sql)?
        .execute(duckdb::params_from_iter(bound.iter()))?;

    span.record("duration_ms", started.elapsed().as_millis() as u64);
    Ok(affected as u64)
}

fn run_batch(conn: &duckdb::Connection, sql: &str) -> Result<(), BackendError> {
    let span = debug_span!(
        "db.batch",
        sql_hash = %fnv1a_hex(sql),
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let started = Instant::now();
    conn.execute_batch(sql)?;
    span.record("duration_ms", started.elapsed().as_millis() as u64);
    Ok(())
}

fn run_query(
    conn: &duckdb::Connection,
    sql: &str,
    params: &[DbValue],
) -> Result<Vec<DbRow>, BackendError> {
    let span = debug_span!(
        "db.query",
        op = leading_keyword(sql),
        sql_hash = %fnv1a_hex(sql),
        rows = tracing::field::Empty,
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let started = Instant::now();

    let bound: Vec<duckdb::types::Value> = params.iter().map(DbValue::to_duckdb).collect();
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(bound.iter()))?;

    // Column names are only known once the statement has executed.
    let columns: Rc<[String]> = match rows.as_ref() {
        Some(executed) => (0..executed.column_count())
            .map(|i| {
                executed
                    .column_name(i)
                    .map(|name| name.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect(),
        None => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            cells.push(DbValue::from_duckdb(row.get_ref(i)?));
        }
        out.push(DbRow::new(Rc::clone(&columns), cells));
    }

    span.record("rows", out.len() as u64);
    span.record("duration_ms", started.elapsed().as_millis() as u64);
    Ok(out)
}

/// Double-quote an identifier, doubling any embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn leading_keyword(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

fn fnv1a_hex(sql: &str) -> String {
    let hash = sql.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    });
    format!("{:016x}", hash)
}
