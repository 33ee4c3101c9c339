//! Query execution against the property-management database
//!
//! The engine only sees the `QueryExecutor` trait. `PgQueryExecutor` splits a
//! script into statements and runs them in order inside one transaction on a
//! single pooled connection, so temp tables created by earlier statements are
//! visible to later ones.
//!
//! **Result contract**: the first row-returning statement is the result set,
//! even when it matches no rows (its column names are still reported). Later
//! statements run but their rows are ignored. Every value is returned as text
//! and SQL `NULL` becomes `""`.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{Column, Connection, Executor, PgConnection, PgPool, Row};
use thiserror::Error;

/// Default execution timeout for heavy aggregation scripts
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(300);

/// SQLSTATE `query_canceled`, raised by `statement_timeout` and `pg_cancel_backend`
const QUERY_CANCELED: &str = "57014";

/// Errors that can occur while executing a query
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Query timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Row {row} has {actual} values, expected {expected}")]
    RowShape {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Raw tabular result: column names plus textual row values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    column_names: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl QueryResult {
    pub fn new(column_names: Vec<String>) -> Self {
        Self {
            column_names,
            rows: Vec::new(),
        }
    }

    /// Build a result from literal rows, checking every row against the columns
    pub fn from_rows(
        column_names: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self, ExecutorError> {
        let mut result = Self::new(column_names);
        for row in rows {
            result.push_row(row)?;
        }
        Ok(result)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), ExecutorError> {
        if row.len() != self.column_names.len() {
            return Err(ExecutorError::RowShape {
                row: self.rows.len(),
                expected: self.column_names.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.column_names, self.rows)
    }
}

/// Capability to run a SQL statement and return its tabular result
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, ExecutorError>;
}

/// PostgreSQL-backed executor with a per-query timeout
#[derive(Debug, Clone)]
pub struct PgQueryExecutor {
    pool: PgPool,
    timeout: Duration,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

async fn run(
    conn: &mut PgConnection,
    sql: &str,
    timeout: Duration,
) -> Result<QueryResult, ExecutorError> {
    let mut tx = conn.begin().await?;

    // Server-side bound for a single statement; the whole script is bounded by the caller
    let set_timeout = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
    (&mut *tx).execute(sqlx::raw_sql(&set_timeout)).await?;

    let mut result: Option<QueryResult> = None;

    for statement in split_statements(sql) {
        let mut streamed: Option<QueryResult> = None;
        {
            let mut rows = sqlx::raw_sql(statement).fetch(&mut *tx);
            while let Some(row) = rows.try_next().await? {
                if result.is_some() {
                    continue;
                }
                let current =
                    streamed.get_or_insert_with(|| QueryResult::new(column_names(row.columns())));
                current.push_row(row_to_strings(&row)?)?;
            }
        }

        if result.is_some() {
            continue;
        }
        if streamed.is_some() {
            result = streamed;
            continue;
        }

        // No rows: the statement is the result set only if it describes columns
        let described = (&mut *tx).describe(statement).await?;
        if !described.columns().is_empty() {
            result = Some(QueryResult::new(column_names(described.columns())));
        }
    }

    tx.commit().await?;
    Ok(result.unwrap_or_default())
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, ExecutorError> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to acquire database connection");
            ExecutorError::from(e)
        })?;

        let backend_pid: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to identify database session");
                ExecutorError::from(e)
            })?;

        let seconds = self.timeout.as_secs();
        let outcome = tokio::time::timeout(self.timeout, run(&mut conn, sql, self.timeout)).await;
        match outcome {
            Ok(Ok(result)) => {
                tracing::debug!(
                    columns = result.column_names().len(),
                    rows = result.rows().len(),
                    "query executed"
                );
                Ok(result)
            }
            Ok(Err(e)) if is_query_canceled(&e) => {
                tracing::error!(timeout_secs = seconds, "SQL statement timed out");
                Err(ExecutorError::Timeout { seconds })
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Error executing SQL query");
                Err(e)
            }
            Err(_) => {
                tracing::error!(timeout_secs = seconds, backend_pid, "SQL query timed out");
                self.cancel_backend(backend_pid).await;
                // The connection is mid-query; close it rather than return it to the pool
                if let Err(e) = conn.detach().close().await {
                    tracing::warn!(error = %e, "Failed to close timed out connection");
                }
                Err(ExecutorError::Timeout { seconds })
            }
        }
    }
}

impl PgQueryExecutor {
    /// Abort the statement running in `backend_pid` from another pooled connection
    async fn cancel_backend(&self, backend_pid: i32) {
        let cancelled = sqlx::query_scalar::<_, bool>("SELECT pg_cancel_backend($1)")
            .bind(backend_pid)
            .fetch_one(&self.pool)
            .await;

        match cancelled {
            Ok(true) => tracing::info!(backend_pid, "cancelled timed out query"),
            Ok(false) => tracing::warn!(backend_pid, "timed out query was not running"),
            Err(e) => tracing::warn!(backend_pid, error = %e, "Failed to cancel timed out query"),
        }
    }
}

fn is_query_canceled(error: &ExecutorError) -> bool {
    match error {
        ExecutorError::Database(sqlx::Error::Database(db)) => {
            db.code().as_deref() == Some(QUERY_CANCELED)
        }
        _ => false,
    }
}

fn column_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Split a script into statements on top-level `;`
///
/// Quoted strings and identifiers, dollar-quoted bodies and comments are
/// skipped. Segments holding nothing but whitespace or comments are dropped.
fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                has_code = true;
                let backslash_escapes =
                    quote == b'\'' && i > 0 && matches!(bytes[i - 1], b'E' | b'e');
                i += 1;
                while i < bytes.len() {
                    if backslash_escapes && bytes[i] == b'\\' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote {
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let mut depth = 1;
                i += 2;
                while i < bytes.len() && depth > 0 {
                    if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
                        depth += 1;
                        i += 2;
                    } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        depth -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                continue;
            }
            b'$' => {
                has_code = true;
                let in_identifier =
                    i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_');
                if let Some(tag_len) = dollar_tag_len(&bytes[i..]).filter(|_| !in_identifier) {
                    let tag = &bytes[i..i + tag_len];
                    i += tag_len;
                    i = match bytes[i..].windows(tag_len).position(|w| w == tag) {
                        Some(pos) => i + pos + tag_len,
                        None => bytes.len(),
                    };
                    continue;
                }
            }
            b';' => {
                if has_code {
                    statements.push(sql[start..i].trim());
                }
                start = i + 1;
                has_code = false;
            }
            c if !c.is_ascii_whitespace() => has_code = true,
            _ => {}
        }
        i += 1;
    }

    if has_code {
        statements.push(sql[start..].trim());
    }
    statements
}

/// Length of a `$tag$` opener at the start of `s`; positional `$1` is not one
fn dollar_tag_len(s: &[u8]) -> Option<usize> {
    if s.get(1).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut j = 1;
    while j < s.len() && (s[j].is_ascii_alphanumeric() || s[j] == b'_') {
        j += 1;
    }
    (s.get(j) == Some(&b'$')).then_some(j + 1)
}

/// Simple-protocol rows are text encoded, so every column decodes as a string
fn row_to_strings(row: &sqlx::postgres::PgRow) -> Result<Vec<String>, ExecutorError> {
    (0..row.len())
        .map(|i| {
            row.try_get_unchecked::<Option<String>, _>(i)
                .map(Option::unwrap_or_default)
                .map_err(ExecutorError::from)
        })
        .collect()
}
