//! Query executor abstraction for the remote source.
//!
//! The remote source only decides which statement text to send and how to
//! decode the result; executing the statement is this collaborator's job.
//! [`PgExecutor`] runs statements over a PostgreSQL connection in simple
//! (text) protocol mode, so every column arrives as an optional string —
//! the same shape scripted test executors produce.

use postgres::{Client, NoTls, SimpleQueryMessage};

/// Error type for remote query execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Connecting or re-connecting failed.
    Connection(String),
    /// The statement itself failed.
    Execution(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Connection(msg) => write!(f, "PostgreSQL: {}", msg),
            QueryError::Execution(msg) => write!(f, "PostgreSQL query error: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}

/// Tabular result of one statement: rows of optional text columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        Self { rows }
    }

    /// Builds a table from string literals, for scripted executors in tests.
    pub fn from_rows(rows: &[&[&str]]) -> Self {
        Self {
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| Some(v.to_string())).collect())
                .collect(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at (row, col); `None` for SQL NULL or out-of-range positions.
    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }
}

/// Executes one statement and returns its full result set.
pub trait QueryExecutor {
    fn execute(&mut self, sql: &str) -> Result<Table, QueryError>;
}

/// Live executor over a PostgreSQL connection.
pub struct PgExecutor {
    client: Client,
}

impl PgExecutor {
    /// Connects with a libpq-style conninfo string
    /// (`host=... port=... user=... dbname=...`).
    pub fn connect(conninfo: &str) -> Result<Self, QueryError> {
        let client =
            Client::connect(conninfo, NoTls).map_err(|e| QueryError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

impl QueryExecutor for PgExecutor {
    fn execute(&mut self, sql: &str) -> Result<Table, QueryError> {
        let messages = self
            .client
            .simple_query(sql)
            .map_err(|e| QueryError::Execution(e.to_string()))?;

        let mut rows = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                let mut columns = Vec::with_capacity(row.len());
                for i in 0..row.len() {
                    columns.push(row.get(i).map(str::to_string));
                }
                rows.push(columns);
            }
        }
        Ok(Table::new(rows))
    }
}
