//! Error taxonomy for the facade.
//!
//! Every public operation returns `Result<_, DbError>`. The variants partition
//! failures by which layer refused: the pool, the server, schema management,
//! input validation, or a scope used after it was closed.

use std::fmt;

/// Unified error type for all facade operations.
#[derive(Debug)]
pub enum DbError {
    /// Connection acquisition failed (pool exhausted past its timeout,
    /// pool already drained, or the backend refused the session).
    Pool(String),
    /// The backend rejected a statement, or a row could not be decoded.
    Query(String),
    /// A DDL step failed during `sync`, `drop_all`, or `rebuild`.
    Schema {
        /// Table whose DDL step failed.
        table: String,
        /// Backend message for the failing statement.
        message: String,
    },
    /// The caller's input cannot produce well-formed SQL.
    Validation(String),
    /// An operation was invoked on a closed scope (committed, rolled back,
    /// or drained).
    State(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Pool(s) => {
                write!(f, "Pool error: {s}")
            }
            DbError::Query(s) => {
                write!(f, "Query error: {s}")
            }
            DbError::Schema { table, message } => {
                write!(f, "Schema error on table '{table}': {message}")
            }
            DbError::Validation(s) => {
                write!(f, "Validation error: {s}")
            }
            DbError::State(s) => {
                write!(f, "State error: {s}")
            }
        }
    }
}

impl std::error::Error for DbError {}

impl From<may_postgres::Error> for DbError {
    fn from(err: may_postgres::Error) -> Self {
        DbError::Query(err.to_string())
    }
}

impl DbError {
    /// True when the error came from the pool layer.
    pub fn is_pool(&self) -> bool {
        matches!(self, DbError::Pool(_))
    }

    /// True when the error reports invalid caller input.
    pub fn is_validation(&self) -> bool {
        matches!(self, DbError::Validation(_))
    }

    /// True when the error reports use of a closed scope.
    pub fn is_state(&self) -> bool {
        matches!(self, DbError::State(_))
    }
}
