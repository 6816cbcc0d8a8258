//! Backend contracts: a pool that leases connections, and a connection that
//! runs statements.
//!
//! The facade only ever talks to these traits, so the PostgreSQL backend and
//! the scripted mock are interchangeable. Release is tied to ownership: a
//! leased connection returns to its pool when the box is dropped, on every
//! exit path. There is no separate release call to forget.

use serde_json::Value;

use crate::error::DbError;
use crate::row::ResultSet;

/// A leased backend session.
///
/// One statement at a time; the facade never shares a connection between
/// concurrent operations. Dropping the connection returns it to its pool.
pub trait Connection: Send {
    /// Run one statement with positionally bound values (`$1`, `$2`, ...).
    ///
    /// Statements that produce rows return them decoded; statements that do
    /// not report their affected-row count.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Query` when the backend rejects the statement or a
    /// row value cannot be decoded.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ResultSet, DbError>;

    /// Open a transaction on this connection.
    fn begin_work(&self) -> Result<(), DbError> {
        self.execute("BEGIN", &[]).map(|_| ())
    }

    /// Commit the open transaction.
    fn commit(&self) -> Result<(), DbError> {
        self.execute("COMMIT", &[]).map(|_| ())
    }

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<(), DbError> {
        self.execute("ROLLBACK", &[]).map(|_| ())
    }
}

impl std::fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<connection>")
    }
}

/// A pool of reusable backend sessions.
pub trait ConnectionPool: Send + Sync {
    /// Lease a connection. Blocks the calling coroutine until one is free or
    /// the pool's acquire timeout passes.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` when the pool is drained, the timeout
    /// elapses, or a new session cannot be established.
    fn acquire(&self) -> Result<Box<dyn Connection>, DbError>;

    /// Close the pool: refuse new leases, then wait for in-flight
    /// connections to come back before tearing sessions down.
    ///
    /// Draining an already-drained pool is a no-op.
    fn drain(&self) -> Result<(), DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Connection for Recorder {
        fn execute(&self, sql: &str, _params: &[Value]) -> Result<ResultSet, DbError> {
            self.seen.lock().unwrap().push(sql.to_string());
            Ok(ResultSet::default())
        }
    }

    #[test]
    fn default_transaction_verbs_route_through_execute() {
        let conn = Recorder {
            seen: Mutex::new(Vec::new()),
        };
        conn.begin_work().unwrap();
        conn.commit().unwrap();
        conn.rollback().unwrap();
        assert_eq!(*conn.seen.lock().unwrap(), ["BEGIN", "COMMIT", "ROLLBACK"]);
    }
}
