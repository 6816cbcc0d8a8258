//! Transaction scope over one leased connection.
//!
//! A scope is created open, accepts statements while open, and ends with
//! exactly one of commit or rollback. Either verb returns the connection to
//! the pool even when its statement fails. Dropping an open scope rolls it
//! back, so an abandoned scope cannot leak its connection or leave the
//! session mid-transaction.

use std::cell::{Cell, RefCell};

use serde_json::Value;

use crate::error::DbError;
use crate::pool::Connection;
use crate::row::ResultSet;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Read uncommitted (PostgreSQL treats it as read committed)
    ReadUncommitted,
    /// Read committed (default)
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

impl IsolationLevel {
    fn to_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Open,
    Committed,
    RolledBack,
}

/// A unit of work bound to one connection, spanning begin to commit or
/// rollback.
///
/// The scope is a single-owner value: it is `Send` but not `Sync`, so two
/// coroutines cannot issue statements on the same connection.
/// Statements on a committed or rolled-back scope fail with
/// `DbError::State`.
///
/// # Examples
///
/// ```
/// use poolside::mock::MockPool;
/// use poolside::Db;
/// use serde_json::json;
///
/// # fn main() -> Result<(), poolside::DbError> {
/// let db = Db::with_pool(Box::new(MockPool::new()));
/// let tx = db.begin_transaction()?;
/// db.insert("users", json!({"id": 1, "name": "ada"}), &tx)?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction {
    conn: RefCell<Option<Box<dyn Connection>>>,
    state: Cell<TxState>,
    isolation: IsolationLevel,
}

impl Transaction {
    /// Open a scope on a freshly leased connection.
    ///
    /// Issues `BEGIN`, then `SET TRANSACTION ISOLATION LEVEL` inside the new
    /// transaction when a non-default level was requested. On any failure the
    /// connection goes straight back to the pool.
    pub(crate) fn begin(
        conn: Box<dyn Connection>,
        isolation: IsolationLevel,
    ) -> Result<Transaction, DbError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        conn.begin_work()?;

        if isolation != IsolationLevel::ReadCommitted {
            let isolation_sql = format!(
                "SET TRANSACTION ISOLATION LEVEL {}",
                isolation.to_sql()
            );
            if let Err(err) = conn.execute(isolation_sql.as_str(), &[]) {
                // Leave the session clean before the lease returns.
                if let Err(rollback_err) = conn.rollback() {
                    log::warn!("rollback after failed isolation setup failed: {rollback_err}");
                }
                return Err(err);
            }
        }

        Ok(Transaction {
            conn: RefCell::new(Some(conn)),
            state: Cell::new(TxState::Open),
            isolation,
        })
    }

    /// Run one statement on this scope's connection.
    ///
    /// # Errors
    ///
    /// Returns `DbError::State` when the scope is no longer open, otherwise
    /// whatever the statement itself produces.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<ResultSet, DbError> {
        if self.state.get() != TxState::Open {
            return Err(self.closed_error());
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        let guard = self.conn.borrow();
        match guard.as_ref() {
            Some(conn) => conn.execute(sql, params),
            None => Err(self.closed_error()),
        }
    }

    /// Commit the transaction and release its connection.
    ///
    /// The connection returns to the pool whether or not the `COMMIT`
    /// statement succeeds; a failure is surfaced after release.
    ///
    /// # Errors
    ///
    /// Returns `DbError::State` when the scope already ended.
    pub fn commit(&self) -> Result<(), DbError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        let result = self.finish(TxState::Committed);
        #[cfg(feature = "metrics")]
        if result.is_ok() {
            METRICS.record_commit();
        }
        result
    }

    /// Roll back the transaction and release its connection.
    ///
    /// Release is unconditional, exactly as for [`Transaction::commit`].
    ///
    /// # Errors
    ///
    /// Returns `DbError::State` when the scope already ended.
    pub fn rollback(&self) -> Result<(), DbError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        let result = self.finish(TxState::RolledBack);
        #[cfg(feature = "metrics")]
        if result.is_ok() {
            METRICS.record_rollback();
        }
        result
    }

    fn finish(&self, target: TxState) -> Result<(), DbError> {
        if self.state.get() != TxState::Open {
            return Err(self.closed_error());
        }
        // Terminal before the statement runs: even a failing COMMIT/ROLLBACK
        // must not leave the scope reusable.
        self.state.set(target);

        let conn = match self.conn.borrow_mut().take() {
            Some(conn) => conn,
            None => return Err(self.closed_error()),
        };
        let result = match target {
            TxState::Committed => conn.commit(),
            TxState::RolledBack => conn.rollback(),
            TxState::Open => unreachable!("finish is never called with an open target"),
        };
        // `conn` drops here: released on success and failure alike.
        result
    }

    /// True while the scope accepts statements.
    pub fn is_open(&self) -> bool {
        self.state.get() == TxState::Open
    }

    /// True after commit or rollback.
    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    /// The isolation level this scope was opened with.
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    fn closed_error(&self) -> DbError {
        DbError::State(
            "transaction has already been committed or rolled back".to_string(),
        )
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state.get() != TxState::Open {
            return;
        }
        if let Some(conn) = self.conn.get_mut().take() {
            log::warn!("transaction dropped while open; rolling back");
            if let Err(err) = conn.rollback() {
                log::warn!("rollback of abandoned transaction failed: {err}");
            }
            #[cfg(feature = "metrics")]
            METRICS.record_rollback();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state.get())
            .field("isolation", &self.isolation)
            .finish()
    }
}
