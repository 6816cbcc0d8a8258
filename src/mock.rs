//! Scripted in-memory backend for tests and offline development.
//!
//! `MockPool` plays the role of the PostgreSQL pool without a server:
//! outcomes are scripted up front (`append_*`), every executed statement is
//! logged with its bound values, and acquire/release counts are tracked so
//! tests can assert the lease discipline, not just the SQL text.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::error::DbError;
use crate::pool::{Connection, ConnectionPool};
use crate::row::{ResultSet, Row};

/// One scripted statement outcome.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return these rows.
    Rows(Vec<Row>),
    /// Return this affected-row count and no rows.
    Affected(u64),
    /// Fail with `DbError::Query` carrying this message.
    Error(String),
}

/// A logged statement: the SQL text and the values bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MockStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<MockOutcome>,
    statements: Vec<MockStatement>,
    acquires: u64,
    releases: u64,
    drained: bool,
    fail_next_acquire: bool,
}

/// Scripted connection pool.
///
/// Unscripted statements succeed with an empty result, so tests only script
/// the outcomes they care about.
///
/// # Examples
///
/// ```
/// use poolside::mock::MockPool;
/// use poolside::pool::ConnectionPool;
///
/// let pool = MockPool::new().append_affected(1);
/// let handle = pool.handle();
///
/// let conn = pool.acquire().unwrap();
/// let result = conn.execute("DELETE FROM \"users\" WHERE \"id\" = 1", &[]).unwrap();
/// drop(conn);
///
/// assert_eq!(result.rows_affected, 1);
/// assert_eq!(handle.sql_log(), vec!["DELETE FROM \"users\" WHERE \"id\" = 1"]);
/// assert_eq!(handle.releases(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockPool {
    state: Arc<Mutex<MockState>>,
}

impl MockPool {
    pub fn new() -> Self {
        MockPool::default()
    }

    /// Script the next statement to return these rows.
    pub fn append_result(self, rows: Vec<Row>) -> Self {
        self.state_lock().script.push_back(MockOutcome::Rows(rows));
        self
    }

    /// Script the next statement to report an affected-row count.
    pub fn append_affected(self, rows_affected: u64) -> Self {
        self.state_lock()
            .script
            .push_back(MockOutcome::Affected(rows_affected));
        self
    }

    /// Script the next statement to fail.
    pub fn append_error(self, message: impl Into<String>) -> Self {
        self.state_lock()
            .script
            .push_back(MockOutcome::Error(message.into()));
        self
    }

    /// An inspection handle that stays valid after the pool moves into the
    /// facade.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn state_lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }
}

// Test-support state survives a panicking holder; recover instead of
// poisoning every later assertion.
fn lock(state: &Arc<Mutex<MockState>>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ConnectionPool for MockPool {
    fn acquire(&self) -> Result<Box<dyn Connection>, DbError> {
        let mut state = self.state_lock();
        if state.drained {
            return Err(DbError::Pool("pool is drained".to_string()));
        }
        if state.fail_next_acquire {
            state.fail_next_acquire = false;
            return Err(DbError::Pool("scripted acquire failure".to_string()));
        }
        state.acquires += 1;
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }

    fn drain(&self) -> Result<(), DbError> {
        self.state_lock().drained = true;
        Ok(())
    }
}

struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl Connection for MockConnection {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ResultSet, DbError> {
        let mut state = lock(&self.state);
        state.statements.push(MockStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match state.script.pop_front() {
            None => Ok(ResultSet::default()),
            Some(MockOutcome::Rows(rows)) => Ok(ResultSet::from_rows(rows)),
            Some(MockOutcome::Affected(n)) => Ok(ResultSet::from_affected(n)),
            Some(MockOutcome::Error(message)) => Err(DbError::Query(message)),
        }
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        lock(&self.state).releases += 1;
    }
}

/// Shared view over a [`MockPool`]'s log and counters.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Every executed statement, in order.
    pub fn statements(&self) -> Vec<MockStatement> {
        lock(&self.state).statements.clone()
    }

    /// Just the SQL texts, in execution order.
    pub fn sql_log(&self) -> Vec<String> {
        lock(&self.state)
            .statements
            .iter()
            .map(|s| s.sql.clone())
            .collect()
    }

    pub fn acquires(&self) -> u64 {
        lock(&self.state).acquires
    }

    pub fn releases(&self) -> u64 {
        lock(&self.state).releases
    }

    /// Leases currently out: acquires minus releases.
    pub fn outstanding(&self) -> u64 {
        let state = lock(&self.state);
        state.acquires - state.releases
    }

    pub fn drained(&self) -> bool {
        lock(&self.state).drained
    }

    /// Make the next acquire fail with a pool error.
    pub fn fail_next_acquire(&self) {
        lock(&self.state).fail_next_acquire = true;
    }

    /// Script further outcomes after the pool has moved into the facade.
    pub fn append(&self, outcome: MockOutcome) {
        lock(&self.state).script.push_back(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(1));
        row.insert("name".to_string(), json!("ada"));
        row
    }

    #[test]
    fn scripted_outcomes_are_consumed_in_order() {
        let pool = MockPool::new()
            .append_result(vec![sample_row()])
            .append_error("duplicate key")
            .append_affected(2);
        let conn = pool.acquire().unwrap();

        let first = conn.execute("SELECT 1", &[]).unwrap();
        assert_eq!(first.rows.len(), 1);

        let second = conn.execute("SELECT 2", &[]).unwrap_err();
        assert!(second.to_string().contains("duplicate key"));

        let third = conn.execute("SELECT 3", &[]).unwrap();
        assert_eq!(third.rows_affected, 2);

        // Past the script: default empty success.
        let fourth = conn.execute("SELECT 4", &[]).unwrap();
        assert!(fourth.is_empty());
    }

    #[test]
    fn statements_and_params_are_logged() {
        let pool = MockPool::new();
        let handle = pool.handle();
        let conn = pool.acquire().unwrap();
        conn.execute("INSERT INTO \"t\" (\"a\") VALUES ($1)", &[json!(5)])
            .unwrap();

        let logged = handle.statements();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].params, vec![json!(5)]);
    }

    #[test]
    fn release_is_counted_once_per_lease() {
        let pool = MockPool::new();
        let handle = pool.handle();

        let conn = pool.acquire().unwrap();
        assert_eq!(handle.outstanding(), 1);
        drop(conn);
        assert_eq!(handle.outstanding(), 0);
        assert_eq!(handle.acquires(), 1);
        assert_eq!(handle.releases(), 1);
    }

    #[test]
    fn drained_pool_refuses_leases() {
        let pool = MockPool::new();
        pool.drain().unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(err.is_pool(), "got {err}");
    }

    #[test]
    fn scripted_acquire_failure_hits_once() {
        let pool = MockPool::new();
        pool.handle().fail_next_acquire();
        assert!(pool.acquire().is_err());
        assert!(pool.acquire().is_ok());
    }
}
