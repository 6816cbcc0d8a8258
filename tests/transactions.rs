//! Transaction scoping tests over the scripted mock backend.
//!
//! A scope owns one lease from BEGIN until commit or rollback; operations
//! handed the scope reuse that lease instead of taking their own, and a
//! closed scope refuses everything afterwards.

use poolside::mock::{MockHandle, MockOutcome, MockPool};
use poolside::transaction::IsolationLevel;
use poolside::{Db, DbError};
use serde_json::json;

fn mock_db() -> (Db, MockHandle) {
    let pool = MockPool::new();
    let handle = pool.handle();
    (Db::with_pool(Box::new(pool)), handle)
}

#[test]
fn test_begin_commit_lifecycle() {
    let (db, handle) = mock_db();

    let tx = db.begin_transaction().expect("begin failed");
    assert_eq!(handle.outstanding(), 1);
    assert!(tx.is_open());

    tx.commit().expect("commit failed");

    assert_eq!(handle.sql_log(), vec!["BEGIN", "COMMIT"]);
    assert_eq!(handle.outstanding(), 0);
}

#[test]
fn non_default_isolation_is_set_inside_the_scope() {
    let (db, handle) = mock_db();

    let tx = db
        .begin_transaction_with(IsolationLevel::Serializable)
        .expect("begin failed");
    tx.rollback().expect("rollback failed");

    assert_eq!(
        handle.sql_log(),
        vec![
            "BEGIN",
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
            "ROLLBACK"
        ]
    );
}

#[test]
fn default_isolation_issues_no_set_statement() {
    let (db, handle) = mock_db();
    let tx = db
        .begin_transaction_with(IsolationLevel::ReadCommitted)
        .expect("begin failed");
    tx.commit().expect("commit failed");
    assert_eq!(handle.sql_log(), vec!["BEGIN", "COMMIT"]);
}

#[test]
fn operations_inside_a_scope_reuse_its_lease() {
    let (db, handle) = mock_db();
    let tx = db.begin_transaction().expect("begin failed");

    db.select("users", (json!({"id": 1}), &tx)).expect("select failed");
    db.insert("users", json!({"id": 2, "name": "bob"}), &tx)
        .expect("insert failed");
    db.update("users", json!({"name": "ada"}), (json!({"id": 2}), &tx))
        .expect("update failed");
    db.delete("users", (json!({"id": 2}), &tx)).expect("delete failed");

    // Only the scope's own lease was ever taken.
    assert_eq!(handle.acquires(), 1);

    tx.commit().expect("commit failed");
    assert_eq!(
        handle.sql_log(),
        vec![
            "BEGIN",
            "SELECT * FROM \"users\" WHERE \"id\" = 1",
            "INSERT INTO \"users\" (\"id\", \"name\") VALUES ($1, $2)",
            "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = 2",
            "DELETE FROM \"users\" WHERE \"id\" = 2",
            "COMMIT"
        ]
    );
}

#[test]
fn query_accepts_values_and_a_scope_together() {
    let (db, handle) = mock_db();
    let tx = db.begin_transaction().expect("begin failed");

    db.query(
        "UPDATE \"accounts\" SET \"balance\" = \"balance\" - $1",
        (vec![json!(100)], &tx),
    )
    .expect("query failed");

    tx.commit().expect("commit failed");
    assert_eq!(handle.acquires(), 1);
    let statements = handle.statements();
    assert_eq!(statements[1].params, vec![json!(100)]);
}

#[test]
fn test_closed_scope_refuses_statements() {
    let (db, _handle) = mock_db();
    let tx = db.begin_transaction().expect("begin failed");
    tx.commit().expect("commit failed");

    let err = db.select("users", &tx).unwrap_err();
    assert!(err.is_state(), "got {err}");

    assert!(tx.commit().unwrap_err().is_state());
    assert!(tx.rollback().unwrap_err().is_state());
    assert!(tx.is_closed());
}

#[test]
fn rollback_releases_the_lease() {
    let (db, handle) = mock_db();
    let tx = db.begin_transaction().expect("begin failed");
    tx.rollback().expect("rollback failed");

    assert_eq!(handle.sql_log(), vec!["BEGIN", "ROLLBACK"]);
    assert_eq!(handle.outstanding(), 0);
}

#[test]
fn dropping_an_open_scope_rolls_back() {
    let (db, handle) = mock_db();
    {
        let _tx = db.begin_transaction().expect("begin failed");
        assert_eq!(handle.outstanding(), 1);
    }
    assert_eq!(handle.sql_log(), vec!["BEGIN", "ROLLBACK"]);
    assert_eq!(handle.outstanding(), 0);
}

#[test]
fn dropping_a_committed_scope_does_nothing_more() {
    let (db, handle) = mock_db();
    {
        let tx = db.begin_transaction().expect("begin failed");
        tx.commit().expect("commit failed");
    }
    assert_eq!(handle.sql_log(), vec!["BEGIN", "COMMIT"]);
}

#[test]
fn failed_commit_still_closes_and_releases() {
    let (db, handle) = mock_db();
    let tx = db.begin_transaction().expect("begin failed");

    handle.append(MockOutcome::Error("deadlock detected".to_string()));
    let err = tx.commit().unwrap_err();

    assert!(matches!(err, DbError::Query(_)), "got {err}");
    assert_eq!(handle.outstanding(), 0);
    // The scope is terminal; a retry is a state error, not a second COMMIT.
    assert!(tx.commit().unwrap_err().is_state());
}

#[test]
fn statement_failure_keeps_the_scope_open() {
    let (db, handle) = mock_db();
    let tx = db.begin_transaction().expect("begin failed");

    handle.append(MockOutcome::Error("duplicate key".to_string()));
    let err = db
        .insert("users", json!({"id": 1, "name": "ada"}), &tx)
        .unwrap_err();
    assert!(matches!(err, DbError::Query(_)), "got {err}");

    // The caller decides what a failed statement means for the scope.
    assert!(tx.is_open());
    tx.rollback().expect("rollback failed");
    assert_eq!(handle.outstanding(), 0);
}
