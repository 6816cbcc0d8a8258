//! Bank transfer - transactions under coroutine concurrency.
//!
//! Demonstrates:
//! - Serializable transaction scopes
//! - Routing statements through a scope from several coroutines
//! - Rollback on business-rule failure
//!
//! Requires a reachable PostgreSQL. Configure via `config/config.toml` or
//! environment variables such as `POOLSIDE__DATABASE__URL`.

use poolside::transaction::IsolationLevel;
use poolside::{ColumnDef, DatabaseConfig, Db, DbError, ModelDef};
use serde_json::json;

fn transfer(db: &Db, from: i64, to: i64, amount: i64) -> Result<(), DbError> {
    let tx = db.begin_transaction_with(IsolationLevel::Serializable)?;

    let source = db
        .one("accounts", (json!({"id": from}), &tx))?
        .ok_or_else(|| DbError::Validation(format!("no account {from}")))?;
    let balance = source["balance"].as_i64().unwrap_or(0);
    if balance < amount {
        tx.rollback()?;
        return Err(DbError::Validation(format!(
            "account {from} holds {balance}, cannot send {amount}"
        )));
    }

    db.query(
        "UPDATE \"accounts\" SET \"balance\" = \"balance\" - $1 WHERE \"id\" = $2",
        (vec![json!(amount), json!(from)], &tx),
    )?;
    db.query(
        "UPDATE \"accounts\" SET \"balance\" = \"balance\" + $1 WHERE \"id\" = $2",
        (vec![json!(amount), json!(to)], &tx),
    )?;

    tx.commit()
}

fn main() -> Result<(), DbError> {
    #[cfg(feature = "tracing")]
    poolside::metrics::tracing_helpers::init();

    let config = DatabaseConfig::load().unwrap_or_default();
    let db = Db::new(config)?;

    db.define(
        ModelDef::new("accounts")
            .col(ColumnDef::new("id").big_integer().primary_key())
            .col(ColumnDef::new("owner").text().not_null())
            .col(ColumnDef::new("balance").big_integer().not_null()),
    );
    db.rebuild()?;
    db.insert(
        "accounts",
        json!([
            {"id": 1, "owner": "ada", "balance": 1000},
            {"id": 2, "owner": "bob", "balance": 100}
        ]),
        (),
    )?;
    println!("Accounts seeded");

    // Several coroutines hammer the same pair of accounts; each transfer is
    // its own serializable scope.
    let mut handles = Vec::new();
    for i in 0..4 {
        let db = db.clone();
        handles.push(may::go!(move || {
            match transfer(&db, 1, 2, 50) {
                Ok(()) => println!("[{i}] transferred 50"),
                Err(e) => eprintln!("[{i}] transfer failed: {e}"),
            }
        }));
    }
    for handle in handles {
        let _ = handle.join();
    }

    // Overdraw attempt: the scope rolls back and balances stay intact.
    match transfer(&db, 2, 1, 1_000_000) {
        Ok(()) => println!("unexpected: overdraw succeeded"),
        Err(e) => println!("✓ overdraw refused: {e}"),
    }

    let rows = db.select("accounts", vec!["id", "owner", "balance"])?;
    for row in &rows {
        println!("account {}: {} holds {}", row["id"], row["owner"], row["balance"]);
    }

    db.drop_all()?;
    db.close()?;
    println!("Done");
    Ok(())
}
