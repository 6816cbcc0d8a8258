//! Quickstart - the facade end to end.
//!
//! Demonstrates the core surface of poolside:
//! - Defining table models and rebuilding the schema
//! - Bound inserts, legacy literal inserts, batch inserts
//! - Conditions as JSON objects and as `Cond` trees
//! - Counting, updating, deleting
//!
//! Requires a reachable PostgreSQL. Configure via `config/config.toml` or
//! environment variables such as `POOLSIDE__DATABASE__URL`.

use poolside::cond::Cond;
use poolside::{ColumnDef, DatabaseConfig, Db, DbError, ModelDef};
use serde_json::json;

fn main() -> Result<(), DbError> {
    #[cfg(feature = "tracing")]
    poolside::metrics::tracing_helpers::init();

    let config = DatabaseConfig::load().unwrap_or_default();
    let db = Db::new(config)?;

    // Example 1: define models and rebuild the schema
    println!("Example 1: schema rebuild");
    db.define(
        ModelDef::new("demo_users")
            .col(ColumnDef::new("id").big_integer().primary_key())
            .col(ColumnDef::new("name").string_len(100).not_null())
            .col(ColumnDef::new("role").text())
            .col(ColumnDef::new("active").boolean().default_value(true)),
    );
    db.rebuild()?;
    println!("✓ demo_users table ready\n");

    // Example 2: inserts
    println!("Example 2: inserts");
    db.insert("demo_users", json!({"id": 1, "name": "Ada", "role": "admin"}), ())?;
    db.insert(
        "demo_users",
        json!([
            {"id": 2, "name": "Grace", "role": "ops"},
            {"id": 3, "name": "Edsger"}
        ]),
        (),
    )?;
    // The legacy literal path goes through the model's defaults.
    db.create("demo_users", json!({"id": 4, "name": "Barbara", "role": "admin"}), ())?;
    println!("✓ four rows inserted\n");

    // Example 3: reads
    println!("Example 3: reads");
    let admins = db.select("demo_users", (vec!["id", "name"], json!({"role": "admin"})))?;
    println!("✓ {} admins", admins.len());

    let first = db.one("demo_users", Cond::like("name", "G%"))?;
    match first {
        Some(row) => println!("✓ first G name: {}", row["name"]),
        None => println!("✓ no matching row"),
    }

    let active = db.count("demo_users", json!({"active": true}))?;
    println!("✓ {active} active users\n");

    // Example 4: update and delete
    println!("Example 4: update and delete");
    let updated = db.update(
        "demo_users",
        json!({"role": "emeritus"}),
        Cond::is_in("id", [2, 3]),
    )?;
    println!("✓ {} rows updated", updated.rows_affected);

    let removed = db.delete("demo_users", json!({"id": 4}))?;
    println!("✓ {} rows deleted\n", removed.rows_affected);

    // Cleanup
    db.drop_all()?;
    db.close()?;
    println!("All examples completed successfully!");
    Ok(())
}
