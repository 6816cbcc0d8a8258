//! # Poolside
//!
//! Coroutine-safe PostgreSQL access facade on the `may` runtime.
//!
//! One [`Db`] handle owns a connection pool and a table-model registry and
//! exposes JSON-in, JSON-out CRUD: conditions are plain JSON objects or a
//! [`Cond`] tree, rows are `serde_json` maps, and every operation optionally
//! takes a [`Transaction`] to run inside an open scope instead of a
//! per-statement lease.
//!
//! ```no_run
//! use poolside::{Db, DatabaseConfig};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), poolside::DbError> {
//! let db = Db::new(DatabaseConfig::load().map_err(|e| {
//!     poolside::DbError::Validation(e.to_string())
//! })?)?;
//!
//! db.insert("users", json!({"id": 1, "name": "ada"}), ())?;
//! let admins = db.select("users", json!({"role": "admin"}))?;
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod cond;
pub mod config;
pub mod db;
pub mod error;
mod macros;
pub mod metrics;
pub mod mock;
pub mod model;
pub mod pool;
pub mod postgres;
pub mod row;
pub mod transaction;
pub mod value;

pub use cond::Cond;
pub use config::DatabaseConfig;
pub use db::Db;
pub use error::DbError;
pub use model::{ColumnDef, Model, ModelDef};
pub use row::{ResultSet, Row};
pub use transaction::{IsolationLevel, Transaction};

#[doc(hidden)]
pub use serde_json as __serde_json;
