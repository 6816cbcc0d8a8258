//! The query facade.
//!
//! `Db` owns the connection pool and the table-model registry, and exposes
//! the CRUD operations, raw `query`, transaction entry points, and the
//! sequential schema lifecycle (`sync` / `drop_all` / `rebuild`). Every
//! operation resolves its optional trailing arguments first, compiles the
//! condition second, and only then touches a connection: bad input never
//! costs a lease.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::args::{resolve, Columns, IntoArgs, IntoQueryArgs, IntoTxArg, QueryArgs};
use crate::cond::Cond;
use crate::config::DatabaseConfig;
use crate::error::DbError;
use crate::model::{Model, ModelDef};
use crate::pool::{Connection, ConnectionPool};
use crate::postgres::PgPool;
use crate::row::{ResultSet, Row};
use crate::transaction::{IsolationLevel, Transaction};
use crate::value::{normalize, quote_ident};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// The facade: a cloneable handle over one pool and one model registry.
///
/// Construct with [`Db::new`] for PostgreSQL or [`Db::with_pool`] for any
/// backend (the scripted mock in particular). Clones share the same pool
/// and registry.
///
/// # Examples
///
/// ```
/// use poolside::mock::MockPool;
/// use poolside::{row, Db};
/// use serde_json::json;
///
/// # fn main() -> Result<(), poolside::DbError> {
/// let pool = MockPool::new().append_result(vec![row! { "id" => 1, "name" => "ada" }]);
/// let db = Db::with_pool(Box::new(pool));
///
/// let rows = db.select("users", json!({"id": 1}))?;
/// assert_eq!(rows[0]["name"], json!("ada"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

pub(crate) struct DbInner {
    pool: Box<dyn ConnectionPool>,
    models: Mutex<Vec<Arc<Model>>>,
}

impl DbInner {
    /// Acquire, execute, release. The lease returns to the pool when `conn`
    /// drops, on success and failure alike.
    pub(crate) fn execute_auto(&self, sql: &str, params: &[Value]) -> Result<ResultSet, DbError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        let conn = self.pool.acquire()?;
        conn.execute(sql, params)
    }

    fn models_lock(&self) -> MutexGuard<'_, Vec<Arc<Model>>> {
        self.models
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Db {
    /// Open a facade over a PostgreSQL pool.
    ///
    /// Construction performs no I/O; sessions are established lazily on
    /// first acquire.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Validation` when the configuration is unusable
    /// (malformed URL, zero connections).
    pub fn new(config: DatabaseConfig) -> Result<Db, DbError> {
        let pool = PgPool::new(config)?;
        Ok(Db::with_pool(Box::new(pool)))
    }

    /// Open a facade over any pool implementation.
    pub fn with_pool(pool: Box<dyn ConnectionPool>) -> Db {
        Db {
            inner: Arc::new(DbInner {
                pool,
                models: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a table model, replacing any model with the same table name
    /// while keeping its position in the registry order.
    pub fn define(&self, def: ModelDef) -> Arc<Model> {
        let model = Arc::new(Model::new(def, Arc::downgrade(&self.inner)));
        let mut models = self.inner.models_lock();
        match models
            .iter()
            .position(|m| m.table_name() == model.table_name())
        {
            Some(idx) => models[idx] = Arc::clone(&model),
            None => models.push(Arc::clone(&model)),
        }
        model
    }

    /// Look up a registered model by table name.
    pub fn model(&self, table: &str) -> Option<Arc<Model>> {
        self.inner
            .models_lock()
            .iter()
            .find(|m| m.table_name() == table)
            .cloned()
    }

    /// Registered models in registration order.
    pub fn models(&self) -> Vec<Arc<Model>> {
        self.inner.models_lock().clone()
    }

    /// `SELECT <columns> FROM <table> [WHERE <condition>]`, returning the
    /// rows.
    ///
    /// Optional arguments in any order: a projection (string or string
    /// list, default `*`), a condition (JSON object or [`Cond`]), a
    /// transaction reference.
    ///
    /// # Examples
    ///
    /// ```
    /// # use poolside::{mock::MockPool, Db};
    /// # use serde_json::json;
    /// # fn main() -> Result<(), poolside::DbError> {
    /// # let db = Db::with_pool(Box::new(MockPool::new()));
    /// let all = db.select("users", ())?;
    /// let names = db.select("users", (["id", "name"], json!({"active": true})))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn select<'a>(&self, table: &str, args: impl IntoArgs<'a>) -> Result<Vec<Row>, DbError> {
        let resolved = resolve(args.into_args())?;
        let sql = build_select(table, resolved.columns.as_ref(), resolved.cond.as_ref())?;
        Ok(self.run(&sql, &[], resolved.tx)?.rows)
    }

    /// Like [`Db::select`], bounded to one row.
    ///
    /// The condition is wrapped with a limit of 1 unless it already is a
    /// limit; with no condition the statement still carries `LIMIT 1`.
    pub fn one<'a>(&self, table: &str, args: impl IntoArgs<'a>) -> Result<Option<Row>, DbError> {
        let resolved = resolve(args.into_args())?;
        let cond = match resolved.cond {
            Some(c) if c.is_limit() => c,
            Some(c) => c.limit(1),
            None => Cond::limit_of(None, 1),
        };
        let sql = build_select(table, resolved.columns.as_ref(), Some(&cond))?;
        let mut rows = self.run(&sql, &[], resolved.tx)?.rows;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    /// Insert one row or a non-empty batch, parameter-bound.
    ///
    /// Batch column order comes from the first row; later rows bind by
    /// column name, with `NULL` for missing keys. The whole batch becomes a
    /// single multi-row `INSERT`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Validation` for an empty batch, a non-object row,
    /// or a row with no columns.
    pub fn insert<'a>(
        &self,
        table: &str,
        rows: impl Into<Value>,
        tx: impl IntoTxArg<'a>,
    ) -> Result<ResultSet, DbError> {
        let (sql, params) = build_insert(table, rows.into())?;
        self.run(&sql, &params, tx.into_tx_arg())
    }

    /// Insert one row with values inlined as SQL literals.
    ///
    /// If a model is registered for `table`, the object first goes through
    /// its [`Model::to_row`] transform. Unlike [`Db::insert`], identifiers
    /// are interpolated verbatim and values are rendered as literal text,
    /// not bound. This is the legacy path; prefer `insert` for anything
    /// touched by user input.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Validation` when the object is not a JSON object or
    /// has no columns after the transform.
    pub fn create<'a>(
        &self,
        table: &str,
        obj: impl Into<Value>,
        tx: impl IntoTxArg<'a>,
    ) -> Result<ResultSet, DbError> {
        let value = obj.into();
        let row = match self.model(table) {
            Some(model) => model.to_row(value)?,
            None => match value {
                Value::Object(map) => map,
                other => {
                    return Err(DbError::Validation(format!(
                        "create expects a JSON object, got {other}"
                    )))
                }
            },
        };
        let sql = build_create(table, &row)?;
        self.run(&sql, &[], tx.into_tx_arg())
    }

    /// `UPDATE <table> SET <assignments> [WHERE <condition>]`.
    ///
    /// Assignments are parameter-bound. Without a condition every row is
    /// updated; there is no implicit guard. Scope updates with a condition.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Validation` when the partial row is empty or not an
    /// object.
    pub fn update<'a>(
        &self,
        table: &str,
        row: impl Into<Value>,
        args: impl IntoArgs<'a>,
    ) -> Result<ResultSet, DbError> {
        let resolved = resolve(args.into_args())?;
        let (sql, params) = build_update(table, row.into(), resolved.cond.as_ref())?;
        self.run(&sql, &params, resolved.tx)
    }

    /// `DELETE FROM <table> WHERE <condition>`.
    ///
    /// The condition is mandatory: deleting every row needs an explicit
    /// always-true condition, never an omission.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Validation` when no condition is supplied or the
    /// condition constrains nothing.
    pub fn delete<'a>(&self, table: &str, args: impl IntoArgs<'a>) -> Result<ResultSet, DbError> {
        let resolved = resolve(args.into_args())?;
        let cond = match resolved.cond {
            Some(c) if !c.is_empty() => c,
            _ => {
                return Err(DbError::Validation(
                    "delete requires a non-empty condition".to_string(),
                ))
            }
        };
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(table),
            cond.to_sql()?
        );
        self.run(&sql, &[], resolved.tx)
    }

    /// Row count for a condition, via `SELECT COUNT(1) AS "count"`.
    pub fn count<'a>(&self, table: &str, args: impl IntoArgs<'a>) -> Result<i64, DbError> {
        let resolved = resolve(args.into_args())?;
        let columns = Columns::One(r#"COUNT(1) AS "count""#.to_string());
        let sql = build_select(table, Some(&columns), resolved.cond.as_ref())?;
        let result = self.run(&sql, &[], resolved.tx)?;
        let row = result
            .first()
            .ok_or_else(|| DbError::Query("count returned no rows".to_string()))?;
        row.get("count")
            .and_then(Value::as_i64)
            .ok_or_else(|| DbError::Query("count column missing or not an integer".to_string()))
    }

    /// Run a raw statement.
    ///
    /// Accepts bound values and/or a transaction, in either order. Without a
    /// transaction a connection is leased for just this statement and
    /// released on success and failure alike.
    ///
    /// # Examples
    ///
    /// ```
    /// # use poolside::{mock::MockPool, Db};
    /// # use serde_json::json;
    /// # fn main() -> Result<(), poolside::DbError> {
    /// # let db = Db::with_pool(Box::new(MockPool::new()));
    /// db.query("SELECT pg_advisory_lock($1)", vec![json!(42)])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn query<'a>(&self, sql: &str, args: impl IntoQueryArgs<'a>) -> Result<ResultSet, DbError> {
        let QueryArgs { values, tx } = args.into_query_args();
        self.run(sql, &values, tx)
    }

    /// Create or verify every registered table, in registration order.
    ///
    /// Strictly sequential and fail-fast: a failure stops the chain and
    /// already-created tables stay in place.
    pub fn sync(&self) -> Result<(), DbError> {
        for model in self.models() {
            log::info!("syncing table '{}'", model.table_name());
            model.sync()?;
        }
        Ok(())
    }

    /// Drop every registered table, in registration order, fail-fast.
    pub fn drop_all(&self) -> Result<(), DbError> {
        for model in self.models() {
            log::info!("dropping table '{}'", model.table_name());
            model.drop_table()?;
        }
        Ok(())
    }

    /// Full [`Db::drop_all`] pass, then a full [`Db::sync`] pass.
    pub fn rebuild(&self) -> Result<(), DbError> {
        self.drop_all()?;
        self.sync()
    }

    /// Lease a connection directly. Dropping it releases the lease.
    pub fn get_connection(&self) -> Result<Box<dyn Connection>, DbError> {
        self.inner.pool.acquire()
    }

    /// Open a transaction at the default isolation level.
    pub fn begin_transaction(&self) -> Result<Transaction, DbError> {
        self.begin_transaction_with(IsolationLevel::ReadCommitted)
    }

    /// Open a transaction at a chosen isolation level.
    pub fn begin_transaction_with(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Transaction, DbError> {
        let conn = self.inner.pool.acquire()?;
        Transaction::begin(conn, isolation)
    }

    /// Drain the pool: refuse new leases, wait for in-flight connections,
    /// tear down sessions. Idempotent.
    pub fn close(&self) -> Result<(), DbError> {
        self.inner.pool.drain()
    }

    fn run(&self, sql: &str, params: &[Value], tx: Option<&Transaction>) -> Result<ResultSet, DbError> {
        #[cfg(feature = "metrics")]
        METRICS.record_query();

        let result = match tx {
            Some(tx) => tx.execute(sql, params),
            None => self.inner.execute_auto(sql, params),
        };

        #[cfg(feature = "metrics")]
        if result.is_err() {
            METRICS.record_query_error();
        }
        result
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("models", &self.inner.models_lock().len())
            .finish()
    }
}

fn build_select(
    table: &str,
    columns: Option<&Columns>,
    cond: Option<&Cond>,
) -> Result<String, DbError> {
    let cols = columns.map_or_else(|| "*".to_string(), Columns::to_sql);
    let mut sql = format!("SELECT {} FROM {}", cols, quote_ident(table));
    if let Some(cond) = cond {
        if !cond.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&cond.to_sql()?);
        }
    }
    Ok(sql)
}

fn build_insert(table: &str, value: Value) -> Result<(String, Vec<Value>), DbError> {
    let rows: Vec<Row> = match value {
        Value::Object(map) => vec![map],
        Value::Array(items) => {
            if items.is_empty() {
                return Err(DbError::Validation("insert batch is empty".to_string()));
            }
            let mut rows = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => rows.push(map),
                    other => {
                        return Err(DbError::Validation(format!(
                            "insert batch rows must be JSON objects, got {other}"
                        )))
                    }
                }
            }
            rows
        }
        other => {
            return Err(DbError::Validation(format!(
                "insert expects an object or an array of objects, got {other}"
            )))
        }
    };

    // Column order comes from the first row; map order is deterministic.
    let columns: Vec<String> = rows[0].keys().cloned().collect();
    if columns.is_empty() {
        return Err(DbError::Validation("insert row has no columns".to_string()));
    }

    let mut params = Vec::with_capacity(rows.len() * columns.len());
    let mut tuples = Vec::with_capacity(rows.len());
    let mut placeholder = 1usize;
    for row in &rows {
        let mut slots = Vec::with_capacity(columns.len());
        for column in &columns {
            params.push(row.get(column).cloned().unwrap_or(Value::Null));
            slots.push(format!("${placeholder}"));
            placeholder += 1;
        }
        tuples.push(format!("({})", slots.join(", ")));
    }

    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        quoted.join(", "),
        tuples.join(", ")
    );
    Ok((sql, params))
}

fn build_create(table: &str, row: &Row) -> Result<String, DbError> {
    if row.is_empty() {
        return Err(DbError::Validation("create row has no columns".to_string()));
    }
    let columns: Vec<&str> = row.keys().map(String::as_str).collect();
    let values: Vec<String> = row.values().map(normalize).collect();
    // Legacy shape: identifiers verbatim, values inlined.
    Ok(format!(
        "INSERT INTO {}({}) VALUES({})",
        table,
        columns.join(", "),
        values.join(", ")
    ))
}

fn build_update(
    table: &str,
    row: Value,
    cond: Option<&Cond>,
) -> Result<(String, Vec<Value>), DbError> {
    let map = match row {
        Value::Object(map) => map,
        other => {
            return Err(DbError::Validation(format!(
                "update expects a JSON object of assignments, got {other}"
            )))
        }
    };
    if map.is_empty() {
        return Err(DbError::Validation(
            "update has no columns to assign".to_string(),
        ));
    }

    let mut assignments = Vec::with_capacity(map.len());
    let mut params = Vec::with_capacity(map.len());
    for (idx, (column, value)) in map.iter().enumerate() {
        assignments.push(format!("{} = ${}", quote_ident(column), idx + 1));
        params.push(value.clone());
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_ident(table),
        assignments.join(", ")
    );
    if let Some(cond) = cond {
        if !cond.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&cond.to_sql()?);
        }
    }
    Ok((sql, params))
}
