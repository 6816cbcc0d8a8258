//! Table models: column definitions, generated DDL, and the row transform
//! applied by `create`.
//!
//! A `ModelDef` is built with chained setters, registered on the facade with
//! `define`, and from then on drives `sync` / `drop_table` for its table.
//! Models are runtime values, not derived types: the registry can be built
//! from configuration as easily as from code.

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::db::DbInner;
use crate::error::DbError;
use crate::row::Row;
use crate::value::{normalize, quote_ident};

/// Column data types, rendered to PostgreSQL DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    Serial,
    BigSerial,
    Real,
    DoublePrecision,
    Decimal { precision: u32, scale: u32 },
    Text,
    Varchar(u32),
    Boolean,
    Timestamp,
    TimestampTz,
    Date,
    Uuid,
    Json,
    Jsonb,
}

impl ColumnType {
    fn to_sql(&self) -> String {
        match self {
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Serial => "SERIAL".to_string(),
            ColumnType::BigSerial => "BIGSERIAL".to_string(),
            ColumnType::Real => "REAL".to_string(),
            ColumnType::DoublePrecision => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal { precision, scale } => {
                format!("NUMERIC({precision}, {scale})")
            }
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Varchar(len) => format!("VARCHAR({len})"),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::TimestampTz => "TIMESTAMPTZ".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Jsonb => "JSONB".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ColumnDefault {
    /// A literal value, also applied client-side by `to_row`.
    Value(Value),
    /// A verbatim SQL expression such as `NOW()`; DDL-only.
    Expr(String),
}

/// One column of a model, built with chained setters.
///
/// # Examples
///
/// ```
/// use poolside::model::ColumnDef;
///
/// let id = ColumnDef::new("id").big_integer().primary_key();
/// let name = ColumnDef::new("name").string_len(255).not_null();
/// # let _ = (id, name);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    name: String,
    ty: Option<ColumnType>,
    not_null: bool,
    primary_key: bool,
    unique: bool,
    default: Option<ColumnDefault>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            ty: None,
            not_null: false,
            primary_key: false,
            unique: false,
            default: None,
        }
    }

    pub fn small_integer(mut self) -> Self {
        self.ty = Some(ColumnType::SmallInt);
        self
    }

    pub fn integer(mut self) -> Self {
        self.ty = Some(ColumnType::Integer);
        self
    }

    pub fn big_integer(mut self) -> Self {
        self.ty = Some(ColumnType::BigInt);
        self
    }

    pub fn serial(mut self) -> Self {
        self.ty = Some(ColumnType::Serial);
        self
    }

    pub fn big_serial(mut self) -> Self {
        self.ty = Some(ColumnType::BigSerial);
        self
    }

    pub fn real(mut self) -> Self {
        self.ty = Some(ColumnType::Real);
        self
    }

    pub fn double(mut self) -> Self {
        self.ty = Some(ColumnType::DoublePrecision);
        self
    }

    pub fn decimal(mut self, precision: u32, scale: u32) -> Self {
        self.ty = Some(ColumnType::Decimal { precision, scale });
        self
    }

    pub fn text(mut self) -> Self {
        self.ty = Some(ColumnType::Text);
        self
    }

    /// `VARCHAR(len)`
    pub fn string_len(mut self, len: u32) -> Self {
        self.ty = Some(ColumnType::Varchar(len));
        self
    }

    pub fn boolean(mut self) -> Self {
        self.ty = Some(ColumnType::Boolean);
        self
    }

    pub fn timestamp(mut self) -> Self {
        self.ty = Some(ColumnType::Timestamp);
        self
    }

    pub fn timestamptz(mut self) -> Self {
        self.ty = Some(ColumnType::TimestampTz);
        self
    }

    pub fn date(mut self) -> Self {
        self.ty = Some(ColumnType::Date);
        self
    }

    pub fn uuid(mut self) -> Self {
        self.ty = Some(ColumnType::Uuid);
        self
    }

    pub fn json(mut self) -> Self {
        self.ty = Some(ColumnType::Json);
        self
    }

    pub fn jsonb(mut self) -> Self {
        self.ty = Some(ColumnType::Jsonb);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Literal default. Also filled into rows by [`Model::to_row`] when the
    /// input omits this column.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    /// Verbatim SQL default expression, e.g. `NOW()`. DDL-only; `to_row`
    /// leaves the column to the server.
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(ColumnDefault::Expr(expr.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn render(&self) -> Result<String, DbError> {
        let ty = self.ty.as_ref().ok_or_else(|| {
            DbError::Validation(format!("column '{}' has no type", self.name))
        })?;
        let mut sql = format!("{} {}", quote_ident(&self.name), ty.to_sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        match &self.default {
            Some(ColumnDefault::Value(value)) => {
                sql.push_str(" DEFAULT ");
                sql.push_str(&normalize(value));
            }
            Some(ColumnDefault::Expr(expr)) => {
                sql.push_str(" DEFAULT ");
                sql.push_str(expr);
            }
            None => {}
        }
        Ok(sql)
    }
}

/// Row transform run by `create` before SQL generation.
pub type RowTransform = Arc<dyn Fn(Row) -> Row + Send + Sync>;

/// A table definition: name, columns, optional row transform.
#[derive(Clone)]
pub struct ModelDef {
    table: String,
    columns: Vec<ColumnDef>,
    transform: Option<RowTransform>,
}

impl ModelDef {
    pub fn new(table: impl Into<String>) -> Self {
        ModelDef {
            table: table.into(),
            columns: Vec::new(),
            transform: None,
        }
    }

    /// Append a column. Columns render in the order they are added.
    pub fn col(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Install the row transform applied by `create`.
    pub fn transform(mut self, f: impl Fn(Row) -> Row + Send + Sync + 'static) -> Self {
        self.transform = Some(Arc::new(f));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }
}

impl fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDef")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// A registered model: the definition plus a handle back to its facade so
/// schema operations work on the model itself.
pub struct Model {
    def: ModelDef,
    db: Weak<DbInner>,
}

impl Model {
    pub(crate) fn new(def: ModelDef, db: Weak<DbInner>) -> Self {
        Model { def, db }
    }

    pub fn table_name(&self) -> &str {
        self.def.table()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        self.def.columns()
    }

    /// `CREATE TABLE IF NOT EXISTS` for this model.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Validation` when the model has no columns or a
    /// column has no type.
    pub fn create_sql(&self) -> Result<String, DbError> {
        if self.def.columns.is_empty() {
            return Err(DbError::Validation(format!(
                "model '{}' has no columns",
                self.def.table
            )));
        }
        let mut cols = Vec::with_capacity(self.def.columns.len());
        for column in &self.def.columns {
            cols.push(column.render()?);
        }
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.def.table),
            cols.join(", ")
        ))
    }

    /// `DROP TABLE IF EXISTS` for this model.
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(&self.def.table))
    }

    /// Create or verify this model's table.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Schema` naming the table on any failure.
    pub fn sync(&self) -> Result<(), DbError> {
        let sql = self.create_sql().map_err(|e| self.schema_error(e))?;
        self.run_ddl(&sql)
    }

    /// Drop this model's table.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Schema` naming the table on any failure.
    pub fn drop_table(&self) -> Result<(), DbError> {
        self.run_ddl(&self.drop_sql())
    }

    /// Apply column defaults and the model's transform to an input object.
    ///
    /// Defaults fill missing keys first, then the transform sees the
    /// completed row.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Validation` when the input is not a JSON object.
    pub fn to_row(&self, obj: Value) -> Result<Row, DbError> {
        let mut row = match obj {
            Value::Object(map) => map,
            other => {
                return Err(DbError::Validation(format!(
                    "row for table '{}' must be a JSON object, got {other}",
                    self.def.table
                )))
            }
        };
        for column in &self.def.columns {
            if let Some(ColumnDefault::Value(default)) = &column.default {
                if !row.contains_key(&column.name) {
                    row.insert(column.name.clone(), default.clone());
                }
            }
        }
        Ok(match &self.def.transform {
            Some(f) => f(row),
            None => row,
        })
    }

    fn run_ddl(&self, sql: &str) -> Result<(), DbError> {
        let db = match self.db.upgrade() {
            Some(db) => db,
            None => {
                return Err(self.schema_error(DbError::State(format!(
                    "facade owning model '{}' has been dropped",
                    self.def.table
                ))))
            }
        };
        db.execute_auto(sql, &[])
            .map(|_| ())
            .map_err(|e| self.schema_error(e))
    }

    fn schema_error(&self, source: DbError) -> DbError {
        DbError::Schema {
            table: self.def.table.clone(),
            message: source.to_string(),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model").field("def", &self.def).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detached(def: ModelDef) -> Model {
        Model::new(def, Weak::new())
    }

    fn users_def() -> ModelDef {
        ModelDef::new("users")
            .col(ColumnDef::new("id").big_integer().primary_key())
            .col(ColumnDef::new("name").string_len(255).not_null())
            .col(ColumnDef::new("active").boolean().default_value(true))
            .col(ColumnDef::new("created_at").timestamptz().default_expr("NOW()"))
    }

    #[test]
    fn create_sql_renders_columns_in_order() {
        let model = detached(users_def());
        assert_eq!(
            model.create_sql().unwrap(),
            "CREATE TABLE IF NOT EXISTS \"users\" (\
             \"id\" BIGINT PRIMARY KEY, \
             \"name\" VARCHAR(255) NOT NULL, \
             \"active\" BOOLEAN DEFAULT TRUE, \
             \"created_at\" TIMESTAMPTZ DEFAULT NOW())"
        );
    }

    #[test]
    fn drop_sql_targets_the_table() {
        let model = detached(users_def());
        assert_eq!(model.drop_sql(), "DROP TABLE IF EXISTS \"users\"");
    }

    #[test]
    fn create_sql_requires_columns_and_types() {
        let model = detached(ModelDef::new("empty"));
        assert!(model.create_sql().unwrap_err().is_validation());

        let model = detached(ModelDef::new("untyped").col(ColumnDef::new("x")));
        assert!(model.create_sql().unwrap_err().is_validation());
    }

    #[test]
    fn numeric_and_text_types_render() {
        let col = ColumnDef::new("price").decimal(10, 2).not_null();
        assert_eq!(col.render().unwrap(), "\"price\" NUMERIC(10, 2) NOT NULL");
        let col = ColumnDef::new("note").text();
        assert_eq!(col.render().unwrap(), "\"note\" TEXT");
        let col = ColumnDef::new("ref").uuid().unique();
        assert_eq!(col.render().unwrap(), "\"ref\" UUID UNIQUE");
    }

    #[test]
    fn to_row_fills_defaults_then_transforms() {
        let def = users_def().transform(|mut row| {
            let name = row
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_lowercase);
            if let Some(name) = name {
                row.insert("name".to_string(), json!(name));
            }
            row
        });
        let model = detached(def);

        let row = model
            .to_row(json!({"id": 1, "name": "ADA"}))
            .unwrap();
        assert_eq!(row.get("name"), Some(&json!("ada")));
        // Literal default applied, expression default left to the server.
        assert_eq!(row.get("active"), Some(&json!(true)));
        assert!(!row.contains_key("created_at"));
    }

    #[test]
    fn to_row_keeps_explicit_values_over_defaults() {
        let model = detached(users_def());
        let row = model
            .to_row(json!({"id": 2, "name": "bo", "active": false}))
            .unwrap();
        assert_eq!(row.get("active"), Some(&json!(false)));
    }

    #[test]
    fn to_row_rejects_non_objects() {
        let model = detached(users_def());
        assert!(model.to_row(json!([1, 2])).unwrap_err().is_validation());
    }

    #[test]
    fn schema_ops_without_a_facade_fail_cleanly() {
        let model = detached(users_def());
        let err = model.sync().unwrap_err();
        assert!(matches!(err, DbError::Schema { .. }), "got {err}");
    }
}
