//! Argument resolution for the facade's optional trailing parameters.
//!
//! Facade operations have the canonical shape
//! `(table, columns?, condition?, transaction?)`. Callers pass any subset of
//! the optionals, in any order, as a tuple; resolution happens once, before
//! the operation body, and binds each value by type:
//!
//! 1. the right-most transaction reference becomes `tx`,
//! 2. the first condition or JSON object among the rest becomes `cond`,
//! 3. the first string or string sequence among the rest becomes `columns`.
//!
//! A JSON object always binds as a condition, never as a column list.
//! Arguments left over after the three scans are ignored.

use serde_json::Value;

use crate::cond::Cond;
use crate::error::DbError;
use crate::transaction::Transaction;
use crate::value::quote_ident;

/// The projection to render for `select`-family operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Columns {
    /// A single string, used verbatim. This is the escape hatch for
    /// expressions such as `COUNT(1) AS "count"`.
    One(String),
    /// A list of column names, each quoted, comma-joined.
    Many(Vec<String>),
}

impl Columns {
    /// Render the projection list. An empty `Many` falls back to `*`.
    pub fn to_sql(&self) -> String {
        match self {
            Columns::One(expr) => expr.clone(),
            Columns::Many(cols) if cols.is_empty() => "*".to_string(),
            Columns::Many(cols) => cols
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// A condition argument as supplied by the caller, before resolution.
#[derive(Debug, Clone)]
pub enum CondArg {
    /// A plain JSON value; must be an object (equality map) to resolve.
    Json(Value),
    /// An already-compiled condition, used as-is.
    Compiled(Cond),
}

/// One optional argument, tagged by the parameter it can bind to.
#[derive(Debug, Clone)]
pub enum Arg<'a> {
    Columns(Columns),
    Cond(CondArg),
    Tx(&'a Transaction),
}

impl From<Columns> for Arg<'_> {
    fn from(columns: Columns) -> Self {
        Arg::Columns(columns)
    }
}

impl From<&str> for Arg<'_> {
    fn from(expr: &str) -> Self {
        Arg::Columns(Columns::One(expr.to_string()))
    }
}

impl From<String> for Arg<'_> {
    fn from(expr: String) -> Self {
        Arg::Columns(Columns::One(expr))
    }
}

impl From<Vec<String>> for Arg<'_> {
    fn from(cols: Vec<String>) -> Self {
        Arg::Columns(Columns::Many(cols))
    }
}

impl From<Vec<&str>> for Arg<'_> {
    fn from(cols: Vec<&str>) -> Self {
        Arg::Columns(Columns::Many(cols.into_iter().map(String::from).collect()))
    }
}

impl<const N: usize> From<[&str; N]> for Arg<'_> {
    fn from(cols: [&str; N]) -> Self {
        Arg::Columns(Columns::Many(cols.iter().map(|c| c.to_string()).collect()))
    }
}

impl From<Cond> for Arg<'_> {
    fn from(cond: Cond) -> Self {
        Arg::Cond(CondArg::Compiled(cond))
    }
}

impl From<Value> for Arg<'_> {
    fn from(value: Value) -> Self {
        Arg::Cond(CondArg::Json(value))
    }
}

impl<'a> From<&'a Transaction> for Arg<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Arg::Tx(tx)
    }
}

/// The outcome of resolution: every optional parameter explicitly present
/// or absent.
#[derive(Debug, Default)]
pub struct Resolved<'a> {
    pub columns: Option<Columns>,
    pub cond: Option<Cond>,
    pub tx: Option<&'a Transaction>,
}

/// Conversion from caller-supplied tuples into the tagged argument list.
pub trait IntoArgs<'a> {
    fn into_args(self) -> Vec<Arg<'a>>;
}

impl<'a> IntoArgs<'a> for () {
    fn into_args(self) -> Vec<Arg<'a>> {
        Vec::new()
    }
}

impl<'a> IntoArgs<'a> for Arg<'a> {
    fn into_args(self) -> Vec<Arg<'a>> {
        vec![self]
    }
}

impl<'a, A> IntoArgs<'a> for (A,)
where
    A: Into<Arg<'a>>,
{
    fn into_args(self) -> Vec<Arg<'a>> {
        vec![self.0.into()]
    }
}

impl<'a, A, B> IntoArgs<'a> for (A, B)
where
    A: Into<Arg<'a>>,
    B: Into<Arg<'a>>,
{
    fn into_args(self) -> Vec<Arg<'a>> {
        vec![self.0.into(), self.1.into()]
    }
}

impl<'a, A, B, C> IntoArgs<'a> for (A, B, C)
where
    A: Into<Arg<'a>>,
    B: Into<Arg<'a>>,
    C: Into<Arg<'a>>,
{
    fn into_args(self) -> Vec<Arg<'a>> {
        vec![self.0.into(), self.1.into(), self.2.into()]
    }
}

macro_rules! impl_into_args_single {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl<'a> IntoArgs<'a> for $ty {
                fn into_args(self) -> Vec<Arg<'a>> {
                    vec![self.into()]
                }
            }
        )+
    };
}

impl_into_args_single!(Columns, Cond, Value, &str, String, Vec<String>, Vec<&str>);

impl<'a> IntoArgs<'a> for &'a Transaction {
    fn into_args(self) -> Vec<Arg<'a>> {
        vec![Arg::Tx(self)]
    }
}

impl<'a, const N: usize> IntoArgs<'a> for [&str; N] {
    fn into_args(self) -> Vec<Arg<'a>> {
        vec![self.into()]
    }
}

/// Bind a tagged argument list against the canonical optional parameters.
///
/// The scan order follows the protocol at the top of this module. JSON
/// conditions are compiled here, so a non-object condition fails before any
/// connection work starts.
///
/// # Errors
///
/// Returns `DbError::Validation` when a JSON condition argument is not an
/// object.
pub fn resolve(args: Vec<Arg<'_>>) -> Result<Resolved<'_>, DbError> {
    let mut slots: Vec<Option<Arg<'_>>> = args.into_iter().map(Some).collect();

    let mut tx = None;
    for slot in slots.iter_mut().rev() {
        if matches!(slot, Some(Arg::Tx(_))) {
            if let Some(Arg::Tx(t)) = slot.take() {
                tx = Some(t);
            }
            break;
        }
    }

    let mut cond = None;
    for slot in slots.iter_mut() {
        if matches!(slot, Some(Arg::Cond(_))) {
            if let Some(Arg::Cond(arg)) = slot.take() {
                cond = Some(match arg {
                    CondArg::Compiled(c) => c,
                    CondArg::Json(v) => Cond::from_value(v)?,
                });
            }
            break;
        }
    }

    let mut columns = None;
    for slot in slots.iter_mut() {
        if matches!(slot, Some(Arg::Columns(_))) {
            if let Some(Arg::Columns(c)) = slot.take() {
                columns = Some(c);
            }
            break;
        }
    }

    Ok(Resolved { columns, cond, tx })
}

/// Arguments to the low-level `query` operation: optional bound values and
/// an optional transaction, in either order (a transaction may arrive in the
/// values slot).
#[derive(Debug, Default)]
pub struct QueryArgs<'a> {
    pub values: Vec<Value>,
    pub tx: Option<&'a Transaction>,
}

pub trait IntoQueryArgs<'a> {
    fn into_query_args(self) -> QueryArgs<'a>;
}

impl<'a> IntoQueryArgs<'a> for () {
    fn into_query_args(self) -> QueryArgs<'a> {
        QueryArgs::default()
    }
}

impl<'a> IntoQueryArgs<'a> for Vec<Value> {
    fn into_query_args(self) -> QueryArgs<'a> {
        QueryArgs {
            values: self,
            tx: None,
        }
    }
}

impl<'a> IntoQueryArgs<'a> for &'a Transaction {
    fn into_query_args(self) -> QueryArgs<'a> {
        QueryArgs {
            values: Vec::new(),
            tx: Some(self),
        }
    }
}

impl<'a> IntoQueryArgs<'a> for (Vec<Value>,) {
    fn into_query_args(self) -> QueryArgs<'a> {
        self.0.into_query_args()
    }
}

impl<'a> IntoQueryArgs<'a> for (&'a Transaction,) {
    fn into_query_args(self) -> QueryArgs<'a> {
        self.0.into_query_args()
    }
}

impl<'a> IntoQueryArgs<'a> for (Vec<Value>, &'a Transaction) {
    fn into_query_args(self) -> QueryArgs<'a> {
        QueryArgs {
            values: self.0,
            tx: Some(self.1),
        }
    }
}

/// The optional trailing transaction for operations whose only optional
/// parameter is the transaction (`insert`, `create`).
pub trait IntoTxArg<'a> {
    fn into_tx_arg(self) -> Option<&'a Transaction>;
}

impl<'a> IntoTxArg<'a> for () {
    fn into_tx_arg(self) -> Option<&'a Transaction> {
        None
    }
}

impl<'a> IntoTxArg<'a> for &'a Transaction {
    fn into_tx_arg(self) -> Option<&'a Transaction> {
        Some(self)
    }
}

impl<'a> IntoTxArg<'a> for Option<&'a Transaction> {
    fn into_tx_arg(self) -> Option<&'a Transaction> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_args_resolve_to_all_absent() {
        let resolved = resolve(().into_args()).unwrap();
        assert!(resolved.columns.is_none());
        assert!(resolved.cond.is_none());
        assert!(resolved.tx.is_none());
    }

    #[test]
    fn single_string_binds_columns() {
        let resolved = resolve("id".into_args()).unwrap();
        assert_eq!(resolved.columns, Some(Columns::One("id".to_string())));
        assert!(resolved.cond.is_none());
    }

    #[test]
    fn string_list_binds_columns_quoted() {
        let resolved = resolve(["id", "name"].into_args()).unwrap();
        assert_eq!(
            resolved.columns.unwrap().to_sql(),
            r#""id", "name""#
        );
    }

    #[test]
    fn json_object_binds_condition_never_columns() {
        let resolved = resolve(json!({"id": 1}).into_args()).unwrap();
        assert!(resolved.columns.is_none());
        assert_eq!(
            resolved.cond.unwrap().to_sql().unwrap(),
            r#""id" = 1"#
        );
    }

    #[test]
    fn compiled_condition_passes_through_unchanged() {
        let cond = Cond::eq("id", 1).limit(5);
        let resolved = resolve(cond.clone().into_args()).unwrap();
        assert_eq!(resolved.cond, Some(cond));
    }

    #[test]
    fn columns_and_condition_bind_regardless_of_order() {
        let a = resolve(("id", json!({"x": 1})).into_args()).unwrap();
        let b = resolve((json!({"x": 1}), "id").into_args()).unwrap();
        for resolved in [a, b] {
            assert_eq!(resolved.columns, Some(Columns::One("id".to_string())));
            assert_eq!(
                resolved.cond.unwrap().to_sql().unwrap(),
                r#""x" = 1"#
            );
        }
    }

    #[test]
    fn first_condition_wins_when_two_are_supplied() {
        let resolved = resolve((json!({"a": 1}), json!({"b": 2})).into_args()).unwrap();
        assert_eq!(
            resolved.cond.unwrap().to_sql().unwrap(),
            r#""a" = 1"#
        );
    }

    #[test]
    fn non_object_json_condition_is_a_validation_error() {
        let err = resolve(json!("not an object").into_args()).unwrap_err();
        assert!(err.is_validation(), "got {err}");
    }

    #[test]
    fn empty_many_spec_falls_back_to_star() {
        assert_eq!(Columns::Many(Vec::new()).to_sql(), "*");
    }
}
