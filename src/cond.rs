//! Condition compiler.
//!
//! Conditions form a closed expression tree compiled to a WHERE-clause
//! fragment (no enclosing `WHERE`). Rendering is deterministic: the same tree
//! always yields the same text, which the `one()` limit-wrapping rule relies
//! on. A raw equality map (`{"a": 1, "b": "x"}`) is resolved into this tree
//! once at the API boundary; nothing downstream ever sees the map form.

use serde_json::{Map, Value};

use crate::error::DbError;
use crate::value::{normalize, quote_ident};

/// Comparison operator for a single-column predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl CmpOp {
    fn as_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Like => "LIKE",
        }
    }
}

/// A compiled predicate.
///
/// Build one with the constructors below and combine with [`Cond::and`],
/// [`Cond::or`], [`Cond::not`]. The `Limit` variant bounds row count and is
/// only valid at the root of a tree; it renders as a trailing `LIMIT n`
/// after the wrapped condition's fragment.
///
/// # Examples
///
/// ```
/// use poolside::cond::Cond;
///
/// let c = Cond::eq("status", "active").and(Cond::gt("age", 21));
/// assert_eq!(c.to_sql().unwrap(), r#""status" = 'active' AND "age" > 21"#);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    /// `column <op> literal`
    Cmp {
        column: String,
        op: CmpOp,
        value: Value,
    },
    /// `column IN (v, ...)`; an empty list renders `FALSE`.
    In { column: String, values: Vec<Value> },
    /// Conjunction. No effective members renders `TRUE`.
    All(Vec<Cond>),
    /// Disjunction. No effective members renders `FALSE`.
    Any(Vec<Cond>),
    /// Negation, always parenthesized.
    Not(Box<Cond>),
    /// Verbatim SQL fragment supplied by the caller.
    Raw(String),
    /// Row-count bound. `inner` absent renders `TRUE LIMIT n` so the fragment
    /// stays valid inside `WHERE <fragment>`.
    Limit { inner: Option<Box<Cond>>, limit: u64 },
}

impl Cond {
    /// `column = value`. A `null` value renders `IS NULL`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::cmp(column, CmpOp::Eq, value)
    }

    /// `column <> value`. A `null` value renders `IS NOT NULL`.
    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::cmp(column, CmpOp::Ne, value)
    }

    /// `column > value`
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::cmp(column, CmpOp::Gt, value)
    }

    /// `column >= value`
    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::cmp(column, CmpOp::Gte, value)
    }

    /// `column < value`
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::cmp(column, CmpOp::Lt, value)
    }

    /// `column <= value`
    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::cmp(column, CmpOp::Lte, value)
    }

    /// `column LIKE pattern`
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Cond {
        Cond::cmp(column, CmpOp::Like, Value::String(pattern.into()))
    }

    fn cmp(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Cond {
        Cond::Cmp {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// `column IN (values...)`
    pub fn is_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Cond {
        Cond::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Conjunction of the given conditions.
    pub fn all(conds: impl IntoIterator<Item = Cond>) -> Cond {
        Cond::All(conds.into_iter().collect())
    }

    /// Disjunction of the given conditions.
    pub fn any(conds: impl IntoIterator<Item = Cond>) -> Cond {
        Cond::Any(conds.into_iter().collect())
    }

    /// Verbatim fragment. The caller owns its correctness and escaping.
    pub fn raw(sql: impl Into<String>) -> Cond {
        Cond::Raw(sql.into())
    }

    /// Negate this condition.
    pub fn not(self) -> Cond {
        Cond::Not(Box::new(self))
    }

    /// Conjoin with another condition, flattening nested conjunctions.
    pub fn and(self, other: Cond) -> Cond {
        match self {
            Cond::All(mut conds) => {
                conds.push(other);
                Cond::All(conds)
            }
            first => Cond::All(vec![first, other]),
        }
    }

    /// Disjoin with another condition, flattening nested disjunctions.
    pub fn or(self, other: Cond) -> Cond {
        match self {
            Cond::Any(mut conds) => {
                conds.push(other);
                Cond::Any(conds)
            }
            first => Cond::Any(vec![first, other]),
        }
    }

    /// Bound this condition to at most `n` rows.
    pub fn limit(self, n: u64) -> Cond {
        Cond::limit_of(Some(self), n)
    }

    /// The canonical Limit constructor; `inner` may be absent.
    pub fn limit_of(inner: Option<Cond>, n: u64) -> Cond {
        Cond::Limit {
            inner: inner.map(Box::new),
            limit: n,
        }
    }

    /// Interpret a plain JSON object as an equality conjunction.
    ///
    /// Keys are visited in the map's order (lexicographic for
    /// `serde_json::Map`), so repeated compilation of the same object yields
    /// the same fragment.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Validation` when the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Cond, DbError> {
        match value {
            Value::Object(map) => Ok(Cond::from_map(&map)),
            other => Err(DbError::Validation(format!(
                "condition must be a JSON object, got {other}"
            ))),
        }
    }

    /// Equality conjunction over a JSON object's entries.
    pub fn from_map(map: &Map<String, Value>) -> Cond {
        Cond::All(
            map.iter()
                .map(|(column, value)| Cond::eq(column.clone(), value.clone()))
                .collect(),
        )
    }

    /// True when this condition constrains nothing: an empty (or
    /// all-empty) conjunction/disjunction, or a blank raw fragment.
    ///
    /// `delete` refuses empty conditions; `select`/`update` skip the WHERE
    /// clause for them.
    pub fn is_empty(&self) -> bool {
        match self {
            Cond::All(conds) | Cond::Any(conds) => conds.iter().all(Cond::is_empty),
            Cond::Raw(sql) => sql.trim().is_empty(),
            _ => false,
        }
    }

    /// True for the `Limit` variant. `one()` uses this to avoid wrapping an
    /// already-bounded condition a second time.
    pub fn is_limit(&self) -> bool {
        matches!(self, Cond::Limit { .. })
    }

    /// Render the condition to its SQL fragment.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Validation` when a `Limit` appears anywhere other
    /// than the root of the tree.
    pub fn to_sql(&self) -> Result<String, DbError> {
        self.render(false)
    }

    fn render(&self, nested: bool) -> Result<String, DbError> {
        match self {
            Cond::Cmp { column, op, value } => {
                if value.is_null() && *op == CmpOp::Eq {
                    return Ok(format!("{} IS NULL", quote_ident(column)));
                }
                if value.is_null() && *op == CmpOp::Ne {
                    return Ok(format!("{} IS NOT NULL", quote_ident(column)));
                }
                Ok(format!(
                    "{} {} {}",
                    quote_ident(column),
                    op.as_sql(),
                    normalize(value)
                ))
            }
            Cond::In { column, values } => {
                if values.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let rendered: Vec<String> = values.iter().map(normalize).collect();
                Ok(format!(
                    "{} IN ({})",
                    quote_ident(column),
                    rendered.join(", ")
                ))
            }
            Cond::All(conds) => Self::render_junction(conds, " AND ", "TRUE"),
            Cond::Any(conds) => Self::render_junction(conds, " OR ", "FALSE"),
            Cond::Not(inner) => Ok(format!("NOT ({})", inner.render(true)?)),
            Cond::Raw(sql) => Ok(sql.clone()),
            Cond::Limit { inner, limit } => {
                if nested {
                    return Err(DbError::Validation(
                        "LIMIT condition must be the outermost condition".to_string(),
                    ));
                }
                let body = match inner {
                    Some(cond) if !cond.is_empty() => cond.render(true)?,
                    _ => "TRUE".to_string(),
                };
                Ok(format!("{body} LIMIT {limit}"))
            }
        }
    }

    fn render_junction(conds: &[Cond], joiner: &str, neutral: &str) -> Result<String, DbError> {
        let mut parts = Vec::with_capacity(conds.len());
        for cond in conds {
            if cond.is_empty() {
                continue;
            }
            let fragment = cond.render(true)?;
            // Composite members get parentheses so precedence never depends
            // on the reader knowing AND binds tighter than OR.
            if matches!(cond, Cond::All(_) | Cond::Any(_)) {
                parts.push(format!("({fragment})"));
            } else {
                parts.push(fragment);
            }
        }
        if parts.is_empty() {
            return Ok(neutral.to_string());
        }
        Ok(parts.join(joiner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_compiles_to_equality_conjunction() {
        let cond = Cond::from_value(json!({"b": "x", "a": 1})).unwrap();
        assert_eq!(cond.to_sql().unwrap(), r#""a" = 1 AND "b" = 'x'"#);
    }

    #[test]
    fn repeated_compilation_is_deterministic() {
        let input = json!({"name": "ada", "age": 36, "active": true});
        let first = Cond::from_value(input.clone()).unwrap().to_sql().unwrap();
        let second = Cond::from_value(input).unwrap().to_sql().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn non_object_condition_is_rejected() {
        let err = Cond::from_value(json!([1, 2])).unwrap_err();
        assert!(err.is_validation(), "got {err}");
    }

    #[test]
    fn comparison_operators_render() {
        assert_eq!(Cond::gt("age", 21).to_sql().unwrap(), r#""age" > 21"#);
        assert_eq!(Cond::gte("age", 21).to_sql().unwrap(), r#""age" >= 21"#);
        assert_eq!(Cond::lt("age", 21).to_sql().unwrap(), r#""age" < 21"#);
        assert_eq!(Cond::lte("age", 21).to_sql().unwrap(), r#""age" <= 21"#);
        assert_eq!(Cond::ne("age", 21).to_sql().unwrap(), r#""age" <> 21"#);
        assert_eq!(
            Cond::like("name", "ada%").to_sql().unwrap(),
            r#""name" LIKE 'ada%'"#
        );
    }

    #[test]
    fn null_equality_renders_is_null() {
        assert_eq!(
            Cond::eq("deleted_at", json!(null)).to_sql().unwrap(),
            r#""deleted_at" IS NULL"#
        );
        assert_eq!(
            Cond::ne("deleted_at", json!(null)).to_sql().unwrap(),
            r#""deleted_at" IS NOT NULL"#
        );
    }

    #[test]
    fn in_list_renders_members_and_empty_list_matches_nothing() {
        assert_eq!(
            Cond::is_in("id", [1, 2, 3]).to_sql().unwrap(),
            r#""id" IN (1, 2, 3)"#
        );
        assert_eq!(
            Cond::is_in("id", Vec::<i64>::new()).to_sql().unwrap(),
            "FALSE"
        );
    }

    #[test]
    fn junctions_parenthesize_composite_members() {
        let cond = Cond::any([
            Cond::eq("a", 1).and(Cond::eq("b", 2)),
            Cond::eq("c", 3),
        ]);
        assert_eq!(
            cond.to_sql().unwrap(),
            r#"("a" = 1 AND "b" = 2) OR "c" = 3"#
        );
    }

    #[test]
    fn not_is_always_parenthesized() {
        assert_eq!(
            Cond::eq("a", 1).not().to_sql().unwrap(),
            r#"NOT ("a" = 1)"#
        );
    }

    #[test]
    fn limit_renders_trailing_bound() {
        assert_eq!(
            Cond::eq("id", 7).limit(1).to_sql().unwrap(),
            r#""id" = 7 LIMIT 1"#
        );
        assert_eq!(Cond::limit_of(None, 1).to_sql().unwrap(), "TRUE LIMIT 1");
    }

    #[test]
    fn limit_over_empty_condition_keeps_fragment_valid() {
        let empty = Cond::from_value(json!({})).unwrap();
        assert_eq!(empty.limit(5).to_sql().unwrap(), "TRUE LIMIT 5");
    }

    #[test]
    fn nested_limit_is_rejected() {
        let cond = Cond::all([Cond::eq("a", 1).limit(1)]);
        let err = cond.to_sql().unwrap_err();
        assert!(err.is_validation(), "got {err}");
    }

    #[test]
    fn empty_map_is_empty_but_literal_conditions_are_not() {
        assert!(Cond::from_value(json!({})).unwrap().is_empty());
        assert!(Cond::raw("   ").is_empty());
        assert!(!Cond::eq("a", 1).is_empty());
        assert!(!Cond::is_in("a", Vec::<i64>::new()).is_empty());
        assert!(!Cond::limit_of(None, 1).is_empty());
    }

    #[test]
    fn and_or_flatten() {
        let cond = Cond::eq("a", 1).and(Cond::eq("b", 2)).and(Cond::eq("c", 3));
        assert_eq!(
            cond.to_sql().unwrap(),
            r#""a" = 1 AND "b" = 2 AND "c" = 3"#
        );
        let cond = Cond::eq("a", 1).or(Cond::eq("b", 2)).or(Cond::eq("c", 3));
        assert_eq!(cond.to_sql().unwrap(), r#""a" = 1 OR "b" = 2 OR "c" = 3"#);
    }
}
