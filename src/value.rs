//! SQL text rendering for JSON values and identifiers.
//!
//! The condition compiler and the legacy `create` path inline values into SQL
//! text instead of binding them. Everything funnels through [`normalize`] so
//! the two paths cannot disagree on escaping.

use serde_json::Value;

/// Render a JSON value as a PostgreSQL literal.
///
/// * `null` becomes `NULL`
/// * booleans become `TRUE` / `FALSE`
/// * numbers are inlined in their JSON form
/// * strings are single-quoted with embedded quotes doubled
/// * arrays and objects are serialized to JSON text and quoted
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use poolside::value::normalize;
///
/// assert_eq!(normalize(&json!(42)), "42");
/// assert_eq!(normalize(&json!("O'Brien")), "'O''Brien'");
/// assert_eq!(normalize(&json!(null)), "NULL");
/// ```
pub fn normalize(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_literal(s),
        // Composite values travel as JSON text. The column side decides how to
        // interpret the literal (json, jsonb, or plain text).
        other => quote_literal(&other.to_string()),
    }
}

/// Single-quote a string literal, doubling embedded single quotes.
pub fn quote_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Double-quote an identifier, doubling embedded double quotes.
///
/// Quoting preserves case and permits reserved words as table or column
/// names, which is how all generated statements refer to identifiers.
pub fn quote_ident(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
