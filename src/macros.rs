//! Convenience macros.

/// Build a [`Row`](crate::row::Row) in place.
///
/// Keys convert with `Into<String>`; values go through the same conversion
/// as `serde_json::json!`, so anything serializable works, including a
/// nested `json!` call.
///
/// # Examples
///
/// ```
/// use poolside::row;
/// use serde_json::json;
///
/// let r = row! {
///     "id" => 7,
///     "name" => "ada",
///     "tags" => json!(["admin", "ops"]),
/// };
/// assert_eq!(r["id"], json!(7));
/// assert_eq!(r["tags"][1], json!("ops"));
/// ```
#[macro_export]
macro_rules! row {
    () => {
        $crate::row::Row::new()
    };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut row = $crate::row::Row::new();
        $( row.insert(($key).into(), $crate::__serde_json::json!($value)); )+
        row
    }};
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::row::Row;

    #[test]
    fn builds_rows_in_place() {
        let r = row! { "id" => 1, "name" => "ada" };
        assert_eq!(r["id"], json!(1));
        assert_eq!(r["name"], json!("ada"));
    }

    #[test]
    fn empty_invocation_gives_empty_row() {
        let r: Row = row!();
        assert!(r.is_empty());
    }

    #[test]
    fn accepts_trailing_comma_and_nested_json() {
        let r = row! {
            "meta" => json!({"k": 1}),
            "flag" => true,
        };
        assert_eq!(r["meta"]["k"], json!(1));
        assert_eq!(r["flag"], json!(true));
    }
}
