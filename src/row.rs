//! Row and result-set shapes shared by every backend.

use serde_json::{Map, Value};

/// One result row: column name to decoded value.
///
/// `serde_json::Map` keeps keys sorted, so iterating a row (and rendering the
/// column list of a batch insert) is deterministic.
pub type Row = Map<String, Value>;

/// Rows returned by a statement plus the driver's affected-row count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Ordered rows as the backend produced them.
    pub rows: Vec<Row>,
    /// Affected-row count for INSERT / UPDATE / DELETE; `0` for plain reads.
    pub rows_affected: u64,
}

impl ResultSet {
    /// A result carrying rows and no affected count.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        ResultSet {
            rows,
            rows_affected: 0,
        }
    }

    /// A result carrying only an affected count.
    pub fn from_affected(rows_affected: u64) -> Self {
        ResultSet {
            rows: Vec::new(),
            rows_affected,
        }
    }

    /// First row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Consume into the row sequence.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn first_returns_leading_row() {
        let rs = ResultSet::from_rows(vec![
            row(&[("id", json!(1))]),
            row(&[("id", json!(2))]),
        ]);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.first().and_then(|r| r.get("id")), Some(&json!(1)));
    }

    #[test]
    fn affected_only_results_have_no_rows() {
        let rs = ResultSet::from_affected(3);
        assert!(rs.is_empty());
        assert_eq!(rs.rows_affected, 3);
    }
}
