use super::SqlValue;

/// Driver-agnostic raw result from a database query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryResult {
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows, where each row is a vector of values in column order
    pub rows: Vec<Vec<SqlValue>>,
}

impl RawQueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Gets the value of `column` in the row at `row_index`.
    /// Returns `None` if either the row or the column does not exist.
    pub fn get(&self, row_index: usize, column: &str) -> Option<&SqlValue> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row_index)?.get(col)
    }

    /// Returns every value of `column` in row order.
    pub fn column_values(&self, column: &str) -> Vec<&SqlValue> {
        match self.columns.iter().position(|c| c == column) {
            Some(col) => self.rows.iter().filter_map(|r| r.get(col)).collect(),
            None => Vec::new(),
        }
    }

    /// Returns the number of rows in this result.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if this result contains no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> RawQueryResult {
        RawQueryResult::new(
            vec!["id".to_string(), "username".to_string()],
            vec![
                vec![SqlValue::Int64(1), SqlValue::from("admin")],
                vec![SqlValue::Int64(2), SqlValue::from("user1")],
            ],
        )
    }

    #[test]
    fn test_get_by_column_name() {
        let result = users();
        assert_eq!(result.get(1, "username"), Some(&SqlValue::from("user1")));
        assert_eq!(result.get(0, "missing"), None);
        assert_eq!(result.get(5, "id"), None);
    }

    #[test]
    fn test_column_values() {
        let result = users();
        assert_eq!(
            result.column_values("username"),
            vec![&SqlValue::from("admin"), &SqlValue::from("user1")]
        );
        assert!(result.column_values("password").is_empty());
    }

    #[test]
    fn test_empty() {
        let result = RawQueryResult::empty();
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
    }
}
