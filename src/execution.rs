//! Execution - the storage engine seam
//!
//! The synthesizer never runs SQL itself. Callers that want rows pass a
//! `SqlExecutor`; its errors are surfaced as-is and never retried.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Executes a read-only SQL statement and returns its rows.
pub trait SqlExecutor: Send + Sync {
    fn execute(&self, sql: &str) -> Result<RowSet>;
}

/// Standardized row set returned by an executor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    /// Column names in select-list order
    pub columns: Vec<String>,

    /// One JSON object per row, keyed by column name
    #[serde(rename = "data")]
    pub rows: Vec<Map<String, Value>>,

    pub row_count: usize,

    /// Rows beyond the executor's cap were discarded
    pub truncated: bool,

    pub execution_time_ms: u64,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Map<String, Value>>, truncated: bool, execution_time_ms: u64) -> Self {
        Self {
            row_count: rows.len(),
            columns,
            rows,
            truncated,
            execution_time_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell values of one row in column order, rendered as text
    pub fn text_row(&self, index: usize) -> Vec<String> {
        let Some(row) = self.rows.get(index) else {
            return Vec::new();
        };
        self.columns
            .iter()
            .map(|c| match row.get(c) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rowset_shape() {
        let mut row = Map::new();
        row.insert("name".to_string(), json!("Ada"));
        row.insert("total".to_string(), json!(12.5));
        row.insert("note".to_string(), Value::Null);
        let rows = RowSet::new(
            vec!["name".to_string(), "total".to_string(), "note".to_string()],
            vec![row],
            false,
            3,
        );
        assert_eq!(rows.row_count, 1);
        assert_eq!(rows.text_row(0), vec!["Ada", "12.5", ""]);
        assert!(rows.text_row(5).is_empty());

        let value = serde_json::to_value(&rows).expect("json");
        assert_eq!(value["data"][0]["name"], json!("Ada"));
        assert_eq!(value["row_count"], json!(1));
    }
}
