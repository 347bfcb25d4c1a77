//! Raw provider table.
//!
//! Provider responses are kept as a column-name list plus untyped rows
//! instead of being deserialized into fixed structs. Upstream schema drift
//! (renamed or reordered columns) then surfaces in the sniffers, where it can
//! be diagnosed from a test failure, rather than vanishing into serde
//! defaults.

use serde_json::Value;

/// A table of untyped cells as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from a JSON array of objects. Columns are the union of
    /// all keys in first-seen order; a row's missing keys read as null.
    /// Non-object elements are skipped.
    pub fn from_objects(records: &[Value]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            if let Value::Object(map) = record {
                for key in map.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }
        }

        let mut rows = Vec::new();
        for record in records {
            if let Value::Object(map) = record {
                let row = columns
                    .iter()
                    .map(|c| map.get(c).cloned().unwrap_or(Value::Null))
                    .collect();
                rows.push(row);
            }
        }

        Self { columns, rows }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of an exactly-named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row)?.get(column)
    }
}
