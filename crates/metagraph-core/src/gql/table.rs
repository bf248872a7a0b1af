//! # Binding Table
//!
//! Result of a query: ordered column names and ordered rows.

use crate::Value;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// One binding: variable or column name -> value.
pub type Row = BTreeMap<String, Value>;

/// Columns plus rows, in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl BindingTable {
    pub(crate) fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Column names in output order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in output order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `index`. Unset cells read as `None`.
    #[must_use]
    pub fn get(&self, index: usize, column: &str) -> Option<&Value> {
        self.rows.get(index)?.get(column)
    }

    /// All values of one column, nulls included.
    #[must_use]
    pub fn column(&self, name: &str) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(name).cloned().unwrap_or_default())
            .collect()
    }

    /// Rows as value tuples in column order.
    pub fn tuples(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        self.rows.iter().map(|row| {
            self.columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or_default())
                .collect()
        })
    }
}

struct OrderedRow<'a> {
    columns: &'a [String],
    row: &'a Row,
}

impl Serialize for OrderedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in self.columns {
            map.serialize_entry(column, self.row.get(column).unwrap_or(&Value::Null))?;
        }
        map.end()
    }
}

/// Serializes as `{"columns": [...], "rows": [{column: value, ...}]}`
/// with row keys in column order.
impl Serialize for BindingTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<OrderedRow<'_>> = self
            .rows
            .iter()
            .map(|row| OrderedRow {
                columns: &self.columns,
                row,
            })
            .collect();
        let mut table = serializer.serialize_struct("BindingTable", 2)?;
        table.serialize_field("columns", &self.columns)?;
        table.serialize_field("rows", &rows)?;
        table.end()
    }
}
