//! In-memory tabular structure: ordered rows, named columns.
//!
//! Reading and writing the persisted file format is the caller's
//! responsibility; the core only rewrites cells in place.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Written into a target cell whose classification ultimately failed.
///
/// Deliberately not a valid label so downstream consumers can never mistake
/// a failure for a verdict.
pub const FAILED_SENTINEL: &str = "<failed>";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("row has {got} cells, table has {want} columns")]
    RowArity { got: usize, want: usize },

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("row {0} out of bounds")]
    RowOutOfBounds(usize),
}

/// A target column and the guideline context that applies to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTarget {
    pub column: String,
    pub role: String,
}

impl ColumnTarget {
    pub fn new(column: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            role: role.into(),
        }
    }
}

/// Ordered rows with named columns, all cells plain text.
///
/// Deserialization goes through the same arity check as `push_row`, so a
/// ragged table can never be constructed from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TryFrom<RawTable> for Table {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, TableError> {
        let mut table = Table::new(raw.columns);
        for row in raw.rows {
            table.push_row(row)?;
        }
        Ok(table)
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowArity {
                got: row.len(),
                want: self.columns.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    pub fn set_cell(
        &mut self,
        row: usize,
        column: &str,
        value: impl Into<String>,
    ) -> Result<(), TableError> {
        let col = self
            .column_index(column)
            .ok_or_else(|| TableError::UnknownColumn(column.to_string()))?;
        let cells = self
            .rows
            .get_mut(row)
            .ok_or(TableError::RowOutOfBounds(row))?;
        cells[col] = value.into();
        Ok(())
    }

    /// Iterate rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(|r| r.as_slice())
    }
}
