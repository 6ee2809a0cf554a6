//! Shared row types used by the extract and conversion crates

use std::sync::Arc;

/// An ordered batch of raw rows read from one member.
///
/// Each row holds exactly one value per column, by position. Values are never
/// null: absent data is the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChunk {
    columns: Arc<[String]>,
    rows: Vec<Vec<String>>,
}

impl RowChunk {
    pub fn new(columns: Arc<[String]>, rows: Vec<Vec<String>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// A chunk with the given header and no rows.
    pub fn empty(columns: Arc<[String]>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Vec<String>] {
        &mut self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate the raw values of one column.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }
}
