// Chunked row reading
//
// Rows are shaped to the header width: short rows are padded with empty
// strings, long rows are an error. With a column limit, only the first N
// values of each row are kept.

use crate::error::{ExtractError, Result};
use std::io::Read;
use std::sync::Arc;
use tsv2parquet_core::RowChunk;

/// Iterator over the remaining rows of a member, in chunks
pub struct RowChunks<'a> {
    member: String,
    columns: Arc<[String]>,
    width: usize,
    reader: csv::Reader<Box<dyn Read + 'a>>,
    record: csv::StringRecord,
    chunk_limit: usize,
    rows_read: u64,
    done: bool,
}

impl<'a> RowChunks<'a> {
    pub(crate) fn new(
        member: String,
        columns: Arc<[String]>,
        width: usize,
        reader: csv::Reader<Box<dyn Read + 'a>>,
        chunk_limit: usize,
    ) -> Self {
        Self {
            member,
            columns,
            width,
            reader,
            record: csv::StringRecord::new(),
            chunk_limit: chunk_limit.max(1),
            rows_read: 0,
            done: false,
        }
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    /// Data rows read so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn shape_row(&self) -> Result<Vec<String>> {
        let found = self.record.len();
        if found > self.width {
            let line = self
                .record
                .position()
                .map(|p| p.line())
                .unwrap_or(self.rows_read + 1);
            return Err(ExtractError::ColumnCountMismatch {
                member: self.member.clone(),
                line,
                expected: self.width,
                found,
            });
        }

        let keep = self.columns.len();
        let mut row: Vec<String> = self
            .record
            .iter()
            .take(keep)
            .map(str::to_string)
            .collect();
        row.resize(keep, String::new());
        Ok(row)
    }

    fn read_chunk(&mut self) -> Result<Option<RowChunk>> {
        let mut rows = Vec::new();
        while rows.len() < self.chunk_limit {
            let more = self
                .reader
                .read_record(&mut self.record)
                .map_err(|source| ExtractError::Parse {
                    member: self.member.clone(),
                    source,
                })?;
            if !more {
                self.done = true;
                break;
            }
            rows.push(self.shape_row()?);
            self.rows_read += 1;
        }

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(RowChunk::new(Arc::clone(&self.columns), rows)))
    }
}

impl Iterator for RowChunks<'_> {
    type Item = Result<RowChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
