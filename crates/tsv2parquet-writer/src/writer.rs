//! Lazily opened, schema-fixing Parquet writer
//!
//! One writer per output file. The first chunk fixes the schema and creates
//! `<target>.partial`; a successful close renames it onto the target. The
//! output handle is released on every exit path: `close`, `abort` or drop.

use crate::encoding::writer_properties;
use crate::error::{Result, WriterError};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tsv2parquet_config::ParquetConfig;

/// Writer lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum WriterState {
    /// No chunk written yet; no file exists
    Unopened,
    /// Output file created with this fixed schema
    Open(SchemaRef),
    /// Handle released; no further writes accepted
    Closed,
}

/// File sink that hashes every byte it writes
struct HashingFile {
    inner: BufWriter<File>,
    hasher: blake3::Hasher,
    bytes: u64,
}

impl HashingFile {
    fn new(file: File) -> Self {
        Self {
            inner: BufWriter::new(file),
            hasher: blake3::Hasher::new(),
            bytes: 0,
        }
    }

    fn finish(self) -> io::Result<(u64, String)> {
        let file = self.inner.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        let hash = self.hasher.finalize();
        Ok((self.bytes, hex::encode(hash.as_bytes())))
    }
}

impl Write for HashingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.bytes += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Outcome of a successful close
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub rows: u64,
    pub columns: usize,
    /// File size in bytes
    pub bytes: u64,
    /// Hex BLAKE3 hash of the file contents
    pub content_hash: String,
}

pub struct ColumnarWriter {
    target: PathBuf,
    partial: PathBuf,
    properties: WriterProperties,
    state: WriterState,
    writer: Option<ArrowWriter<HashingFile>>,
    rows: u64,
}

impl std::fmt::Debug for ColumnarWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnarWriter")
            .field("target", &self.target)
            .field("state", &self.state)
            .field("rows", &self.rows)
            .finish()
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

impl ColumnarWriter {
    pub fn new(
        target: impl Into<PathBuf>,
        config: &ParquetConfig,
        table: &str,
        version: &str,
    ) -> Self {
        let target = target.into();
        Self {
            partial: partial_path(&target),
            target,
            properties: writer_properties(config, table, version),
            state: WriterState::Unopened,
            writer: None,
            rows: 0,
        }
    }

    pub fn state(&self) -> &WriterState {
        &self.state
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Path bytes are written to until close.
    pub fn partial_path(&self) -> &Path {
        &self.partial
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Append one typed chunk. The first call fixes the schema.
    ///
    /// Any failure closes the writer before the error is returned.
    pub fn write_chunk(&mut self, batch: &RecordBatch) -> Result<()> {
        match self.state {
            WriterState::Closed => {
                return Err(WriterError::invalid_state(format!(
                    "write to closed writer for '{}'",
                    self.target.display()
                )))
            }
            WriterState::Unopened => {
                if let Err(e) = self.open(batch.schema()) {
                    self.abort();
                    return Err(e);
                }
            }
            WriterState::Open(_) => {}
        }

        let result = match self.writer.as_mut() {
            Some(writer) => writer
                .write(batch)
                .map_err(|e| WriterError::write_failure(&self.partial, e)),
            None => Err(WriterError::invalid_state("open writer has no output handle")),
        };

        match result {
            Ok(()) => {
                self.rows += batch.num_rows() as u64;
                Ok(())
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    fn open(&mut self, schema: SchemaRef) -> Result<()> {
        if let Some(parent) = self.partial.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WriterError::write_failure(parent, e))?;
        }

        let file = File::create(&self.partial)
            .map_err(|e| WriterError::write_failure(&self.partial, e))?;
        let writer = ArrowWriter::try_new(
            HashingFile::new(file),
            schema.clone(),
            Some(self.properties.clone()),
        )
        .map_err(|e| WriterError::write_failure(&self.partial, e))?;

        debug!(
            path = %self.partial.display(),
            columns = schema.fields().len(),
            "Opened output file"
        );

        self.writer = Some(writer);
        self.state = WriterState::Open(schema);
        Ok(())
    }

    /// Finish the file, move it onto the target and release the handle.
    pub fn close(&mut self) -> Result<WriteSummary> {
        let columns = match self.state.clone() {
            WriterState::Open(schema) => schema.fields().len(),
            WriterState::Unopened => {
                self.state = WriterState::Closed;
                return Err(WriterError::invalid_state(format!(
                    "close before any chunk was written for '{}'",
                    self.target.display()
                )));
            }
            WriterState::Closed => {
                return Err(WriterError::invalid_state(format!(
                    "writer for '{}' already closed",
                    self.target.display()
                )))
            }
        };

        self.state = WriterState::Closed;
        let writer = self
            .writer
            .take()
            .ok_or_else(|| WriterError::invalid_state("open writer has no output handle"))?;

        let sink = writer
            .into_inner()
            .map_err(|e| WriterError::write_failure(&self.partial, e))?;
        let (bytes, content_hash) = sink
            .finish()
            .map_err(|e| WriterError::write_failure(&self.partial, e))?;

        std::fs::rename(&self.partial, &self.target)
            .map_err(|e| WriterError::write_failure(&self.target, e))?;

        debug!(
            path = %self.target.display(),
            rows = self.rows,
            bytes,
            "Closed output file"
        );

        Ok(WriteSummary {
            path: self.target.clone(),
            rows: self.rows,
            columns,
            bytes,
            content_hash,
        })
    }

    /// Release the output handle without finishing the file.
    ///
    /// The partial file, if any, is left in place; the target is never touched.
    pub fn abort(&mut self) {
        if self.writer.take().is_some() {
            warn!(
                path = %self.partial.display(),
                rows = self.rows,
                "Aborted output file; partial output left in place"
            );
        }
        self.state = WriterState::Closed;
    }
}

impl Drop for ColumnarWriter {
    fn drop(&mut self) {
        if self.writer.is_some() {
            self.abort();
        }
    }
}
