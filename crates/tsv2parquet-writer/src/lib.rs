//! Parquet output for tsv2parquet
//!
//! This crate owns everything that touches output files: the per-member
//! `ColumnarWriter` state machine, writer properties, and the shared
//! append-only conversion log.

mod conversion_log;
mod encoding;
mod error;
mod writer;

pub use conversion_log::{ConversionLog, LogEntry};
pub use encoding::writer_properties;
pub use error::{ErrorCode, Result, WriterError};
pub use writer::{ColumnarWriter, WriteSummary, WriterState};
