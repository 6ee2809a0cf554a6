//! Error types for archive reading

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening an archive or reading its members.
///
/// All of these are fatal for the archive or member being read.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive holds no member with the expected suffix
    #[error("no member ending in '{suffix}' found in {}", archive.display())]
    NoMatchingMember { archive: PathBuf, suffix: String },

    #[error("failed to read archive {}: {source}", archive.display())]
    Archive {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("member '{member}' has no header row")]
    MissingHeader { member: String },

    #[error("member '{member}' has {found} columns, fewer than the configured {required}")]
    TooFewColumns {
        member: String,
        required: usize,
        found: usize,
    },

    #[error("member '{member}' line {line}: expected {expected} fields, found {found}")]
    ColumnCountMismatch {
        member: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("member '{member}': {source}")]
    Parse {
        member: String,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T> = std::result::Result<T, ExtractError>;
