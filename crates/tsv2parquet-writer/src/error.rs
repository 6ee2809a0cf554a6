//! Error types for the Parquet writer crate

use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Creating, writing, finishing or renaming an output file failed
    E001WriteFailure,
    /// E002: Operation not allowed in the writer's current state
    E002InvalidState,
    /// E003: Appending to the conversion log failed
    E003LogAppend,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001WriteFailure => "E001",
            Self::E002InvalidState => "E002",
            Self::E003LogAppend => "E003",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while persisting conversion output
#[derive(Debug, Error)]
pub enum WriterError {
    /// Write operation failed
    #[error("[{code}] Write to '{}' failed: {message}", path.display())]
    WriteFailure {
        code: &'static str,
        path: PathBuf,
        message: String,
    },

    /// Writer used after close, or closed before anything was written
    #[error("[{code}] Invalid writer state: {message}")]
    InvalidState { code: &'static str, message: String },

    /// Conversion log could not be appended
    #[error("[{code}] Failed to append to conversion log '{}': {source}", path.display())]
    LogAppend {
        code: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriterError {
    /// Create a write failure error with error code
    pub fn write_failure(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E001WriteFailure.as_str(),
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an invalid state error with error code
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            code: ErrorCode::E002InvalidState.as_str(),
            message: message.into(),
        }
    }

    /// Create a log append error with error code
    pub fn log_append(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LogAppend {
            code: ErrorCode::E003LogAppend.as_str(),
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::WriteFailure { .. } => ErrorCode::E001WriteFailure,
            Self::InvalidState { .. } => ErrorCode::E002InvalidState,
            Self::LogAppend { .. } => ErrorCode::E003LogAppend,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_codes() {
        let err = WriterError::write_failure("/tmp/out.parquet", "disk full");
        assert_eq!(err.code(), ErrorCode::E001WriteFailure);
        assert_eq!(
            err.to_string(),
            "[E001] Write to '/tmp/out.parquet' failed: disk full"
        );

        let err = WriterError::invalid_state("writer already closed");
        assert!(err.to_string().starts_with("[E002]"));
    }
}
