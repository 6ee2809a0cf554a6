// Conversion log
//
// Human-readable audit trail, one line per processed member. Jobs running in
// parallel share one ConversionLog per file; each append writes a whole line
// under the lock so lines never interleave.

use crate::error::{Result, WriterError};
use parking_lot::Mutex;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Streaming {
        table: String,
        size: u64,
        chunk_size: usize,
    },
    Buffered {
        table: String,
        size: u64,
        rows: u64,
        columns: usize,
    },
    /// `subject` is the member or archive that failed
    Error { subject: String, message: String },
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEntry::Streaming {
                table,
                size,
                chunk_size,
            } => write!(
                f,
                "{}: STREAMING (size={} bytes, chunksize={})",
                table, size, chunk_size
            ),
            LogEntry::Buffered {
                table,
                size,
                rows,
                columns,
            } => write!(
                f,
                "{}: BUFFERED (size={} bytes, rows={}, cols={})",
                table, size, rows, columns
            ),
            LogEntry::Error { subject, message } => {
                let message = message.replace(['\r', '\n'], " ");
                write!(f, "{}: ERROR - {}", subject, message)
            }
        }
    }
}

/// Append-only log file shared by all jobs of a run
#[derive(Debug)]
pub struct ConversionLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ConversionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line. The file is opened per call.
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let line = format!("{}\n", entry);
        let _guard = self.lock.lock();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WriterError::log_append(&self.path, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| WriterError::log_append(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| WriterError::log_append(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn entry_formats() {
        let streaming = LogEntry::Streaming {
            table: "g_claims".to_string(),
            size: 314_572_800,
            chunk_size: 500_000,
        };
        assert_eq!(
            streaming.to_string(),
            "g_claims: STREAMING (size=314572800 bytes, chunksize=500000)"
        );

        let buffered = LogEntry::Buffered {
            table: "g_patent".to_string(),
            size: 1024,
            rows: 3,
            columns: 3,
        };
        assert_eq!(
            buffered.to_string(),
            "g_patent: BUFFERED (size=1024 bytes, rows=3, cols=3)"
        );

        let error = LogEntry::Error {
            subject: "g_patent.tsv.zip".to_string(),
            message: "no member\nfound".to_string(),
        };
        assert_eq!(error.to_string(), "g_patent.tsv.zip: ERROR - no member found");
    }

    #[test]
    fn appends_create_parent_and_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converted/granted/conversion_log.txt");
        let log = ConversionLog::new(&path);

        log.append(&LogEntry::Error {
            subject: "a.zip".to_string(),
            message: "boom".to_string(),
        })
        .unwrap();
        log.append(&LogEntry::Buffered {
            table: "b".to_string(),
            size: 1,
            rows: 0,
            columns: 1,
        })
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "a.zip: ERROR - boom\nb: BUFFERED (size=1 bytes, rows=0, cols=1)\n"
        );
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversion_log.txt");
        let log = Arc::new(ConversionLog::new(&path));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.append(&LogEntry::Streaming {
                            table: format!("table_{}_{}", t, i),
                            size: 200 * 1024 * 1024,
                            chunk_size: 500_000,
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 400);
        assert!(lines
            .iter()
            .all(|l| l.starts_with("table_") && l.ends_with("chunksize=500000)")));
    }
}
