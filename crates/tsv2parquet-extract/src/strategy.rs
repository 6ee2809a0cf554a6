// Size classification
//
// Members at or above the threshold are read in bounded chunks; smaller ones
// are read whole. Both paths feed the same normalize/coerce/write pipeline.

use std::fmt;

/// How a member's rows are pulled out of the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Streaming,
    Buffered,
}

impl Strategy {
    /// `size >= threshold` streams; anything smaller is buffered.
    pub fn classify(uncompressed_size: u64, threshold: u64) -> Self {
        if uncompressed_size >= threshold {
            Strategy::Streaming
        } else {
            Strategy::Buffered
        }
    }

    /// Maximum rows per chunk under this strategy.
    pub fn chunk_limit(&self, chunk_size: usize) -> usize {
        match self {
            Strategy::Streaming => chunk_size.max(1),
            Strategy::Buffered => usize::MAX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Streaming => "STREAMING",
            Strategy::Buffered => "BUFFERED",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
