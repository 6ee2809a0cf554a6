// tsv2parquet-extract - Archive reading
//
// Opens zip archives, lists tab-separated members, and yields their rows as
// RowChunks sized by the member's strategy. Blocking I/O only.

mod archive;
mod chunks;
mod error;
mod strategy;

pub use archive::{ExtractArchive, ExtractMember, MemberInfo, MemberOptions};
pub use chunks::RowChunks;
pub use error::{ExtractError, Result};
pub use strategy::Strategy;
