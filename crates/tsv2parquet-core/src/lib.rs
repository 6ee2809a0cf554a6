// tsv2parquet-core - Platform-agnostic core logic
//
// This crate contains the PURE processing logic for turning raw rows of a
// delimited-text extract into typed Arrow record batches. No archive access,
// no Parquet encoding, no async.
//
// Flow per chunk: RowChunk -> normalize -> CoercionPlan::coerce -> RecordBatch

pub mod coerce;
pub mod normalize;
pub mod schema;
pub mod types;

// Re-export commonly used types
pub use coerce::{
    parse_date, parse_number, CoercionPlan, IntegerScan, NumericColumn, INTEGER_TOLERANCE,
};
pub use normalize::{normalize_chunk, strip_outer_quotes};
pub use schema::{ColumnSchema, DeclaredType, SchemaError, SchemaResolver};
pub use types::RowChunk;
