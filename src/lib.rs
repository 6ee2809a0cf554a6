// tsv2parquet - Convert zipped tab-separated extracts to Parquet
//
// Library half of the binary: job discovery and the conversion pipeline.
// Archive reading, coercion and output live in the workspace crates.

pub mod init;
pub mod jobs;
pub mod pipeline;

pub use jobs::{discover_jobs, table_name_from_archive, ConversionJob};
pub use pipeline::{
    convert_job, run_jobs, ConversionContext, ConversionResult, JobOutcome, RunReport,
};
pub use tsv2parquet_config::RuntimeConfig;
