// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_dataset_config(&config.dataset)?;
    validate_conversion_config(&config.conversion)?;
    validate_parquet_config(&config.parquet)?;

    if config.runtime.workers == 0 {
        bail!("runtime.workers must be greater than 0");
    }

    Ok(())
}

fn validate_dataset_config(config: &DatasetConfig) -> Result<()> {
    if !KNOWN_DATASETS.contains(&config.name.as_str()) {
        bail!(
            "dataset.name '{}' is not a known dataset. Supported: {}",
            config.name,
            KNOWN_DATASETS.join(", ")
        );
    }

    if config.version.is_empty() {
        bail!("dataset.version must not be empty");
    }

    // The version ends up in file names
    if config
        .version
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_whitespace())
    {
        bail!(
            "dataset.version '{}' must not contain path separators or whitespace",
            config.version
        );
    }

    Ok(())
}

fn validate_conversion_config(config: &ConversionConfig) -> Result<()> {
    if config.chunk_size == 0 {
        bail!("conversion.chunk_size must be greater than 0");
    }

    for o in &config.chunk_overrides {
        if o.chunk_size == 0 {
            bail!(
                "conversion.chunk_overrides entry '{}' must have chunk_size greater than 0",
                o.table_contains
            );
        }
        if o.table_contains.is_empty() {
            bail!("conversion.chunk_overrides entries need a non-empty table_contains");
        }
    }

    if config.max_columns == Some(0) {
        bail!("conversion.max_columns must be greater than 0 when set");
    }

    if config.member_suffix.is_empty() {
        bail!("conversion.member_suffix must not be empty");
    }

    if config.streaming_threshold_bytes == 0 {
        warn!("conversion.streaming_threshold_bytes is 0; every member will be streamed");
    }

    if config.chunk_size > 5_000_000 {
        warn!(
            chunk_size = config.chunk_size,
            "conversion.chunk_size is very large; may cause memory issues"
        );
    }

    Ok(())
}

fn validate_parquet_config(config: &ParquetConfig) -> Result<()> {
    if config.row_group_size == 0 {
        bail!("parquet.row_group_size must be greater than 0");
    }

    Ok(())
}
