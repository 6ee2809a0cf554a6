use super::RuntimeConfig;
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "TSV2PARQUET_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Look up `key` with the `TSV2PARQUET_` prefix applied.
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Dataset selection
    if let Some(name) = env.get("DATASET") {
        config.dataset.name = name;
    }
    if let Some(version) = env.get("DATA_VERSION") {
        config.dataset.version = version;
    }

    // Paths
    if let Some(dir) = env.get("BUILD_DIR") {
        config.paths.build_dir = PathBuf::from(dir);
    }
    if let Some(dir) = env.get("SCHEMA_DIR") {
        config.paths.schema_dir = PathBuf::from(dir);
    }

    // Conversion tuning
    if let Some(val) = get_env_parsed::<u64, E>(env, "STREAMING_THRESHOLD_BYTES")? {
        config.conversion.streaming_threshold_bytes = val;
    }
    if let Some(val) = get_env_parsed::<usize, E>(env, "CHUNK_SIZE")? {
        config.conversion.chunk_size = val;
    }
    if let Some(val) = get_env_parsed::<usize, E>(env, "MAX_COLUMNS")? {
        config.conversion.max_columns = Some(val);
    }

    // Parquet
    if let Some(val) = get_env_parsed::<usize, E>(env, "ROW_GROUP_SIZE")? {
        config.parquet.row_group_size = val;
    }
    if let Some(compression) = env.get("COMPRESSION") {
        config.parquet.compression = compression
            .parse()
            .with_context(|| format!("Invalid {}COMPRESSION value", ENV_PREFIX))?;
    }

    // Job pool
    if let Some(val) = get_env_parsed::<usize, E>(env, "WORKERS")? {
        config.runtime.workers = val;
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.logging.format = format
            .parse()
            .with_context(|| format!("Invalid {}LOG_FORMAT value", ENV_PREFIX))?;
    }

    Ok(())
}

fn get_env_parsed<T, E>(env: &E, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    E: EnvSource,
{
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
