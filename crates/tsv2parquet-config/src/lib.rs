// tsv2parquet-config - Unified configuration for the extraction pipeline
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from TSV2PARQUET_CONFIG env var
// 3. Config file contents from TSV2PARQUET_CONFIG_CONTENT env var
// 4. Default config file locations (./tsv2parquet.toml, ./.tsv2parquet.toml)
// 5. Built-in defaults (lowest priority)
//
// The resolved RuntimeConfig is built once at startup and handed to every
// component by reference. Nothing below the binary reads the environment.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};
pub use sources::StdEnvSource;

/// Datasets published by the upstream extract site.
pub const KNOWN_DATASETS: &[&str] = &["granted", "pregrant", "beta"];

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub parquet: ParquetConfig,

    #[serde(default)]
    pub runtime: WorkerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which dataset and data release is being converted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    /// Release identifier appended to every output file name
    pub version: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: "granted".to_string(),
            version: "20251209".to_string(),
        }
    }
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the build tree holding `raw/` and `converted/`
    pub build_dir: PathBuf,
    /// Root of the per-dataset schema artifacts
    pub schema_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("./bld"),
            schema_dir: PathBuf::from("./resources/patentsview_schemas"),
        }
    }
}

/// Streaming/buffered conversion tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Members at or above this uncompressed size are streamed in chunks
    #[serde(default = "default_streaming_threshold")]
    pub streaming_threshold_bytes: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overrides")]
    pub chunk_overrides: Vec<ChunkOverride>,
    /// Trim every member to its first N columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_columns: Option<usize>,
    #[serde(default = "default_member_suffix")]
    pub member_suffix: String,
}

fn default_streaming_threshold() -> u64 {
    200 * 1024 * 1024
}

fn default_chunk_size() -> usize {
    500_000
}

fn default_chunk_overrides() -> Vec<ChunkOverride> {
    // Long free-text columns make large chunks expensive
    vec![ChunkOverride {
        table_contains: "abstract".to_string(),
        chunk_size: 100_000,
    }]
}

fn default_member_suffix() -> String {
    ".tsv".to_string()
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            streaming_threshold_bytes: default_streaming_threshold(),
            chunk_size: default_chunk_size(),
            chunk_overrides: default_chunk_overrides(),
            max_columns: None,
            member_suffix: default_member_suffix(),
        }
    }
}

impl ConversionConfig {
    /// Chunk size for a table, honouring the first matching override.
    pub fn chunk_size_for(&self, table_name: &str) -> usize {
        self.chunk_overrides
            .iter()
            .find(|o| table_name.contains(&o.table_contains))
            .map(|o| o.chunk_size)
            .unwrap_or(self.chunk_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOverride {
    pub table_contains: String,
    pub chunk_size: usize,
}

/// Parquet encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetConfig {
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
    #[serde(default)]
    pub compression: Compression,
}

fn default_row_group_size() -> usize {
    128 * 1024
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            row_group_size: default_row_group_size(),
            compression: Compression::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Snappy => write!(f, "snappy"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(Compression::Snappy),
            "zstd" => Ok(Compression::Zstd),
            _ => anyhow::bail!("Unsupported compression: {}. Supported: snappy, zstd", s),
        }
    }
}

/// Job pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file (CLI `--config`).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// `<build_dir>/raw/<dataset>` - where downloaded archives land
    pub fn raw_dir(&self) -> PathBuf {
        self.paths.build_dir.join("raw").join(&self.dataset.name)
    }

    /// `<build_dir>/converted/<dataset>` - where Parquet files are written
    pub fn converted_dir(&self) -> PathBuf {
        self.paths.build_dir.join("converted").join(&self.dataset.name)
    }

    pub fn conversion_log_path(&self) -> PathBuf {
        self.converted_dir().join("conversion_log.txt")
    }

    /// Deterministic output path for a table in the configured release.
    pub fn output_path(&self, table_name: &str) -> PathBuf {
        self.converted_dir()
            .join(format!("{}_{}.parquet", table_name, self.dataset.version))
    }
}
