// Job discovery
//
// One job per downloaded archive. Descriptors are enumerated up front from
// the raw directory so the pool only ever sees plain data.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tsv2parquet_config::RuntimeConfig;

/// Everything a worker needs to convert one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub table_name: String,
    pub dataset: String,
    pub archive_path: PathBuf,
    /// `<converted_dir>/<table>_<version>.parquet`
    pub target_path: PathBuf,
}

impl ConversionJob {
    /// Archive file name, used as the subject of error log lines.
    pub fn archive_name(&self) -> String {
        self.archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.archive_path.display().to_string())
    }
}

/// `g_patent.tsv.zip` -> `g_patent`, `g_claims.zip` -> `g_claims`.
///
/// Returns None for paths that are not zip archives.
pub fn table_name_from_archive(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(".zip")?;
    let table = stem.strip_suffix(".tsv").unwrap_or(stem);
    if table.is_empty() {
        return None;
    }
    Some(table.to_string())
}

/// List conversion jobs for every `*.zip` in the dataset's raw directory,
/// sorted by archive path.
pub fn discover_jobs(config: &RuntimeConfig) -> Result<Vec<ConversionJob>> {
    let raw_dir = config.raw_dir();
    if !raw_dir.exists() {
        warn!(path = %raw_dir.display(), "Raw directory does not exist; nothing to convert");
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(&raw_dir)
        .with_context(|| format!("Failed to list raw directory {}", raw_dir.display()))?;

    let mut jobs = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read entry in {}", raw_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(table_name) = table_name_from_archive(&path) else {
            continue;
        };

        jobs.push(ConversionJob {
            target_path: config.output_path(&table_name),
            table_name,
            dataset: config.dataset.name.clone(),
            archive_path: path,
        });
    }

    jobs.sort_by(|a, b| a.archive_path.cmp(&b.archive_path));
    debug!(
        dataset = %config.dataset.name,
        jobs = jobs.len(),
        "Discovered conversion jobs"
    );
    Ok(jobs)
}
