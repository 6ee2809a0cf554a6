// Conversion pipeline
//
// Per job: idempotent skip -> schema -> archive -> per member:
//   classify -> [integer scan] -> read chunks -> normalize -> coerce -> write -> close -> log
//
// Streaming members with declared INTEGER columns are read twice: once to fix
// each column's physical type from every row, then again to write.
//
// Jobs share only the immutable config, the schema resolver and the
// conversion log. Within a job everything runs sequentially on one thread.

use crate::jobs::ConversionJob;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};
use tsv2parquet_config::RuntimeConfig;
use tsv2parquet_core::{
    normalize_chunk, CoercionPlan, ColumnSchema, IntegerScan, RowChunk, SchemaResolver,
};
use tsv2parquet_extract::{ExtractArchive, MemberInfo, MemberOptions, Strategy};
use tsv2parquet_writer::{ColumnarWriter, ConversionLog, LogEntry, WriterState};

/// Shared, read-only state for every job of a run
#[derive(Debug)]
pub struct ConversionContext {
    config: RuntimeConfig,
    resolver: SchemaResolver,
    log: ConversionLog,
}

impl ConversionContext {
    pub fn new(config: RuntimeConfig) -> Self {
        let resolver = SchemaResolver::new(config.paths.schema_dir.clone());
        let log = ConversionLog::new(config.conversion_log_path());
        Self {
            config,
            resolver,
            log,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn log(&self) -> &ConversionLog {
        &self.log
    }
}

/// One converted member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub table_name: String,
    pub member: String,
    pub path: PathBuf,
    pub rows: u64,
    pub columns: usize,
    pub strategy: Strategy,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Converted(Vec<ConversionResult>),
    /// Target already existed; nothing was read or written
    Skipped,
}

/// Convert one archive. Failures are appended to the conversion log and
/// returned to the caller.
pub fn convert_job(ctx: &ConversionContext, job: &ConversionJob) -> Result<JobOutcome> {
    if job.target_path.exists() {
        info!(
            table = %job.table_name,
            path = %job.target_path.display(),
            "Skipping (already converted)"
        );
        return Ok(JobOutcome::Skipped);
    }

    info!(
        dataset = %job.dataset,
        archive = %job.archive_path.display(),
        "Extracting and converting"
    );

    match convert_archive(ctx, job) {
        Ok(results) => {
            info!(
                table = %job.table_name,
                path = %job.target_path.display(),
                members = results.len(),
                "Conversion complete"
            );
            Ok(JobOutcome::Converted(results))
        }
        Err(e) => {
            error!(
                table = %job.table_name,
                archive = %job.archive_path.display(),
                error = %format!("{:#}", e),
                "Conversion failed"
            );
            let entry = LogEntry::Error {
                subject: job.archive_name(),
                message: format!("{:#}", e),
            };
            if let Err(log_err) = ctx.log.append(&entry) {
                warn!(error = %log_err, "Failed to record conversion error");
            }
            Err(e)
        }
    }
}

/// Output path for a member other than the archive's first.
fn extra_member_target(
    job: &ConversionJob,
    member: &MemberInfo,
    suffix: &str,
    version: &str,
) -> PathBuf {
    job.target_path.with_file_name(format!(
        "{}_{}_{}.parquet",
        job.table_name,
        member.stem(suffix),
        version
    ))
}

fn convert_archive(ctx: &ConversionContext, job: &ConversionJob) -> Result<Vec<ConversionResult>> {
    let config = &ctx.config;
    let suffix = config.conversion.member_suffix.as_str();

    let schema = ctx.resolver.resolve(&job.table_name, &job.dataset);

    let mut archive = ExtractArchive::open(&job.archive_path, suffix)?;
    let members = archive.members().to_vec();
    let (first, rest) = members
        .split_first()
        .ok_or_else(|| anyhow!("archive {} has no members", job.archive_path.display()))?;

    // The job target is written last so its existence means the whole archive is done
    let mut results = Vec::with_capacity(members.len());
    for member in rest {
        let target = extra_member_target(job, member, suffix, &config.dataset.version);
        if target.exists() {
            debug!(path = %target.display(), "Member output already exists");
            continue;
        }
        results.push(convert_member(
            ctx,
            &mut archive,
            member,
            &job.table_name,
            &schema,
            &target,
        )?);
    }
    results.push(convert_member(
        ctx,
        &mut archive,
        first,
        &job.table_name,
        &schema,
        &job.target_path,
    )?);

    Ok(results)
}

fn convert_member(
    ctx: &ConversionContext,
    archive: &mut ExtractArchive,
    member: &MemberInfo,
    table_name: &str,
    schema: &ColumnSchema,
    target: &Path,
) -> Result<ConversionResult> {
    let conversion = &ctx.config.conversion;
    let strategy = Strategy::classify(member.size, conversion.streaming_threshold_bytes);
    let chunk_size = conversion.chunk_size_for(table_name);

    info!(
        member = %member.name,
        size = member.size,
        strategy = %strategy,
        "Converting member"
    );

    if strategy == Strategy::Streaming {
        ctx.log.append(&LogEntry::Streaming {
            table: table_name.to_string(),
            size: member.size,
            chunk_size,
        })?;
    }

    let options = MemberOptions {
        max_columns: conversion.max_columns,
    };
    let chunk_limit = strategy.chunk_limit(chunk_size);

    let scan = if strategy == Strategy::Streaming {
        scan_integer_columns(archive, member, &options, schema, chunk_limit)?
    } else {
        None
    };

    let opened = archive
        .open_member(member, &options)
        .with_context(|| format!("Failed to open member {}", member.name))?;
    let columns = Arc::clone(opened.columns());

    let mut plan = CoercionPlan::new(Arc::clone(&columns), schema);
    if let Some(scan) = &scan {
        plan.fix_integer_types(scan)?;
    }
    let mut writer = ColumnarWriter::new(
        target,
        &ctx.config.parquet,
        table_name,
        &ctx.config.dataset.version,
    );

    for (index, chunk) in opened.chunks(chunk_limit).enumerate() {
        let mut chunk = chunk?;
        debug!(
            member = %member.name,
            chunk = index,
            rows = chunk.num_rows(),
            columns = chunk.num_columns(),
            "Processing chunk"
        );
        normalize_chunk(&mut chunk);
        let batch = plan
            .coerce(&chunk)
            .with_context(|| format!("Failed to coerce chunk {} of {}", index, member.name))?;
        writer.write_chunk(&batch)?;
    }

    // Header-only member: still produce a file carrying the header schema
    if matches!(writer.state(), WriterState::Unopened) {
        let batch = plan.coerce(&RowChunk::empty(Arc::clone(&columns)))?;
        writer.write_chunk(&batch)?;
    }

    let summary = writer.close()?;

    if strategy == Strategy::Buffered {
        ctx.log.append(&LogEntry::Buffered {
            table: table_name.to_string(),
            size: member.size,
            rows: summary.rows,
            columns: summary.columns,
        })?;
    }

    info!(
        member = %member.name,
        path = %summary.path.display(),
        rows = summary.rows,
        bytes = summary.bytes,
        "Converted member"
    );

    Ok(ConversionResult {
        table_name: table_name.to_string(),
        member: member.name.clone(),
        path: summary.path,
        rows: summary.rows,
        columns: summary.columns,
        strategy,
        content_hash: summary.content_hash,
    })
}

/// Read a member once to decide every declared INTEGER column from all of its rows.
///
/// Returns `None` when the member has no declared INTEGER column.
fn scan_integer_columns(
    archive: &mut ExtractArchive,
    member: &MemberInfo,
    options: &MemberOptions,
    schema: &ColumnSchema,
    chunk_limit: usize,
) -> Result<Option<IntegerScan>> {
    let opened = archive
        .open_member(member, options)
        .with_context(|| format!("Failed to open member {}", member.name))?;
    let mut scan = IntegerScan::new(Arc::clone(opened.columns()), schema);
    if scan.is_empty() {
        return Ok(None);
    }

    for chunk in opened.chunks(chunk_limit) {
        let mut chunk = chunk?;
        normalize_chunk(&mut chunk);
        scan.observe(&chunk);
    }

    debug!(
        member = %member.name,
        rows = scan.rows(),
        "Fixed integer column types from full member scan"
    );
    Ok(Some(scan))
}

/// Totals for a run of jobs
#[derive(Debug, Default)]
pub struct RunReport {
    pub converted: Vec<ConversionResult>,
    pub skipped: Vec<String>,
    /// `(table, error message)`
    pub failed: Vec<(String, String)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run jobs on the blocking pool, at most `runtime.workers` at a time.
///
/// A failing job never stops the others; its error is collected in the report.
pub async fn run_jobs(ctx: Arc<ConversionContext>, jobs: Vec<ConversionJob>) -> Result<RunReport> {
    let workers = ctx.config.runtime.workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut set = JoinSet::new();
    let mut tables = HashMap::new();

    info!(jobs = jobs.len(), workers, "Starting conversion jobs");

    for job in jobs {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .context("Job semaphore closed")?;
        let ctx = Arc::clone(&ctx);
        let table = job.table_name.clone();
        let handle = set.spawn_blocking(move || {
            let _permit = permit;
            convert_job(&ctx, &job)
        });
        tables.insert(handle.id(), table);
    }

    let report = collect_outcomes(&mut set, tables).await;

    info!(
        converted = report.converted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Conversion run finished"
    );
    Ok(report)
}

/// Drain finished jobs into a report, naming each by the table its task was spawned for.
async fn collect_outcomes(
    set: &mut JoinSet<Result<JobOutcome>>,
    mut tables: HashMap<Id, String>,
) -> RunReport {
    let mut report = RunReport::default();
    while let Some(joined) = set.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(e) => (e.id(), Err(anyhow!("job panicked: {}", e))),
        };
        let table = tables.remove(&id).unwrap_or_default();
        match outcome {
            Ok(JobOutcome::Converted(results)) => report.converted.extend(results),
            Ok(JobOutcome::Skipped) => report.skipped.push(table),
            Err(e) => report.failed.push((table, format!("{:#}", e))),
        }
    }
    report
}
