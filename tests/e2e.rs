// End-to-end tests: zip archive on disk -> conversion job -> Parquet file
//
// Each test builds its own build/schema directories under a tempdir.

use arrow::array::{Array, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::compute::concat_batches;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tsv2parquet::{
    convert_job, discover_jobs, run_jobs, ConversionContext, ConversionJob, JobOutcome,
    RuntimeConfig,
};
use tsv2parquet_extract::Strategy;
use zip::write::SimpleFileOptions;

const PATENT_SCHEMA: &str = r#"[
    {"name": "id", "type": "STRING", "description": "patent id"},
    {"name": "type", "type": "STRING", "description": "patent type"},
    {"name": "date_issued", "type": "DATE", "description": "grant date"},
    {"name": "num_claims", "type": "INTEGER", "description": "claim count"}
]"#;

fn test_config(root: &Path) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.paths.build_dir = root.join("bld");
    config.paths.schema_dir = root.join("schemas");
    config.dataset.version = "20251209".to_string();
    config.runtime.workers = 2;
    config
}

fn write_schema(config: &RuntimeConfig, table: &str, body: &str) {
    let dir = config.paths.schema_dir.join(&config.dataset.name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("schema_{}.json", table)), body).unwrap();
}

fn write_archive(config: &RuntimeConfig, file_name: &str, members: &[(&str, &str)]) -> PathBuf {
    let raw = config.raw_dir();
    std::fs::create_dir_all(&raw).unwrap();
    let path = raw.join(file_name);
    let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
    for (name, body) in members {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn single_job(config: &RuntimeConfig) -> ConversionJob {
    let mut jobs = discover_jobs(config).unwrap();
    assert_eq!(jobs.len(), 1);
    jobs.remove(0)
}

fn read_parquet(path: &Path) -> RecordBatch {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap()).unwrap();
    let schema = builder.schema().clone();
    let batches: Vec<RecordBatch> = builder
        .build()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    concat_batches(&schema, &batches).unwrap()
}

fn patent_tsv() -> String {
    [
        "id\ttype\tdate_issued\tnum_claims",
        "10000001\tutility\t2020-01-05\t12",
        "10000002\t\"\"\"design\"\"\"\t01/05/2020\t",
        "10000003\tplant\t2021-12-31\t3",
    ]
    .join("\n")
        + "\n"
}

#[test]
fn converts_patent_archive_with_declared_types() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_schema(&config, "g_patent", PATENT_SCHEMA);
    write_archive(&config, "g_patent.tsv.zip", &[("g_patent.tsv", &patent_tsv())]);

    let job = single_job(&config);
    assert_eq!(job.table_name, "g_patent");

    let ctx = ConversionContext::new(config.clone());
    let outcome = convert_job(&ctx, &job).unwrap();
    let results = match outcome {
        JobOutcome::Converted(results) => results,
        JobOutcome::Skipped => panic!("expected conversion"),
    };
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].rows, 3);
    assert_eq!(results[0].columns, 4);
    assert_eq!(results[0].strategy, Strategy::Buffered);
    assert_eq!(
        results[0].path,
        config.converted_dir().join("g_patent_20251209.parquet")
    );

    let batch = read_parquet(&results[0].path);
    assert_eq!(batch.num_rows(), 3);

    let schema = batch.schema();
    assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
    assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
    assert_eq!(schema.field(2).data_type(), &DataType::Date32);
    assert_eq!(schema.field(3).data_type(), &DataType::Int64);

    let types = batch
        .column(1)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(types.value(0), "utility");
    assert_eq!(types.value(1), "design");

    let dates = batch
        .column(2)
        .as_any()
        .downcast_ref::<Date32Array>()
        .unwrap();
    assert_eq!(dates.value(0), 18_266); // 2020-01-05
    assert!(dates.is_null(1));
    assert_eq!(dates.value(2), 18_992); // 2021-12-31

    let claims = batch
        .column(3)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(claims.value(0), 12);
    assert!(claims.is_null(1));

    let log = std::fs::read_to_string(config.conversion_log_path()).unwrap();
    let expected_size = patent_tsv().len();
    assert_eq!(
        log,
        format!(
            "g_patent: BUFFERED (size={} bytes, rows=3, cols=4)\n",
            expected_size
        )
    );
}

#[test]
fn streaming_and_buffered_produce_identical_rows() {
    let mut body = String::from("id\tdate_issued\tnum_claims\n");
    for i in 0..25 {
        body.push_str(&format!(
            "{}\t\"2020-02-{:02}\"\t{}\n",
            i,
            (i % 28) + 1,
            i * 2
        ));
    }

    let convert_with = |threshold: u64| {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.conversion.streaming_threshold_bytes = threshold;
        config.conversion.chunk_size = 4;
        write_schema(&config, "g_patent", PATENT_SCHEMA);
        write_archive(&config, "g_patent.tsv.zip", &[("g_patent.tsv", &body)]);

        let ctx = ConversionContext::new(config.clone());
        let job = single_job(&config);
        let strategy = match convert_job(&ctx, &job).unwrap() {
            JobOutcome::Converted(results) => results[0].strategy,
            JobOutcome::Skipped => panic!("expected conversion"),
        };
        let log = std::fs::read_to_string(config.conversion_log_path()).unwrap();
        (strategy, read_parquet(&job.target_path), log)
    };

    let size = body.len() as u64;
    let (buffered, buffered_batch, buffered_log) = convert_with(size + 1);
    let (streaming, streaming_batch, streaming_log) = convert_with(size);

    assert_eq!(buffered, Strategy::Buffered);
    assert_eq!(streaming, Strategy::Streaming);
    assert_eq!(buffered_batch.schema(), streaming_batch.schema());
    assert_eq!(buffered_batch, streaming_batch);
    assert_eq!(buffered_batch.num_rows(), 25);

    assert!(buffered_log.starts_with("g_patent: BUFFERED"));
    assert_eq!(
        streaming_log,
        format!("g_patent: STREAMING (size={} bytes, chunksize=4)\n", size)
    );
}

#[test]
fn second_run_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_schema(&config, "g_patent", PATENT_SCHEMA);
    write_archive(&config, "g_patent.tsv.zip", &[("g_patent.tsv", &patent_tsv())]);

    let ctx = ConversionContext::new(config.clone());
    let job = single_job(&config);

    convert_job(&ctx, &job).unwrap();
    let first = std::fs::read(&job.target_path).unwrap();
    let log_after_first = std::fs::read_to_string(config.conversion_log_path()).unwrap();

    let outcome = convert_job(&ctx, &job).unwrap();
    assert_eq!(outcome, JobOutcome::Skipped);
    assert_eq!(std::fs::read(&job.target_path).unwrap(), first);
    assert_eq!(
        std::fs::read_to_string(config.conversion_log_path()).unwrap(),
        log_after_first
    );
}

#[test]
fn archive_without_members_is_logged_and_raised() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_archive(&config, "g_empty.zip", &[("README.txt", "nothing here")]);

    let ctx = ConversionContext::new(config.clone());
    let job = single_job(&config);
    let err = convert_job(&ctx, &job).unwrap_err();
    assert!(format!("{:#}", err).contains("no member ending in '.tsv'"));
    assert!(!job.target_path.exists());

    let log = std::fs::read_to_string(config.conversion_log_path()).unwrap();
    assert!(log.starts_with("g_empty.zip: ERROR - "));
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn missing_schema_keeps_everything_text() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_archive(&config, "g_patent.tsv.zip", &[("g_patent.tsv", &patent_tsv())]);

    let ctx = ConversionContext::new(config.clone());
    let job = single_job(&config);
    convert_job(&ctx, &job).unwrap();

    let batch = read_parquet(&job.target_path);
    for field in batch.schema().fields() {
        assert_eq!(field.data_type(), &DataType::Utf8);
    }
    let dates = batch
        .column(2)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(dates.value(1), "01/05/2020");
}

#[test]
fn fractional_value_in_later_chunk_matches_buffered_output() {
    let body = "id\tnum_claims\na\t1\nb\t2\nc\t2.5\nd\t7\n";

    let convert_with = |threshold: u64| {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.conversion.streaming_threshold_bytes = threshold;
        config.conversion.chunk_size = 2;
        write_schema(&config, "g_patent", PATENT_SCHEMA);
        write_archive(&config, "g_patent.tsv.zip", &[("g_patent.tsv", body)]);

        let ctx = ConversionContext::new(config.clone());
        let job = single_job(&config);
        let strategy = match convert_job(&ctx, &job).unwrap() {
            JobOutcome::Converted(results) => results[0].strategy,
            JobOutcome::Skipped => panic!("expected conversion"),
        };
        (strategy, read_parquet(&job.target_path))
    };

    let (buffered, buffered_batch) = convert_with(u64::MAX);
    let (streaming, streaming_batch) = convert_with(0);

    assert_eq!(buffered, Strategy::Buffered);
    assert_eq!(streaming, Strategy::Streaming);
    assert_eq!(buffered_batch, streaming_batch);
    assert_eq!(
        streaming_batch.schema().field(1).data_type(),
        &DataType::Float64
    );
    let claims = streaming_batch
        .column(1)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(claims.values().to_vec(), vec![1.0, 2.0, 2.5, 7.0]);
}

#[test]
fn whole_numbers_across_chunks_stay_integer() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.conversion.streaming_threshold_bytes = 0;
    config.conversion.chunk_size = 2;
    write_schema(&config, "g_patent", PATENT_SCHEMA);
    write_archive(
        &config,
        "g_patent.tsv.zip",
        &[("g_patent.tsv", "id\tnum_claims\na\t1\nb\t\nc\t\"3\"\nd\t7.0\n")],
    );

    let ctx = ConversionContext::new(config.clone());
    let job = single_job(&config);
    convert_job(&ctx, &job).unwrap();

    let batch = read_parquet(&job.target_path);
    assert_eq!(batch.schema().field(1).data_type(), &DataType::Int64);
    let claims = batch
        .column(1)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert!(claims.is_null(1));
    assert_eq!(
        (claims.value(0), claims.value(2), claims.value(3)),
        (1, 3, 7)
    );
}

#[test]
fn write_failure_is_logged_and_raised() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_schema(&config, "g_patent", PATENT_SCHEMA);
    write_archive(&config, "g_patent.tsv.zip", &[("g_patent.tsv", &patent_tsv())]);

    let ctx = ConversionContext::new(config.clone());
    let job = single_job(&config);

    // A directory where the in-progress output file belongs
    let mut partial = job.target_path.as_os_str().to_owned();
    partial.push(".partial");
    std::fs::create_dir_all(PathBuf::from(partial)).unwrap();

    let err = convert_job(&ctx, &job).unwrap_err();
    assert!(format!("{:#}", err).contains("E001"));
    assert!(!job.target_path.exists());

    let log = std::fs::read_to_string(config.conversion_log_path()).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.starts_with("g_patent.tsv.zip: ERROR - "));
}

#[test]
fn fractional_first_chunk_commits_float() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_schema(&config, "g_patent", PATENT_SCHEMA);
    write_archive(
        &config,
        "g_patent.tsv.zip",
        &[("g_patent.tsv", "id\tnum_claims\na\t1\nb\t2.5\nc\t3\n")],
    );

    let ctx = ConversionContext::new(config.clone());
    let job = single_job(&config);
    convert_job(&ctx, &job).unwrap();

    let batch = read_parquet(&job.target_path);
    let claims = batch
        .column(1)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(claims.values().to_vec(), vec![1.0, 2.5, 3.0]);
}

#[test]
fn header_only_member_writes_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_schema(&config, "g_patent", PATENT_SCHEMA);
    write_archive(
        &config,
        "g_patent.tsv.zip",
        &[("g_patent.tsv", "id\tdate_issued\n")],
    );

    let ctx = ConversionContext::new(config.clone());
    let job = single_job(&config);
    convert_job(&ctx, &job).unwrap();

    let batch = read_parquet(&job.target_path);
    assert_eq!(batch.num_rows(), 0);
    assert_eq!(batch.schema().field(1).data_type(), &DataType::Date32);
}

#[test]
fn multi_member_archive_writes_one_file_per_member() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_archive(
        &config,
        "g_claims.zip",
        &[
            ("g_claims_2020.tsv", "id\tclaim\n1\tfirst\n"),
            ("g_claims_2021.tsv", "id\tclaim\n2\tsecond\n3\tthird\n"),
        ],
    );

    let ctx = ConversionContext::new(config.clone());
    let job = single_job(&config);
    let results = match convert_job(&ctx, &job).unwrap() {
        JobOutcome::Converted(results) => results,
        JobOutcome::Skipped => panic!("expected conversion"),
    };
    assert_eq!(results.len(), 2);

    let extra = config
        .converted_dir()
        .join("g_claims_g_claims_2021_20251209.parquet");
    assert_eq!(read_parquet(&extra).num_rows(), 2);
    assert_eq!(read_parquet(&job.target_path).num_rows(), 1);
    assert_eq!(results.last().unwrap().path, job.target_path);
}

#[test]
fn malformed_member_fails_without_target() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_archive(
        &config,
        "g_bad.zip",
        &[("g_bad.tsv", "a\tb\n1\t2\n1\t2\t3\n")],
    );

    let ctx = ConversionContext::new(config.clone());
    let job = single_job(&config);
    assert!(convert_job(&ctx, &job).is_err());
    assert!(!job.target_path.exists());

    let log = std::fs::read_to_string(config.conversion_log_path()).unwrap();
    assert!(log.starts_with("g_bad.zip: ERROR - "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_jobs_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_schema(&config, "g_patent", PATENT_SCHEMA);
    write_archive(&config, "g_patent.tsv.zip", &[("g_patent.tsv", &patent_tsv())]);
    write_archive(&config, "g_claims.zip", &[("g_claims.tsv", "id\tclaim\n1\tx\n")]);
    write_archive(&config, "g_broken.zip", &[("notes.md", "no data")]);

    let jobs = discover_jobs(&config).unwrap();
    assert_eq!(jobs.len(), 3);

    let ctx = Arc::new(ConversionContext::new(config.clone()));
    let report = run_jobs(Arc::clone(&ctx), jobs.clone()).await.unwrap();

    assert_eq!(report.converted.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "g_broken");
    assert!(!report.is_success());

    let log = std::fs::read_to_string(config.conversion_log_path()).unwrap();
    assert_eq!(log.lines().count(), 3);
    assert!(log.lines().any(|l| l.starts_with("g_broken.zip: ERROR - ")));

    // Rerun: converted jobs skip, the broken one fails again
    let report = run_jobs(ctx, jobs).await.unwrap();
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.failed.len(), 1);
}
