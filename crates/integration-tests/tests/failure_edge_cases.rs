//! Failure handling: nonzero exits, missing outputs, timeouts, retries,
//! cancellation and staging errors

mod common;

use std::time::Duration;

use common::{pipeline, tools, Workspace};
use readflow_core::application::shutdown::{shutdown_channel, ShutdownToken};
use readflow_core::domain::{FileRef, Sample};
use readflow_core::port::StagingError;
use readflow_core::AppError;

fn step_failure(err: AppError) -> (String, String) {
    match err {
        AppError::StepFailed { step, message } => (step, message),
        other => panic!("expected StepFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_aligner_nonzero_exit_fails_run_before_sort() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.aligner = tools().failing.display().to_string();

    let err = pipeline(&config)
        .process_reads(&[ws.local_sample("x")], &ShutdownToken::never())
        .await
        .unwrap_err();

    let (step, message) = step_failure(err);
    assert_eq!(step, "assembly_task[0]");
    assert!(message.contains("exited with 3"), "{}", message);
    assert!(message.contains("reference index not found"), "{}", message);

    assert!(!config.work_dir.join("run-1/sort_bam_task").exists());
    assert!(!ws.uploaded("covid_sorted.bam").exists());
}

#[tokio::test]
async fn test_missing_declared_output_is_a_failure() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.samtools = tools().silent.display().to_string();

    let err = pipeline(&config)
        .process_reads(&[ws.local_sample("x")], &ShutdownToken::never())
        .await
        .unwrap_err();

    let (step, message) = step_failure(err);
    assert_eq!(step, "sort_bam_task");
    assert!(message.contains("did not produce"), "{}", message);
    assert!(message.contains("covid_sorted.bam"), "{}", message);
}

#[tokio::test]
async fn test_missing_binary() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.aligner = ws.path().join("no-such-bowtie2").display().to_string();

    let err = pipeline(&config)
        .assemble_and_sort(&[ws.local_sample("x")], &ShutdownToken::never())
        .await
        .unwrap_err();

    let (_, message) = step_failure(err);
    assert!(message.contains("Spawn failed"), "{}", message);
}

#[tokio::test]
async fn test_step_timeout() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.aligner = tools().slow.display().to_string();
    config.step_timeout_secs = 1;

    let started = std::time::Instant::now();
    let err = pipeline(&config)
        .process_reads(&[ws.local_sample("x")], &ShutdownToken::never())
        .await
        .unwrap_err();

    let (step, message) = step_failure(err);
    assert_eq!(step, "assembly_task[0]");
    assert!(message.contains("timeout after 1000ms"), "{}", message);
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.aligner = tools().flaky.display().to_string();
    config.max_attempts = 2;
    config.retry_base_delay_ms = 10;

    let summary = pipeline(&config)
        .process_reads(&[ws.local_sample("x")], &ShutdownToken::never())
        .await
        .unwrap();

    let align = summary
        .steps
        .iter()
        .find(|s| s.label() == "assembly_task[0]")
        .unwrap();
    assert_eq!(align.attempts, 2);
    assert!(align.error.is_none());
    assert_eq!(
        std::fs::read_to_string(summary.sorted[0].local_path().unwrap())
            .unwrap()
            .trim(),
        "sorted aligned x"
    );
}

#[tokio::test]
async fn test_without_retries_transient_failure_is_final() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.aligner = tools().flaky.display().to_string();

    let err = pipeline(&config)
        .process_reads(&[ws.local_sample("x")], &ShutdownToken::never())
        .await
        .unwrap_err();

    let (_, message) = step_failure(err);
    assert!(message.contains("transient failure"), "{}", message);
}

#[tokio::test]
async fn test_cancellation_stops_running_step() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.aligner = tools().slow.display().to_string();

    let (shutdown_tx, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.shutdown();
    });

    let started = std::time::Instant::now();
    let err = pipeline(&config)
        .assemble_and_sort(&[ws.local_sample("x")], &shutdown)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Cancelled), "{:?}", err);
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[tokio::test]
async fn test_missing_local_input() {
    let ws = Workspace::new();
    let config = ws.config();
    let sample = Sample::new(
        FileRef::local(ws.path().join("absent_1.fastq")),
        FileRef::local(ws.path().join("absent_2.fastq")),
    );

    let err = pipeline(&config)
        .assemble_and_sort(&[sample], &ShutdownToken::never())
        .await
        .unwrap_err();

    assert!(
        matches!(err, AppError::Staging(StagingError::NotFound(_))),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_missing_and_unsupported_remote_inputs() {
    let ws = Workspace::new();
    let config = ws.config();

    let missing = Sample::new(
        FileRef::remote("s3://latch-public/init/r1.fastq"),
        FileRef::remote("s3://latch-public/init/r2.fastq"),
    );
    let err = pipeline(&config)
        .process_reads(&[missing], &ShutdownToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Staging(StagingError::NotFound(_))));

    let unsupported = Sample::new(
        FileRef::remote("ftp://host/r1.fastq"),
        FileRef::remote("ftp://host/r2.fastq"),
    );
    let err = pipeline(&config)
        .process_reads(&[unsupported], &ShutdownToken::never())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Staging(StagingError::UnsupportedScheme { .. })
    ));
}

#[tokio::test]
async fn test_invalid_sample_lists() {
    let ws = Workspace::new();
    let config = ws.config();
    let pipeline = pipeline(&config);

    let err = pipeline
        .assemble_and_sort(&[], &ShutdownToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let read = FileRef::local(ws.path().join("same.fastq"));
    let err = pipeline
        .assemble_and_sort(&[Sample::new(read.clone(), read)], &ShutdownToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Nothing was created for rejected runs
    assert!(!config.work_dir.exists());
}
