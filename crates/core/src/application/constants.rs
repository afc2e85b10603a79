// Pipeline constants (no magic values)
use std::time::Duration;

/// Step names as registered with a job runner
pub const ALIGN_STEP: &str = "assembly_task";
pub const SORT_STEP: &str = "sort_bam_task";
pub const COPY_STEP: &str = "copy_read1";

/// Step-start title of the sort step, which predates its registered name
pub const SORT_STEP_TITLE: &str = "Running bam_task";

/// Workflow names
pub const PROCESS_READS_WORKFLOW: &str = "process_reads";
pub const ASSEMBLE_AND_SORT_WORKFLOW: &str = "assemble_and_sort";

/// Fixed output file names
pub const ALIGNMENT_FILE: &str = "covid_assembly.sam";
pub const SORTED_FILE: &str = "covid_sorted.bam";
pub const READ1_COPY_FILE: &str = "read1_copy.fastq";

/// Remote namespace outputs are uploaded to
pub const OUTPUT_NAMESPACE: &str = "latch:///";

/// Default external binaries and reference
pub const DEFAULT_ALIGNER: &str = "bowtie2/bowtie2";
pub const DEFAULT_REFERENCE_INDEX: &str = "wuhan";
pub const DEFAULT_SAMTOOLS: &str = "samtools";
pub const DEFAULT_COPY_PROGRAM: &str = "cp";

/// Default number of map instances running at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default retry base delay (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 1000;

/// Stderr lines kept in step failure messages
pub const STDERR_TAIL_LINES: usize = 20;

/// Graceful process shutdown timeout before SIGKILL (5 seconds)
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Name of the default launch plan
pub const TEST_DATA_PLAN: &str = "Test Data";

/// Remote URI for an output file name
pub fn remote_output(file_name: &str) -> String {
    format!("{}{}", OUTPUT_NAMESPACE, file_name)
}
