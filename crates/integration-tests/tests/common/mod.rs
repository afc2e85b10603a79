//! Shared fixtures: fake aligner/sorter scripts and a pipeline wired to the real adapters

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use readflow_core::application::{
    Pipeline, PipelineConfig, RetryPolicy, SortOutputMode, StepExecutor,
};
use readflow_core::domain::{FileRef, Sample};
use readflow_core::port::id_provider::SequentialIdProvider;
use readflow_core::port::time_provider::SystemTimeProvider;
use readflow_infra_system::{LocalObjectStore, SubprocessRunner};

/// Writes "aligned <contents of read1>" to the -S target
const FAKE_ALIGNER: &str = r#"#!/bin/sh
out=""
r1=""
while [ $# -gt 0 ]; do
  case "$1" in
    -S) out="$2"; shift ;;
    -1) r1="$2"; shift ;;
  esac
  shift
done
echo "aligned $(cat "$r1")" > "$out"
"#;

/// `sort -o OUT -O bam IN`: writes "sorted <contents of IN>" to OUT
const FAKE_SAMTOOLS: &str = r#"#!/bin/sh
out=""
input=""
while [ $# -gt 0 ]; do
  case "$1" in
    sort) ;;
    -o) out="$2"; shift ;;
    -O) shift ;;
    *) input="$1" ;;
  esac
  shift
done
echo "sorted $(cat "$input")" > "$out"
"#;

/// Fails the first time it sees a read, then behaves like the fake aligner
const FLAKY_ALIGNER: &str = r#"#!/bin/sh
out=""
r1=""
while [ $# -gt 0 ]; do
  case "$1" in
    -S) out="$2"; shift ;;
    -1) r1="$2"; shift ;;
  esac
  shift
done
if [ ! -f "$r1.seen" ]; then
  touch "$r1.seen"
  echo "transient failure" >&2
  exit 1
fi
echo "aligned $(cat "$r1")" > "$out"
"#;

const FAILING_TOOL: &str = "#!/bin/sh\necho \"reference index not found\" >&2\nexit 3\n";
const SILENT_TOOL: &str = "#!/bin/sh\nexit 0\n";
const SLOW_TOOL: &str = "#!/bin/sh\nsleep 30\n";

pub struct Tools {
    pub aligner: PathBuf,
    pub samtools: PathBuf,
    pub flaky: PathBuf,
    pub failing: PathBuf,
    pub silent: PathBuf,
    pub slow: PathBuf,
}

/// Tool scripts, written once per test binary before anything is spawned
pub fn tools() -> &'static Tools {
    static TOOLS: OnceLock<(tempfile::TempDir, Tools)> = OnceLock::new();
    let (_, tools) = TOOLS.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let tools = Tools {
            aligner: script(dir.path(), "bowtie2", FAKE_ALIGNER),
            samtools: script(dir.path(), "samtools", FAKE_SAMTOOLS),
            flaky: script(dir.path(), "flaky", FLAKY_ALIGNER),
            failing: script(dir.path(), "failing", FAILING_TOOL),
            silent: script(dir.path(), "silent", SILENT_TOOL),
            slow: script(dir.path(), "slow", SLOW_TOOL),
        };
        (dir, tools)
    });
    tools
}

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Workspace for one test: work dir, object store and input reads
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store_root(&self) -> PathBuf {
        self.path().join("store")
    }

    pub fn config(&self) -> PipelineConfig {
        let tools = tools();
        PipelineConfig {
            work_dir: self.path().join("work"),
            store_root: self.store_root(),
            aligner: tools.aligner.display().to_string(),
            reference_index: "wuhan".to_string(),
            samtools: tools.samtools.display().to_string(),
            concurrency: 2,
            ..PipelineConfig::default()
        }
    }

    /// Local sample whose read1 contains `tag`
    pub fn local_sample(&self, tag: &str) -> Sample {
        let dir = self.path().join("reads");
        std::fs::create_dir_all(&dir).unwrap();
        let read1 = dir.join(format!("{}_1.fastq", tag));
        let read2 = dir.join(format!("{}_2.fastq", tag));
        std::fs::write(&read1, tag).unwrap();
        std::fs::write(&read2, format!("{} mate", tag)).unwrap();
        Sample::new(FileRef::local(read1), FileRef::local(read2))
    }

    /// Put an object into the store under `s3://bucket/key`
    pub fn put_object(&self, bucket: &str, key: &str, contents: &str) -> FileRef {
        let path = self.store_root().join("s3").join(bucket).join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
        FileRef::remote(format!("s3://{}/{}", bucket, key))
    }

    pub fn uploaded(&self, name: &str) -> PathBuf {
        self.store_root().join("latch").join(name)
    }
}

pub fn pipeline(config: &PipelineConfig) -> Pipeline {
    let time_provider = Arc::new(SystemTimeProvider);
    let runner = Arc::new(SubprocessRunner::new(
        time_provider.clone(),
        config.env_allowlist.clone(),
    ));
    let store = Arc::new(LocalObjectStore::new(&config.store_root));
    let executor = StepExecutor::new(
        runner,
        store,
        RetryPolicy::new(config.retry_base_delay_ms),
        time_provider,
        Arc::new(SequentialIdProvider::new("step")),
    )
    .with_max_attempts(config.max_attempts)
    .with_timeout(config.step_timeout());

    Pipeline::new(config, executor, Arc::new(SequentialIdProvider::new("run")))
}

pub fn per_sample(mut config: PipelineConfig) -> PipelineConfig {
    config.sort_output_mode = SortOutputMode::PerSample;
    config
}
