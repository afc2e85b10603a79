// Pipeline configuration (plain data; loading lives in the CLI)

use crate::application::constants::*;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where the sort step writes when it gets more than one alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOutputMode {
    /// Every input sorts into the same `covid_sorted.bam`; the last one wins
    #[default]
    Shared,
    /// One `covid_sorted.<i>.bam` per input
    PerSample,
}

impl std::str::FromStr for SortOutputMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shared" => Ok(SortOutputMode::Shared),
            "per_sample" | "per-sample" => Ok(SortOutputMode::PerSample),
            other => Err(AppError::Config(format!(
                "unknown sort output mode '{}' (expected shared or per_sample)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root for per-run working directories
    pub work_dir: PathBuf,
    /// Root of the local object-store namespace
    pub store_root: PathBuf,

    pub aligner: String,
    pub reference_index: String,
    pub samtools: String,
    pub copy_program: String,

    pub sort_output_mode: SortOutputMode,
    /// Map instances running at once
    pub concurrency: usize,

    pub max_attempts: u32,
    pub retry_base_delay_ms: i64,
    /// Per-command timeout; 0 disables it
    pub step_timeout_secs: u64,

    /// Environment variables passed through to external tools
    pub env_allowlist: Vec<String>,
    /// Directory for per-run log files
    pub log_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("readflow-work"),
            store_root: PathBuf::from("readflow-store"),
            aligner: DEFAULT_ALIGNER.to_string(),
            reference_index: DEFAULT_REFERENCE_INDEX.to_string(),
            samtools: DEFAULT_SAMTOOLS.to_string(),
            copy_program: DEFAULT_COPY_PROGRAM.to_string(),
            sort_output_mode: SortOutputMode::Shared,
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: 1,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            step_timeout_secs: 0,
            env_allowlist: vec!["PATH".to_string(), "HOME".to_string(), "TMPDIR".to_string()],
            log_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(AppError::Config("concurrency must be at least 1".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(AppError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.retry_base_delay_ms < 0 {
            return Err(AppError::Config(
                "retry_base_delay_ms must not be negative".to_string(),
            ));
        }
        for (key, value) in [
            ("aligner", &self.aligner),
            ("reference_index", &self.reference_index),
            ("samtools", &self.samtools),
            ("copy_program", &self.copy_program),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }
}
