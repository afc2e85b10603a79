// Sort step: SAM alignments -> coordinate-sorted BAM via samtools

use super::{staged_path, PipelineStep, PortKind, PortSpec, StepDefinition};
use crate::application::config::SortOutputMode;
use crate::application::constants::{remote_output, SORTED_FILE, SORT_STEP, SORT_STEP_TITLE};
use crate::domain::{CommandSpec, FileRef};
use crate::error::{AppError, Result};
use std::path::Path;
use tracing::warn;

pub struct SortStep {
    samtools: String,
    mode: SortOutputMode,
}

impl SortStep {
    pub fn new(samtools: impl Into<String>, mode: SortOutputMode) -> Self {
        Self {
            samtools: samtools.into(),
            mode,
        }
    }

    /// Output file name for the input at `index`
    fn file_name(&self, index: usize) -> String {
        match self.mode {
            SortOutputMode::Shared => SORTED_FILE.to_string(),
            SortOutputMode::PerSample => {
                let stem = SORTED_FILE.trim_end_matches(".bam");
                format!("{}.{}.bam", stem, index)
            }
        }
    }
}

impl PipelineStep for SortStep {
    type Input = Vec<FileRef>;

    fn name(&self) -> &'static str {
        SORT_STEP
    }

    fn title(&self) -> String {
        SORT_STEP_TITLE.to_string()
    }

    fn body(&self) -> String {
        match self.mode {
            SortOutputMode::Shared => format!("Sorting alignments into {}", SORTED_FILE),
            SortOutputMode::PerSample => "Sorting each alignment into its own BAM".to_string(),
        }
    }

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: SORT_STEP.to_string(),
            inputs: vec![PortSpec::new("sams", PortKind::FileList)],
            outputs: vec![PortSpec::new("bam", PortKind::File)],
            command: [
                self.samtools.as_str(),
                "sort",
                "-o",
                SORTED_FILE,
                "-O",
                "bam",
                "{sams[i]}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    /// One `samtools sort` per alignment.
    ///
    /// In `Shared` mode every command writes the same file, so only the last
    /// alignment's sorted output survives.
    fn commands(&self, sams: &Vec<FileRef>, work_dir: &Path) -> Result<Vec<CommandSpec>> {
        if sams.is_empty() {
            return Err(AppError::Validation("no alignments to sort".to_string()));
        }
        if self.mode == SortOutputMode::Shared && sams.len() > 1 {
            warn!(
                inputs = sams.len(),
                output = SORTED_FILE,
                "Sorting several alignments into one shared output; only the last one is kept"
            );
        }

        sams.iter()
            .enumerate()
            .map(|(index, sam)| {
                let input = staged_path(sam, "sams")?;
                let bam_path = work_dir.join(self.file_name(index));
                Ok(CommandSpec::new(self.samtools.as_str())
                    .args(["sort", "-o"])
                    .path_arg(&bam_path)
                    .args(["-O", "bam"])
                    .path_arg(input)
                    .output(bam_path))
            })
            .collect()
    }

    fn outputs(&self, sams: &Vec<FileRef>, work_dir: &Path) -> Vec<FileRef> {
        let count = match self.mode {
            SortOutputMode::Shared => sams.len().min(1),
            SortOutputMode::PerSample => sams.len(),
        };
        (0..count)
            .map(|index| {
                let name = self.file_name(index);
                FileRef::new(work_dir.join(&name), remote_output(&name))
            })
            .collect()
    }
}
