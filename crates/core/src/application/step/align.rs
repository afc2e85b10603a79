// Alignment step: paired reads -> SAM via the external aligner

use super::{staged_path, PipelineStep, PortKind, PortSpec, StepDefinition};
use crate::application::constants::{remote_output, ALIGNMENT_FILE, ALIGN_STEP};
use crate::domain::{CommandSpec, FileRef, Sample};
use crate::error::Result;
use std::path::Path;

pub struct AlignStep {
    aligner: String,
    reference_index: String,
}

impl AlignStep {
    pub fn new(aligner: impl Into<String>, reference_index: impl Into<String>) -> Self {
        Self {
            aligner: aligner.into(),
            reference_index: reference_index.into(),
        }
    }

    fn argv<'a>(&'a self, read1: &'a str, read2: &'a str, sam: &'a str) -> [&'a str; 11] {
        [
            &self.aligner,
            "--local",
            "-x",
            &self.reference_index,
            "-1",
            read1,
            "-2",
            read2,
            "--very-sensitive-local",
            "-S",
            sam,
        ]
    }
}

impl PipelineStep for AlignStep {
    type Input = Sample;

    fn name(&self) -> &'static str {
        ALIGN_STEP
    }

    fn body(&self) -> String {
        format!(
            "Aligning paired reads against '{}' into {}",
            self.reference_index, ALIGNMENT_FILE
        )
    }

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: ALIGN_STEP.to_string(),
            inputs: vec![PortSpec::new("sample", PortKind::Sample)],
            outputs: vec![PortSpec::new("sam", PortKind::File)],
            command: self
                .argv("{sample.read1}", "{sample.read2}", ALIGNMENT_FILE)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    fn commands(&self, sample: &Sample, work_dir: &Path) -> Result<Vec<CommandSpec>> {
        let read1 = staged_path(&sample.read1, "sample.read1")?.to_string_lossy();
        let read2 = staged_path(&sample.read2, "sample.read2")?.to_string_lossy();
        let sam_path = work_dir.join(ALIGNMENT_FILE);
        let sam = sam_path.to_string_lossy();

        let [program, args @ ..] = self.argv(&read1, &read2, &sam);
        Ok(vec![CommandSpec::new(program).args(args).output(&sam_path)])
    }

    fn outputs(&self, _sample: &Sample, work_dir: &Path) -> Vec<FileRef> {
        vec![FileRef::new(
            work_dir.join(ALIGNMENT_FILE),
            remote_output(ALIGNMENT_FILE),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged_sample() -> Sample {
        Sample::new(
            FileRef::new("/in/r1.fastq", "s3://latch-public/init/r1.fastq"),
            FileRef::local("/in/r2.fastq"),
        )
    }

    #[test]
    fn test_command_line() {
        let step = AlignStep::new("bowtie2/bowtie2", "wuhan");
        let commands = step.commands(&staged_sample(), Path::new("/work/0")).unwrap();

        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].argv(),
            vec![
                "bowtie2/bowtie2",
                "--local",
                "-x",
                "wuhan",
                "-1",
                "/in/r1.fastq",
                "-2",
                "/in/r2.fastq",
                "--very-sensitive-local",
                "-S",
                "/work/0/covid_assembly.sam",
            ]
        );
        assert_eq!(
            commands[0].outputs,
            vec![Path::new("/work/0/covid_assembly.sam").to_path_buf()]
        );
    }

    #[test]
    fn test_output_reference() {
        let step = AlignStep::new("bowtie2", "idx");
        let outputs = step.outputs(&staged_sample(), Path::new("/work/3"));
        assert_eq!(
            outputs,
            vec![FileRef::new(
                "/work/3/covid_assembly.sam",
                "latch:///covid_assembly.sam"
            )]
        );
    }

    #[test]
    fn test_unstaged_input_rejected() {
        let step = AlignStep::new("bowtie2", "idx");
        let sample = Sample::new(
            FileRef::remote("s3://b/r1.fq"),
            FileRef::local("/in/r2.fq"),
        );
        let err = step.commands(&sample, Path::new("/work")).unwrap_err();
        assert!(err.to_string().contains("sample.read1"));
    }

    #[test]
    fn test_definition_template() {
        let def = AlignStep::new("bowtie2/bowtie2", "wuhan").definition();
        assert_eq!(def.name, "assembly_task");
        assert_eq!(def.command[5], "{sample.read1}");
        assert_eq!(def.command.last().map(String::as_str), Some("covid_assembly.sam"));
    }

    #[test]
    fn test_start_message() {
        let step = AlignStep::new("bowtie2/bowtie2", "wuhan");
        assert_eq!(step.title(), "Running assembly_task");
        assert_eq!(
            step.body(),
            "Aligning paired reads against 'wuhan' into covid_assembly.sam"
        );
    }
}
