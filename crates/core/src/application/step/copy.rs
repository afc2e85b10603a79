// Copy step: keep a copy of each sample's first read file

use super::{staged_path, PipelineStep, PortKind, PortSpec, StepDefinition};
use crate::application::constants::{remote_output, COPY_STEP, READ1_COPY_FILE};
use crate::domain::{CommandSpec, FileRef, Sample};
use crate::error::Result;
use std::path::Path;

pub struct CopyStep {
    program: String,
}

impl CopyStep {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PipelineStep for CopyStep {
    type Input = Sample;

    fn name(&self) -> &'static str {
        COPY_STEP
    }

    fn body(&self) -> String {
        format!("Copying read1 to {}", READ1_COPY_FILE)
    }

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: COPY_STEP.to_string(),
            inputs: vec![PortSpec::new("sample", PortKind::Sample)],
            outputs: vec![PortSpec::new("read1_copy", PortKind::File)],
            command: vec![
                self.program.clone(),
                "{sample.read1}".to_string(),
                READ1_COPY_FILE.to_string(),
            ],
        }
    }

    fn commands(&self, sample: &Sample, work_dir: &Path) -> Result<Vec<CommandSpec>> {
        let read1 = staged_path(&sample.read1, "sample.read1")?;
        let copy_path = work_dir.join(READ1_COPY_FILE);
        Ok(vec![CommandSpec::new(self.program.as_str())
            .path_arg(read1)
            .path_arg(&copy_path)
            .output(copy_path)])
    }

    fn outputs(&self, _sample: &Sample, work_dir: &Path) -> Vec<FileRef> {
        vec![FileRef::new(
            work_dir.join(READ1_COPY_FILE),
            remote_output(READ1_COPY_FILE),
        )]
    }
}
