// Pipeline steps: one external-tool invocation pattern each

pub mod align;
pub mod copy;
pub mod sort;

pub use align::AlignStep;
pub use copy::CopyStep;
pub use sort::SortStep;

use crate::domain::{CommandSpec, FileRef};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Type of value flowing through a step port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    Sample,
    SampleList,
    File,
    FileList,
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortKind::Sample => write!(f, "sample"),
            PortKind::SampleList => write!(f, "list[sample]"),
            PortKind::File => write!(f, "file"),
            PortKind::FileList => write!(f, "list[file]"),
        }
    }
}

impl std::fmt::Display for PortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub kind: PortKind,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Runner-neutral description of a step, used for registration and `describe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    /// Command line with `{port.field}` placeholders for input paths
    pub command: Vec<String>,
}

/// A pipeline step: name, inputs, outputs, and the commands that produce them.
///
/// Steps only build commands. Running them, checking exit status and
/// uploading outputs is the job of `StepExecutor`.
pub trait PipelineStep: Send + Sync {
    type Input: Send + Sync;

    fn name(&self) -> &'static str;

    /// Headline of the step-start message
    fn title(&self) -> String {
        format!("Running {}", self.name())
    }

    /// Detail line of the step-start message
    fn body(&self) -> String;

    fn definition(&self) -> StepDefinition;

    /// Commands for one invocation, in execution order.
    ///
    /// Input file references must already be staged to local paths.
    fn commands(&self, input: &Self::Input, work_dir: &Path) -> Result<Vec<CommandSpec>>;

    /// Files handed to the next stage, with the remote tags they upload to
    fn outputs(&self, input: &Self::Input, work_dir: &Path) -> Vec<FileRef>;
}

/// Local path of a staged input, or a validation error naming the port
pub(crate) fn staged_path<'a>(file: &'a FileRef, port: &str) -> Result<&'a Path> {
    file.local_path().ok_or_else(|| {
        AppError::Validation(format!("input '{}' has not been staged locally: {}", port, file))
    })
}
