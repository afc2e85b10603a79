// Domain Layer - Pure data types and state transitions

pub mod command;
pub mod error;
pub mod file_ref;
pub mod metadata;
pub mod sample;
pub mod step_run;

// Re-exports
pub use command::CommandSpec;
pub use error::DomainError;
pub use file_ref::{uri_scheme, FileRef};
pub use metadata::{Author, ParameterMetadata, WorkflowMetadata};
pub use sample::{parse_samples, Sample};
pub use step_run::{RunId, StepRun, StepRunId, StepState};
