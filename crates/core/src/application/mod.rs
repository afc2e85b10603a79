// Application Layer - Steps, execution and registration

pub mod config;
pub mod constants;
pub mod executor;
pub mod launch_plan;
pub mod pipeline;
pub mod registry;
pub mod retry;
pub mod shutdown;
pub mod step;

// Re-exports
pub use config::{PipelineConfig, SortOutputMode};
pub use executor::{StepExecutor, StepJournal, StepOutcome};
pub use launch_plan::{LaunchPlan, WorkflowInputs};
pub use pipeline::{Pipeline, RunSummary};
pub use registry::{default_registry, RegistryManifest, WorkflowRegistry};
pub use retry::RetryPolicy;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use step::{PipelineStep, StepDefinition};
