// Port Layer - Interfaces for external dependencies

pub mod command_runner;
pub mod file_store;
pub mod id_provider; // For deterministic testing
pub mod time_provider;

// Re-exports
pub use command_runner::{CommandOutput, CommandRunner, ExecutionError, ExecutionStatus};
pub use file_store::{FileStore, StagingError};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
