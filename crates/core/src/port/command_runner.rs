// Command Runner Port
// Abstraction for executing external programs (aligner, sorter, copy utility)

use crate::domain::CommandSpec;
use async_trait::async_trait;
use thiserror::Error;

/// Result of one command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExecutionStatus,
    pub duration_ms: i64,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Last `lines` lines of stderr, for error messages
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    /// Process ran and exited nonzero
    Failed,
}

/// Execution errors (the process could not be run to completion)
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed for '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Process timeout after {0}ms")]
    Timeout(i64),

    #[error("Process killed: {0}")]
    Killed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Command Runner trait
///
/// Implementations:
/// - SubprocessRunner: spawns the external process
/// - mocks::MockCommandRunner: records invocations for tests
///
/// A nonzero exit is reported through `CommandOutput::status`, not as an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the program cannot be started
    /// - ExecutionError::Timeout if execution exceeds `CommandSpec::timeout`
    /// - ExecutionError::Killed if the process was ended by a signal
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock runner behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit 0 and create every declared output file
        Success,
        /// Exit with the given code without creating outputs
        ExitCode(i32),
        /// Exit 0 but leave declared outputs missing
        SilentSuccess,
        /// Fail to spawn
        SpawnFail(String),
        /// Timeout after N ms
        Timeout(i64),
    }

    /// Mock Command Runner that records every invocation
    #[derive(Clone)]
    pub struct MockCommandRunner {
        default_behavior: MockBehavior,
        /// Per-program overrides, matched on `CommandSpec::program`
        overrides: Arc<Mutex<Vec<(String, Vec<MockBehavior>)>>>,
        calls: Arc<Mutex<Vec<CommandSpec>>>,
    }

    impl MockCommandRunner {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                default_behavior: behavior,
                overrides: Arc::new(Mutex::new(Vec::new())),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        /// Queue behaviors for one program; consumed in order, the last one sticks
        pub fn with_program(self, program: impl Into<String>, behaviors: Vec<MockBehavior>) -> Self {
            self.overrides.lock().unwrap().push((program.into(), behaviors));
            self
        }

        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }

        pub fn calls_for(&self, program: &str) -> Vec<CommandSpec> {
            self.calls()
                .into_iter()
                .filter(|c| c.program == program)
                .collect()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn behavior_for(&self, program: &str) -> MockBehavior {
            let mut overrides = self.overrides.lock().unwrap();
            match overrides.iter_mut().find(|(p, _)| p == program) {
                Some((_, queue)) if queue.len() > 1 => queue.remove(0),
                Some((_, queue)) if queue.len() == 1 => queue[0].clone(),
                _ => self.default_behavior.clone(),
            }
        }
    }

    fn output(exit_code: i32) -> CommandOutput {
        CommandOutput {
            status: if exit_code == 0 {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Failed
            },
            duration_ms: 10,
            exit_code: Some(exit_code),
            stdout: "mock output".to_string(),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                format!("mock failure (exit {})", exit_code)
            },
        }
    }

    #[async_trait]
    impl CommandRunner for MockCommandRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
            self.calls.lock().unwrap().push(spec.clone());

            match self.behavior_for(&spec.program) {
                MockBehavior::Success => {
                    for path in &spec.outputs {
                        if let Some(parent) = path.parent() {
                            tokio::fs::create_dir_all(parent)
                                .await
                                .map_err(|e| ExecutionError::IoError(e.to_string()))?;
                        }
                        tokio::fs::write(path, spec.display())
                            .await
                            .map_err(|e| ExecutionError::IoError(e.to_string()))?;
                    }
                    Ok(output(0))
                }
                MockBehavior::SilentSuccess => Ok(output(0)),
                MockBehavior::ExitCode(code) => Ok(output(code)),
                MockBehavior::SpawnFail(reason) => Err(ExecutionError::SpawnFailed {
                    program: spec.program.clone(),
                    reason,
                }),
                MockBehavior::Timeout(ms) => Err(ExecutionError::Timeout(ms)),
            }
        }
    }
}
