// Step Run Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Step run ID (UUID v4)
pub type StepRunId = String;

/// Pipeline run ID (UUID v4)
pub type RunId = String;

/// Lifecycle of one step invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Queued,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Done | StepState::Failed | StepState::Cancelled)
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepState::Queued => write!(f, "QUEUED"),
            StepState::Running => write!(f, "RUNNING"),
            StepState::Done => write!(f, "DONE"),
            StepState::Failed => write!(f, "FAILED"),
            StepState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Record of one step invocation (one map instance, or a single task)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRun {
    pub id: StepRunId,
    pub run_id: RunId,
    pub step: String,
    /// Position in the mapped input list; `None` for non-mapped steps
    pub index: Option<usize>,
    pub state: StepState,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    pub attempts: u32,
    pub max_attempts: u32,
    pub backoff_factor: f64,

    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl StepRun {
    /// Create a queued step run
    ///
    /// # Arguments
    ///
    /// * `id` - Unique step run ID (injected, not generated)
    /// * `run_id` - Pipeline run this invocation belongs to
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `step` - Step name
    /// * `index` - Map index, if the step is mapped over a list
    pub fn new(
        id: impl Into<String>,
        run_id: impl Into<String>,
        created_at: i64,
        step: impl Into<String>,
        index: Option<usize>,
    ) -> Self {
        Self {
            id: id.into(),
            run_id: run_id.into(),
            step: step.into(),
            index,
            state: StepState::Queued,
            created_at,
            started_at: None,
            finished_at: None,
            attempts: 0,
            max_attempts: 1,
            backoff_factor: 2.0,
            exit_code: None,
            error: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Label used in logs and tables, e.g. `assembly_task[2]`
    pub fn label(&self) -> String {
        match self.index {
            Some(i) => format!("{}[{}]", self.step, i),
            None => self.step.clone(),
        }
    }

    /// QUEUED -> RUNNING, counting the attempt
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != StepState::Queued {
            return Err(self.invalid_transition(StepState::Running));
        }
        self.state = StepState::Running;
        self.started_at = Some(now_millis);
        self.attempts += 1;
        Ok(())
    }

    /// RUNNING -> DONE
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        if self.state != StepState::Running {
            return Err(self.invalid_transition(StepState::Done));
        }
        self.state = StepState::Done;
        self.finished_at = Some(now_millis);
        self.error = None;
        Ok(())
    }

    /// RUNNING -> QUEUED after a failed attempt that will be retried
    pub fn requeue(&mut self, error: impl Into<String>) -> Result<()> {
        if self.state != StepState::Running {
            return Err(self.invalid_transition(StepState::Queued));
        }
        self.state = StepState::Queued;
        self.started_at = None;
        self.error = Some(error.into());
        Ok(())
    }

    /// Mark as failed (from any non-terminal state)
    pub fn fail(&mut self, now_millis: i64, error: impl Into<String>) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.invalid_transition(StepState::Failed));
        }
        self.state = StepState::Failed;
        self.finished_at = Some(now_millis);
        self.error = Some(error.into());
        Ok(())
    }

    /// Mark as cancelled (from any non-terminal state)
    pub fn cancel(&mut self, now_millis: i64) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.invalid_transition(StepState::Cancelled));
        }
        self.state = StepState::Cancelled;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    pub fn duration_ms(&self) -> Option<i64> {
        Some(self.finished_at? - self.started_at?)
    }

    fn invalid_transition(&self, to: StepState) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}
