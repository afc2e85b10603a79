// Step Executor - runs one step invocation through the ports

use crate::application::constants::STDERR_TAIL_LINES;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::application::shutdown::ShutdownToken;
use crate::application::step::PipelineStep;
use crate::domain::{CommandSpec, FileRef, StepRun};
use crate::error::{AppError, Result};
use crate::port::{CommandRunner, FileStore, IdProvider, TimeProvider};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

/// Ordered record of every step run in a pipeline run
#[derive(Clone, Default)]
pub struct StepJournal {
    runs: Arc<Mutex<Vec<StepRun>>>,
}

impl StepJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, run: StepRun) {
        self.runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(run);
    }

    /// Runs in creation order, ties broken by step name and map index
    pub fn snapshot(&self) -> Vec<StepRun> {
        let mut runs = self
            .runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        runs.sort_by(|a, b| (a.created_at, &a.step, a.index).cmp(&(b.created_at, &b.step, b.index)));
        runs
    }
}

/// Successful step invocation
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub run: StepRun,
    pub outputs: Vec<FileRef>,
    pub commands: Vec<CommandSpec>,
}

/// Executes steps: runs their commands, checks exit status and outputs,
/// uploads outputs, and retries failed attempts.
pub struct StepExecutor {
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn FileStore>,
    retry_policy: RetryPolicy,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    max_attempts: u32,
    timeout: Option<Duration>,
    dry_run: bool,
}

impl StepExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn FileStore>,
        retry_policy: RetryPolicy,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            runner,
            store,
            retry_policy,
            time_provider,
            id_provider,
            max_attempts: 1,
            timeout: None,
            dry_run: false,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Default timeout for commands that do not set their own
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build and log commands without running them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    /// Execute one invocation of `step` in `work_dir`.
    ///
    /// The resulting `StepRun` is recorded in `journal` whatever the outcome.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute<S: PipelineStep>(
        &self,
        step: &S,
        input: &S::Input,
        run_id: &str,
        index: Option<usize>,
        work_dir: &Path,
        journal: &StepJournal,
        shutdown: &ShutdownToken,
    ) -> Result<StepOutcome> {
        let mut run = StepRun::new(
            self.id_provider.generate_id(),
            run_id,
            self.time_provider.now_millis(),
            step.name(),
            index,
        )
        .with_max_attempts(self.max_attempts);

        match self.execute_run(step, input, work_dir, &mut run, shutdown).await {
            Ok((outputs, commands)) => {
                journal.record(run.clone());
                Ok(StepOutcome {
                    run,
                    outputs,
                    commands,
                })
            }
            Err(e) => {
                let now = self.time_provider.now_millis();
                if !run.state.is_terminal() {
                    // The attempt loop marks exhausted retries as failed itself
                    let marked = match &e {
                        AppError::Cancelled => run.cancel(now),
                        other => run.fail(now, other.to_string()),
                    };
                    if let Err(transition) = marked {
                        warn!(step = %run.label(), error = %transition, "Could not mark step run");
                    }
                }
                journal.record(run);
                Err(e)
            }
        }
    }

    async fn execute_run<S: PipelineStep>(
        &self,
        step: &S,
        input: &S::Input,
        work_dir: &Path,
        run: &mut StepRun,
        shutdown: &ShutdownToken,
    ) -> Result<(Vec<FileRef>, Vec<CommandSpec>)> {
        let commands: Vec<CommandSpec> = step
            .commands(input, work_dir)?
            .into_iter()
            .map(|spec| {
                let timeout = spec.timeout.or(self.timeout);
                spec.timeout(timeout)
            })
            .collect();
        let outputs = step.outputs(input, work_dir);

        info!(
            title = %step.title(),
            body = %step.body(),
            run_id = %run.run_id,
            step = %run.label(),
            commands = commands.len(),
            "Step started"
        );

        if self.dry_run {
            for spec in &commands {
                info!(step = %run.label(), command = %spec.display(), "Dry run: not executed");
            }
            run.start(self.time_provider.now_millis())?;
            run.complete(self.time_provider.now_millis())?;
            return Ok((outputs, commands));
        }

        tokio::fs::create_dir_all(work_dir).await?;

        loop {
            if shutdown.is_shutdown() {
                return Err(AppError::Cancelled);
            }
            run.start(self.time_provider.now_millis())?;

            let attempt = self.run_attempt(&commands, run, shutdown).await;
            let failure = match attempt {
                Ok(()) => break,
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => e.to_string(),
            };

            match self.retry_policy.should_retry(run) {
                RetryDecision::Retry(delay_ms) => {
                    warn!(
                        step = %run.label(),
                        attempt = run.attempts,
                        delay_ms,
                        error = %failure,
                        "Step attempt failed, retrying"
                    );
                    run.requeue(failure)?;
                    let mut shutdown = shutdown.clone();
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(delay_ms as u64)) => {}
                        _ = shutdown.wait() => return Err(AppError::Cancelled),
                    }
                }
                RetryDecision::Failed => {
                    error!(step = %run.label(), attempts = run.attempts, error = %failure, "Step failed");
                    run.fail(self.time_provider.now_millis(), failure.clone())?;
                    return Err(AppError::StepFailed {
                        step: run.label(),
                        message: failure,
                    });
                }
            }
        }

        for output in &outputs {
            if let (Some(local), Some(remote)) = (output.local_path(), output.remote.as_deref()) {
                self.store.stage_out(local, remote).await?;
            }
        }

        run.complete(self.time_provider.now_millis())?;
        info!(
            run_id = %run.run_id,
            step = %run.label(),
            duration_ms = ?run.duration_ms(),
            attempts = run.attempts,
            "Step completed"
        );
        Ok((outputs, commands))
    }

    /// Run every command once, in order; any nonzero exit or missing output fails the attempt
    async fn run_attempt(
        &self,
        commands: &[CommandSpec],
        run: &mut StepRun,
        shutdown: &ShutdownToken,
    ) -> Result<()> {
        for spec in commands {
            let mut shutdown = shutdown.clone();
            let output = tokio::select! {
                result = self.runner.run(spec) => result?,
                _ = shutdown.wait() => return Err(AppError::Cancelled),
            };
            run.exit_code = output.exit_code;

            if !output.success() {
                return Err(AppError::Internal(format!(
                    "'{}' exited with {}: {}",
                    spec.program,
                    output.exit_code.unwrap_or(-1),
                    output.stderr_tail(STDERR_TAIL_LINES)
                )));
            }

            for path in &spec.outputs {
                if !tokio::fs::try_exists(path).await? {
                    return Err(AppError::Internal(format!(
                        "'{}' exited successfully but did not produce {}",
                        spec.program,
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::shutdown::shutdown_channel;
    use crate::application::step::CopyStep;
    use crate::domain::{Sample, StepState};
    use crate::port::command_runner::mocks::{MockBehavior, MockCommandRunner};
    use crate::port::file_store::mocks::PassthroughStore;
    use crate::port::id_provider::SequentialIdProvider;
    use crate::port::time_provider::mocks::SteppingTimeProvider;

    fn executor(runner: MockCommandRunner, store: PassthroughStore) -> StepExecutor {
        StepExecutor::new(
            Arc::new(runner),
            Arc::new(store),
            RetryPolicy::new(1),
            Arc::new(SteppingTimeProvider::new(1000, 10)),
            Arc::new(SequentialIdProvider::new("step")),
        )
    }

    fn sample() -> Sample {
        Sample::new(FileRef::local("/in/r1.fq"), FileRef::local("/in/r2.fq"))
    }

    #[tokio::test]
    async fn test_success_uploads_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let store = PassthroughStore::new();
        let executor = executor(MockCommandRunner::new_success(), store.clone());
        let journal = StepJournal::new();

        let outcome = executor
            .execute(
                &CopyStep::new("cp"),
                &sample(),
                "run-1",
                Some(0),
                dir.path(),
                &journal,
                &ShutdownToken::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.run.state, StepState::Done);
        assert_eq!(outcome.run.exit_code, Some(0));
        assert_eq!(
            store.uploads(),
            vec![(dir.path().join("read1_copy.fastq"), "latch:///read1_copy.fastq".to_string())]
        );
        assert_eq!(journal.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_step() {
        let dir = tempfile::tempdir().unwrap();
        let store = PassthroughStore::new();
        let executor = executor(MockCommandRunner::new(MockBehavior::ExitCode(3)), store.clone());
        let journal = StepJournal::new();

        let err = executor
            .execute(
                &CopyStep::new("cp"),
                &sample(),
                "run-1",
                Some(0),
                dir.path(),
                &journal,
                &ShutdownToken::never(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::StepFailed { .. }));
        assert!(err.to_string().contains("exited with 3"));
        assert!(store.uploads().is_empty());

        let runs = journal.snapshot();
        assert_eq!(runs[0].state, StepState::Failed);
        assert_eq!(runs[0].exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_missing_output_fails_step() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(
            MockCommandRunner::new(MockBehavior::SilentSuccess),
            PassthroughStore::new(),
        );

        let err = executor
            .execute(
                &CopyStep::new("cp"),
                &sample(),
                "run-1",
                None,
                dir.path(),
                &StepJournal::new(),
                &ShutdownToken::never(),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("did not produce"));
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockCommandRunner::new_success()
            .with_program("cp", vec![MockBehavior::ExitCode(1), MockBehavior::Success]);
        let executor = executor(runner.clone(), PassthroughStore::new()).with_max_attempts(2);

        let outcome = executor
            .execute(
                &CopyStep::new("cp"),
                &sample(),
                "run-1",
                Some(0),
                dir.path(),
                &StepJournal::new(),
                &ShutdownToken::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.run.attempts, 2);
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockCommandRunner::new_success();
        let executor = executor(runner.clone(), PassthroughStore::new());
        let (tx, token) = shutdown_channel();
        tx.shutdown();
        let journal = StepJournal::new();

        let err = executor
            .execute(&CopyStep::new("cp"), &sample(), "run-1", Some(0), dir.path(), &journal, &token)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(runner.call_count(), 0);
        assert_eq!(journal.snapshot()[0].state, StepState::Cancelled);
    }

    #[tokio::test]
    async fn test_dry_run_skips_runner() {
        let runner = MockCommandRunner::new_success();
        let store = PassthroughStore::new();
        let executor = executor(runner.clone(), store.clone()).with_dry_run(true);

        let outcome = executor
            .execute(
                &CopyStep::new("cp"),
                &sample(),
                "run-1",
                Some(0),
                Path::new("/nonexistent/work"),
                &StepJournal::new(),
                &ShutdownToken::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.commands.len(), 1);
        assert_eq!(runner.call_count(), 0);
        assert!(store.uploads().is_empty());
    }
}
