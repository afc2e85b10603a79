// Pipeline - fan-out/fan-in over the three steps
//
// assemble_and_sort(samples)
//   ├── process_reads(samples): map assembly_task -> sort_bam_task
//   └── map copy_read1
//
// Every invocation gets its own working directory under <work_root>/<run_id>/

use crate::application::config::PipelineConfig;
use crate::application::constants::SORT_STEP;
use crate::application::executor::{StepExecutor, StepJournal, StepOutcome};
use crate::application::shutdown::ShutdownToken;
use crate::application::step::{AlignStep, CopyStep, PipelineStep, SortStep};
use crate::domain::{CommandSpec, FileRef, RunId, Sample, StepRun};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, StagingError};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub work_dir: PathBuf,
    /// Sorted BAM output(s); exactly one in shared sort mode
    pub sorted: Vec<FileRef>,
    /// One read1 copy per sample; empty for `process_reads`
    pub copies: Vec<FileRef>,
    pub steps: Vec<StepRun>,
    /// Every command built, in step order
    pub commands: Vec<CommandSpec>,
}

/// Per-run state shared by every step invocation
struct RunContext {
    run_id: RunId,
    work_dir: PathBuf,
    journal: StepJournal,
}

impl RunContext {
    fn step_dir(&self, step: &str, index: Option<usize>) -> PathBuf {
        let dir = self.work_dir.join(step);
        match index {
            Some(i) => dir.join(i.to_string()),
            None => dir,
        }
    }
}

/// Outputs and commands of a group of step invocations
#[derive(Default)]
struct StageResult {
    outputs: Vec<FileRef>,
    commands: Vec<CommandSpec>,
}

impl StageResult {
    fn absorb(&mut self, outcome: StepOutcome) {
        self.outputs.extend(outcome.outputs);
        self.commands.extend(outcome.commands);
    }
}

pub struct Pipeline {
    executor: Arc<StepExecutor>,
    id_provider: Arc<dyn IdProvider>,
    align: AlignStep,
    sort: SortStep,
    copy: CopyStep,
    work_root: PathBuf,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        executor: StepExecutor,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            executor: Arc::new(executor),
            id_provider,
            align: AlignStep::new(&config.aligner, &config.reference_index),
            sort: SortStep::new(&config.samtools, config.sort_output_mode),
            copy: CopyStep::new(&config.copy_program),
            work_root: config.work_dir.clone(),
            concurrency: config.concurrency.max(1),
        }
    }

    /// Align every sample, then sort all alignments
    pub async fn process_reads(
        &self,
        samples: &[Sample],
        shutdown: &ShutdownToken,
    ) -> Result<RunSummary> {
        let ctx = self.start_run(samples).await?;
        let span = info_span!("process_reads", run_id = %ctx.run_id);

        async {
            let staged = self.stage_samples(&ctx, samples).await?;
            let processed = self.run_process_reads(&ctx, &staged, shutdown).await?;
            Ok::<_, AppError>(self.finish(ctx, processed, StageResult::default()))
        }
        .instrument(span)
        .await
    }

    /// `process_reads` alongside a copy of every sample's read1
    pub async fn assemble_and_sort(
        &self,
        samples: &[Sample],
        shutdown: &ShutdownToken,
    ) -> Result<RunSummary> {
        let ctx = self.start_run(samples).await?;
        let span = info_span!("assemble_and_sort", run_id = %ctx.run_id);

        async {
            let staged = self.stage_samples(&ctx, samples).await?;
            let (processed, copied) = tokio::try_join!(
                self.run_process_reads(&ctx, &staged, shutdown),
                self.run_map(&self.copy, &ctx, &staged, shutdown),
            )?;
            Ok::<_, AppError>(self.finish(ctx, processed, copied))
        }
        .instrument(span)
        .await
    }

    async fn start_run(&self, samples: &[Sample]) -> Result<RunContext> {
        if samples.is_empty() {
            return Err(AppError::Validation("at least one sample is required".to_string()));
        }
        for (index, sample) in samples.iter().enumerate() {
            sample
                .validate()
                .map_err(|e| AppError::Validation(format!("sample {}: {}", index, e)))?;
        }

        let run_id = self.id_provider.generate_id();
        let work_dir = self.work_root.join(&run_id);
        if !self.executor.is_dry_run() {
            tokio::fs::create_dir_all(&work_dir).await?;
        }

        info!(
            run_id = %run_id,
            samples = samples.len(),
            work_dir = %work_dir.display(),
            dry_run = self.executor.is_dry_run(),
            "Pipeline run started"
        );

        Ok(RunContext {
            run_id,
            work_dir,
            journal: StepJournal::new(),
        })
    }

    /// Bring the reads of every sample into `<run>/inputs/<i>/read1/` and `.../read2/`
    ///
    /// Each read gets its own directory: two keys may share a file name.
    async fn stage_samples(&self, ctx: &RunContext, samples: &[Sample]) -> Result<Vec<Sample>> {
        let mut staged = Vec::with_capacity(samples.len());
        for (index, sample) in samples.iter().enumerate() {
            let dest = ctx.work_dir.join("inputs").join(index.to_string());
            let read1 = self.stage_file(&sample.read1, &dest.join("read1")).await?;
            let read2 = self.stage_file(&sample.read2, &dest.join("read2")).await?;
            staged.push(Sample::new(read1, read2));
        }
        Ok(staged)
    }

    async fn stage_file(&self, file: &FileRef, dest: &Path) -> Result<FileRef> {
        let local = if self.executor.is_dry_run() {
            match file.local_path() {
                Some(path) => path.to_path_buf(),
                None => {
                    let name = file
                        .file_name()
                        .ok_or_else(|| StagingError::InvalidReference(file.to_string()))?;
                    dest.join(name)
                }
            }
        } else {
            tokio::fs::create_dir_all(dest).await?;
            self.executor.store().stage_in(file, dest).await?
        };

        Ok(FileRef {
            local_path: Some(local),
            remote: file.remote.clone(),
        })
    }

    async fn run_process_reads(
        &self,
        ctx: &RunContext,
        staged: &[Sample],
        shutdown: &ShutdownToken,
    ) -> Result<StageResult> {
        let aligned = self.run_map(&self.align, ctx, staged, shutdown).await?;

        let sort_dir = ctx.step_dir(SORT_STEP, None);
        let sorted = self
            .executor
            .execute(
                &self.sort,
                &aligned.outputs,
                &ctx.run_id,
                None,
                &sort_dir,
                &ctx.journal,
                shutdown,
            )
            .await?;

        let mut result = StageResult {
            outputs: Vec::new(),
            commands: aligned.commands,
        };
        result.absorb(sorted);
        Ok(result)
    }

    /// Run `step` once per sample, at most `concurrency` at a time, keeping input order.
    ///
    /// The first failure drops the invocations still in flight.
    async fn run_map<S>(
        &self,
        step: &S,
        ctx: &RunContext,
        staged: &[Sample],
        shutdown: &ShutdownToken,
    ) -> Result<StageResult>
    where
        S: PipelineStep<Input = Sample>,
    {
        info!(
            step = step.name(),
            instances = staged.len(),
            concurrency = self.concurrency,
            "Mapping step over samples"
        );

        let outcomes: Vec<StepOutcome> = stream::iter(staged.iter().enumerate())
            .map(|(index, sample)| {
                let dir = ctx.step_dir(step.name(), Some(index));
                async move {
                    self.executor
                        .execute(
                            step,
                            sample,
                            &ctx.run_id,
                            Some(index),
                            &dir,
                            &ctx.journal,
                            shutdown,
                        )
                        .await
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut result = StageResult::default();
        for outcome in outcomes {
            result.absorb(outcome);
        }
        Ok(result)
    }

    fn finish(&self, ctx: RunContext, processed: StageResult, copied: StageResult) -> RunSummary {
        let mut commands = processed.commands;
        commands.extend(copied.commands);

        let summary = RunSummary {
            run_id: ctx.run_id,
            work_dir: ctx.work_dir,
            sorted: processed.outputs,
            copies: copied.outputs,
            steps: ctx.journal.snapshot(),
            commands,
        };

        info!(
            run_id = %summary.run_id,
            sorted = summary.sorted.len(),
            copies = summary.copies.len(),
            steps = summary.steps.len(),
            "Pipeline run finished"
        );
        summary
    }
}
