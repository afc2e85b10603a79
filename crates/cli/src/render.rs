//! Terminal rendering for run summaries and registry contents

use colored::Colorize;
use readflow_core::application::registry::WorkflowDefinition;
use readflow_core::application::{LaunchPlan, RunSummary, StepDefinition};
use readflow_core::domain::{FileRef, StepRun, StepState, WorkflowMetadata};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct StepRow {
    step: String,
    state: String,
    attempts: u32,
    exit_code: String,
    duration_ms: String,
    error: String,
}

impl From<&StepRun> for StepRow {
    fn from(run: &StepRun) -> Self {
        let state = match run.state {
            StepState::Done => run.state.to_string().green().to_string(),
            StepState::Failed => run.state.to_string().red().to_string(),
            _ => run.state.to_string().yellow().to_string(),
        };
        Self {
            step: run.label(),
            state,
            attempts: run.attempts,
            exit_code: optional(run.exit_code),
            duration_ms: optional(run.duration_ms()),
            error: run.error.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct OutputRow {
    kind: &'static str,
    path: String,
    remote: String,
}

impl OutputRow {
    fn new(kind: &'static str, file: &FileRef) -> Self {
        Self {
            kind,
            path: file
                .local_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            remote: file.remote.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct StepDefinitionRow {
    step: String,
    inputs: String,
    outputs: String,
    command: String,
}

impl From<&StepDefinition> for StepDefinitionRow {
    fn from(def: &StepDefinition) -> Self {
        Self {
            step: def.name.clone(),
            inputs: join(&def.inputs),
            outputs: join(&def.outputs),
            command: def.command.join(" "),
        }
    }
}

#[derive(Tabled)]
struct NodeRow {
    workflow: String,
    node: String,
    kind: String,
    target: String,
    after: String,
}

#[derive(Tabled)]
struct PlanRow {
    workflow: String,
    name: String,
    samples: usize,
    first_read1: String,
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run_summary(summary: &RunSummary, dry_run: bool) {
    if dry_run {
        println!("{}", format!("Dry run {}", summary.run_id).cyan().bold());
        println!();
        for command in &summary.commands {
            println!("  {}", command.display());
        }
        println!();
    } else {
        println!(
            "{}",
            format!("✓ Run {} finished", summary.run_id).green().bold()
        );
        println!("Work directory: {}", summary.work_dir.display());
        println!();
    }

    let steps: Vec<StepRow> = summary.steps.iter().map(StepRow::from).collect();
    println!("{}", Table::new(steps));

    let outputs: Vec<OutputRow> = summary
        .sorted
        .iter()
        .map(|f| OutputRow::new("sorted", f))
        .chain(summary.copies.iter().map(|f| OutputRow::new("copy", f)))
        .collect();
    if !outputs.is_empty() {
        println!();
        println!("{}", Table::new(outputs));
    }
}

pub fn metadata(metadata: &WorkflowMetadata) {
    println!("{}", metadata.display_name.cyan().bold());
    println!("{}", metadata.documentation);
    println!(
        "Author: {}{}",
        metadata.author.name,
        metadata
            .author
            .github
            .as_deref()
            .map(|g| format!(" ({})", g))
            .unwrap_or_default()
    );
    println!("Repository: {}", metadata.repository);
    println!("License: {}", metadata.license);
    if !metadata.tags.is_empty() {
        println!("Tags: {}", metadata.tags.join(", "));
    }
    for (name, param) in &metadata.parameters {
        println!(
            "  {} {} - {}{}",
            name.bold(),
            format!("[{}]", param.display_name).dimmed(),
            param.description,
            if param.batch_table_column {
                " (batch table column)"
            } else {
                ""
            }
        );
    }
}

pub fn steps<'a>(defs: impl Iterator<Item = &'a StepDefinition>) {
    let rows: Vec<StepDefinitionRow> = defs.map(StepDefinitionRow::from).collect();
    println!("{}", Table::new(rows));
}

pub fn workflows(workflows: &[&WorkflowDefinition]) {
    let rows: Vec<NodeRow> = workflows
        .iter()
        .flat_map(|wf| {
            wf.nodes.iter().map(move |node| NodeRow {
                workflow: wf.name.clone(),
                node: node.id.clone(),
                kind: format!("{:?}", node.kind),
                target: node.target.clone(),
                after: node.upstream.join(", "),
            })
        })
        .collect();
    println!("{}", Table::new(rows));
}

pub fn launch_plans(plans: &[LaunchPlan]) {
    if plans.is_empty() {
        println!("{}", "No launch plans registered".yellow());
        return;
    }
    let rows: Vec<PlanRow> = plans
        .iter()
        .map(|plan| PlanRow {
            workflow: plan.workflow.clone(),
            name: plan.name.clone(),
            samples: plan.inputs.samples.len(),
            first_read1: plan
                .inputs
                .samples
                .first()
                .map(|s| s.read1.to_string())
                .unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(rows));
}
