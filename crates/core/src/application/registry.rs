// Workflow Registry - runner-neutral registration of steps, workflows and launch plans

use crate::application::config::PipelineConfig;
use crate::application::constants::*;
use crate::application::launch_plan::LaunchPlan;
use crate::application::step::{
    AlignStep, CopyStep, PipelineStep, PortKind, PortSpec, SortStep, StepDefinition,
};
use crate::domain::WorkflowMetadata;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a workflow node invokes its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// One invocation of a step
    Task,
    /// One invocation of a step per element of a list input
    MapTask,
    /// A registered workflow used as a node
    Subworkflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    pub kind: NodeKind,
    /// Step or workflow name
    pub target: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream: Vec<String>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            target: target.into(),
            upstream: Vec::new(),
        }
    }

    pub fn after(mut self, node: impl Into<String>) -> Self {
        self.upstream.push(node.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WorkflowMetadata>,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub nodes: Vec<WorkflowNode>,
}

/// Serializable snapshot of everything registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryManifest {
    pub version: String,
    pub steps: Vec<StepDefinition>,
    pub workflows: Vec<WorkflowDefinition>,
    pub launch_plans: Vec<LaunchPlan>,
}

impl RegistryManifest {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    steps: BTreeMap<String, StepDefinition>,
    workflows: BTreeMap<String, WorkflowDefinition>,
    launch_plans: Vec<LaunchPlan>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_step(&mut self, definition: StepDefinition) -> Result<()> {
        if self.steps.contains_key(&definition.name) {
            return Err(AppError::Validation(format!(
                "step '{}' is already registered",
                definition.name
            )));
        }
        self.steps.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Register a workflow whose nodes reference registered steps or workflows
    pub fn register_workflow(&mut self, workflow: WorkflowDefinition) -> Result<()> {
        if self.workflows.contains_key(&workflow.name) {
            return Err(AppError::Validation(format!(
                "workflow '{}' is already registered",
                workflow.name
            )));
        }

        let mut seen: Vec<&str> = Vec::new();
        for node in &workflow.nodes {
            let target_known = match node.kind {
                NodeKind::Task | NodeKind::MapTask => self.steps.contains_key(&node.target),
                NodeKind::Subworkflow => self.workflows.contains_key(&node.target),
            };
            if !target_known {
                return Err(AppError::NotFound(format!(
                    "node '{}' in workflow '{}' targets unknown {:?} '{}'",
                    node.id, workflow.name, node.kind, node.target
                )));
            }
            // Nodes are listed in dependency order, so upstream must already be seen
            if let Some(missing) = node.upstream.iter().find(|u| !seen.contains(&u.as_str())) {
                return Err(AppError::Validation(format!(
                    "node '{}' depends on '{}', which is not declared before it",
                    node.id, missing
                )));
            }
            seen.push(&node.id);
        }

        self.workflows.insert(workflow.name.clone(), workflow);
        Ok(())
    }

    pub fn register_launch_plan(&mut self, plan: LaunchPlan) -> Result<()> {
        if !self.workflows.contains_key(&plan.workflow) {
            return Err(AppError::NotFound(format!("workflow '{}'", plan.workflow)));
        }
        if self
            .launch_plans
            .iter()
            .any(|p| p.workflow == plan.workflow && p.name == plan.name)
        {
            return Err(AppError::Validation(format!(
                "launch plan '{}' is already registered for '{}'",
                plan.name, plan.workflow
            )));
        }
        for (index, sample) in plan.inputs.samples.iter().enumerate() {
            sample
                .validate()
                .map_err(|e| AppError::Validation(format!("launch plan sample {}: {}", index, e)))?;
        }
        self.launch_plans.push(plan);
        Ok(())
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepDefinition> {
        self.steps.values()
    }

    pub fn workflow(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.workflows.get(name)
    }

    pub fn launch_plans(&self) -> &[LaunchPlan] {
        &self.launch_plans
    }

    pub fn launch_plan(&self, name: &str) -> Result<&LaunchPlan> {
        self.launch_plans
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| AppError::NotFound(format!("launch plan '{}'", name)))
    }

    pub fn manifest(&self) -> RegistryManifest {
        RegistryManifest {
            version: crate::VERSION.to_string(),
            steps: self.steps.values().cloned().collect(),
            workflows: self.workflows.values().cloned().collect(),
            launch_plans: self.launch_plans.clone(),
        }
    }
}

/// Registry with the three steps, both workflows and the "Test Data" launch plan
pub fn default_registry(config: &PipelineConfig) -> Result<WorkflowRegistry> {
    let mut registry = WorkflowRegistry::new();

    registry.register_step(AlignStep::new(&config.aligner, &config.reference_index).definition())?;
    registry.register_step(SortStep::new(&config.samtools, config.sort_output_mode).definition())?;
    registry.register_step(CopyStep::new(&config.copy_program).definition())?;

    let samples_in = || vec![PortSpec::new("samples", PortKind::SampleList)];

    registry.register_workflow(WorkflowDefinition {
        name: PROCESS_READS_WORKFLOW.to_string(),
        metadata: None,
        inputs: samples_in(),
        outputs: vec![PortSpec::new("bam", PortKind::File)],
        nodes: vec![
            WorkflowNode::new("align", NodeKind::MapTask, ALIGN_STEP),
            WorkflowNode::new("sort", NodeKind::Task, SORT_STEP).after("align"),
        ],
    })?;

    registry.register_workflow(WorkflowDefinition {
        name: ASSEMBLE_AND_SORT_WORKFLOW.to_string(),
        metadata: Some(WorkflowMetadata::assemble_and_sort()),
        inputs: samples_in(),
        outputs: vec![
            PortSpec::new("processed", PortKind::File),
            PortSpec::new("copied", PortKind::FileList),
        ],
        nodes: vec![
            WorkflowNode::new("processed", NodeKind::Subworkflow, PROCESS_READS_WORKFLOW),
            WorkflowNode::new("copied", NodeKind::MapTask, COPY_STEP),
        ],
    })?;

    registry.register_launch_plan(LaunchPlan::test_data())?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileRef;

    #[test]
    fn test_default_registry_contents() {
        let registry = default_registry(&PipelineConfig::default()).unwrap();

        let names: Vec<&str> = registry.steps().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["assembly_task", "copy_read1", "sort_bam_task"]);

        let workflow = registry.workflow("assemble_and_sort").unwrap();
        assert_eq!(workflow.nodes[0].kind, NodeKind::Subworkflow);
        assert_eq!(
            workflow.metadata.as_ref().unwrap().parameters["samples"].display_name,
            "Samples"
        );

        let plan = registry.launch_plan("Test Data").unwrap();
        assert_eq!(
            plan.inputs.samples[0].read1,
            FileRef::remote("s3://latch-public/init/r1.fastq")
        );
    }

    #[test]
    fn test_unknown_launch_plan() {
        let registry = default_registry(&PipelineConfig::default()).unwrap();
        let err = registry.launch_plan("Prod Data").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_rejects_bad_workflows() {
        let mut registry = default_registry(&PipelineConfig::default()).unwrap();

        let unknown_step = WorkflowDefinition {
            name: "broken".to_string(),
            metadata: None,
            inputs: vec![],
            outputs: vec![],
            nodes: vec![WorkflowNode::new("x", NodeKind::Task, "no_such_step")],
        };
        assert!(matches!(
            registry.register_workflow(unknown_step),
            Err(AppError::NotFound(_))
        ));

        let forward_edge = WorkflowDefinition {
            name: "forward".to_string(),
            metadata: None,
            inputs: vec![],
            outputs: vec![],
            nodes: vec![
                WorkflowNode::new("sort", NodeKind::Task, SORT_STEP).after("align"),
                WorkflowNode::new("align", NodeKind::MapTask, ALIGN_STEP),
            ],
        };
        assert!(registry.register_workflow(forward_edge).is_err());

        assert!(registry
            .register_step(CopyStep::new("cp").definition())
            .is_err());
    }

    #[test]
    fn test_manifest_json() {
        let registry = default_registry(&PipelineConfig::default()).unwrap();
        let json = registry.manifest().to_json().unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["steps"].as_array().unwrap().len(), 3);
        assert_eq!(parsed["workflows"][0]["name"], "assemble_and_sort");
        assert_eq!(parsed["launch_plans"][0]["name"], "Test Data");
        assert_eq!(
            parsed["launch_plans"][0]["inputs"]["samples"][0]["read2"]["remote"],
            "s3://latch-public/init/r2.fastq"
        );
    }
}
