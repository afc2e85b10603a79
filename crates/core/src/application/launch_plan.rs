// Launch plans: named default input sets for a workflow

use crate::application::constants::{ASSEMBLE_AND_SORT_WORKFLOW, TEST_DATA_PLAN};
use crate::domain::{FileRef, Sample};
use serde::{Deserialize, Serialize};

/// Inputs of the `assemble_and_sort` workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInputs {
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPlan {
    pub workflow: String,
    pub name: String,
    pub inputs: WorkflowInputs,
}

impl LaunchPlan {
    pub fn new(workflow: impl Into<String>, name: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self {
            workflow: workflow.into(),
            name: name.into(),
            inputs: WorkflowInputs { samples },
        }
    }

    /// Public example reads, one paired sample
    pub fn test_data() -> Self {
        Self::new(
            ASSEMBLE_AND_SORT_WORKFLOW,
            TEST_DATA_PLAN,
            vec![Sample::new(
                FileRef::remote("s3://latch-public/init/r1.fastq"),
                FileRef::remote("s3://latch-public/init/r2.fastq"),
            )],
        )
    }
}
