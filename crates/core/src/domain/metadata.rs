// Workflow metadata shown to users of a registered workflow

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
}

/// Display information for one workflow input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Show this parameter as a column when launching in batch mode
    #[serde(default)]
    pub batch_table_column: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub display_name: String,
    #[serde(default)]
    pub documentation: String,
    pub author: Author,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterMetadata>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl WorkflowMetadata {
    /// Metadata for the `assemble_and_sort` workflow
    pub fn assemble_and_sort() -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            "samples".to_string(),
            ParameterMetadata {
                display_name: "Samples".to_string(),
                description: "Paired-end read files to be assembled.".to_string(),
                batch_table_column: true,
            },
        );

        Self {
            display_name: "Test SubWF and map_tasks with messages".to_string(),
            documentation: "your-docs.dev".to_string(),
            author: Author {
                name: "John von Neumann".to_string(),
                email: Some("hungarianpapi4@gmail.com".to_string()),
                github: Some("github.com/fluid-dynamix".to_string()),
            },
            repository: "https://github.com/your-repo".to_string(),
            license: "MIT".to_string(),
            parameters,
            tags: Vec::new(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterMetadata> {
        self.parameters.get(name)
    }
}
