//! Workflow definition types
//!
//! The structured document the policy evaluator reads. Consumed read-only;
//! absent fields deserialize to their empty defaults so rules can treat
//! absence as "does not match" rather than an error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A structured workflow document describing jobs, steps, and permissions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub permissions: Option<HashMap<String, String>>,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

/// One job in a workflow document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    #[serde(default)]
    pub permissions: Option<HashMap<String, String>>,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// One step within a job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default)]
    pub name: Option<String>,
    /// Environment variable keys and values declared on the step.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// "with"-style parameter map passed to the step.
    #[serde(default)]
    pub with: HashMap<String, String>,
}

impl WorkflowDefinition {
    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|j| j.name.as_str())
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepDefinition> {
        self.jobs.iter().flat_map(|j| j.steps.iter())
    }
}
