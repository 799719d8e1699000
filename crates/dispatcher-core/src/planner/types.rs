//! Plain data returned by the two planning stages.

use serde::Deserialize;

/// Result of classifying the whole incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationResult {
    pub can_handle_locally: bool,
    #[serde(default)]
    pub local_answer: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub needs_sequential: bool,
    #[serde(default)]
    pub steps_plan: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// What the per-step planner decided to do with the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDecision {
    LocalAnswer,
    ExecuteCommand,
    NeedsExpansion,
    NeedsNewWorkflow,
}

/// The target a `NEEDS_NEW_WORKFLOW` decision asks the generation manager
/// to build: which command key to create, why, and a free-text hint passed
/// straight through to the remote model's prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkflowRequest {
    pub namespace: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "gpt_prompt")]
    pub prompt_hint: String,
}

impl NewWorkflowRequest {
    pub fn command_key(&self) -> String {
        format!("{}:{}", self.namespace, self.action)
    }
}

/// Result of planning execution for a single step.
#[derive(Debug, Clone, Deserialize)]
pub struct StepExecutionPlan {
    pub decision: StepDecision,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub expanded_steps: Vec<String>,
    #[serde(default)]
    pub workflow_request: Option<NewWorkflowRequest>,
    #[serde(default)]
    pub local_answer: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl StepExecutionPlan {
    pub fn can_execute(&self) -> bool {
        self.decision == StepDecision::ExecuteCommand && self.command.is_some()
    }

    pub fn needs_new_workflow(&self) -> bool {
        self.decision == StepDecision::NeedsNewWorkflow
    }
}
