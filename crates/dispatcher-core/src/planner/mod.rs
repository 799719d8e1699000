//! Tiered planner — decides, at the request level and at each step, which
//! of the three execution tiers (local answer, registered command, new
//! generation) applies.

mod classifier;
mod step_planner;
mod types;

pub use classifier::classify_request;
pub use step_planner::plan_step_execution;
pub use types::{ClassificationResult, NewWorkflowRequest, StepDecision, StepExecutionPlan};
