//! Stage 2 of the tiered planner: for a single remaining step, decide
//! whether it maps onto a registered command, needs to be broken down
//! further, or needs an entirely new workflow generated for it.

use crate::config::LlmProfile;
use crate::error::{AgentError, AgentResult};
use crate::llm::LocalModelClient;
use crate::memory::WorkflowMemory;

use super::types::StepExecutionPlan;

fn extract_json(text: &str) -> Option<serde_json::Value> {
    let stripped = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&stripped[start..=end]).ok()
}

fn prompt(command_reference: &str, memory_summary: &str) -> String {
    format!(
        "You are planning execution of the NEXT step only for a command-dispatching agent.\n\n\
        Commands available for the current request's categories:\n{command_reference}\n\n\
        Current memory:\n{memory_summary}\n\n\
        Decide exactly one of: EXECUTE_COMMAND (a listed command, fully formed with resolved \
        arguments, matches this step — use REAL ids from Available Context, chain repeated \
        same-action commands over a bounded list with ` && `, one step per distinct action), \
        NEEDS_EXPANSION (this step is still too coarse and must be broken into smaller atomic \
        steps), NEEDS_NEW_WORKFLOW (no listed command can do this — check each candidate's \
        Description and Parameters before concluding that, then describe the new workflow), or \
        LOCAL_ANSWER (this step is answerable directly, no command needed).\n\n\
        Example: if the step is \"reply to message id:m1\" and `mail:reply` is listed, decide \
        EXECUTE_COMMAND with command `mail:reply id:m1 body:...`. If the step is \"handle the \
        inbox\" with no enumeration yet, decide NEEDS_EXPANSION. If the step needs a capability no \
        listed command offers (e.g. \"convert this document to PDF\" with no doc:convert command), \
        decide NEEDS_NEW_WORKFLOW.\n\n\
        Respond with JSON only: {{\"decision\": \"execute_command\"|\"needs_expansion\"|\
        \"needs_new_workflow\"|\"local_answer\", \"command\": string or null, \"expanded_steps\": \
        [string], \"workflow_request\": {{\"namespace\": string, \"action\": string, \
        \"description\": string, \"prompt_hint\": string}} or null, \"local_answer\": string or \
        null, \"reasoning\": string}}."
    )
}

/// Plans execution of [`WorkflowMemory::get_remaining_steps`]'s first entry,
/// given the command reference scoped to the request's categories.
pub async fn plan_step_execution(
    client: &LocalModelClient,
    profile: &LlmProfile,
    memory: &WorkflowMemory,
    command_reference: &str,
) -> AgentResult<StepExecutionPlan> {
    let text = client
        .run(&prompt(command_reference, &memory.get_summary()), profile)
        .await?;
    let value = extract_json(&text)
        .ok_or_else(|| AgentError::Execution("step planner response was not valid JSON".to_string()))?;
    serde_json::from_value(value)
        .map_err(|e| AgentError::Execution(format!("step planner response missing fields: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_memory_summary() {
        let mem = WorkflowMemory::new("do a thing".to_string(), vec!["step one".to_string()], vec![]);
        let text = prompt("mail:send to subject body", &mem.get_summary());
        assert!(text.contains("step one"));
        assert!(text.contains("mail:send"));
    }
}
