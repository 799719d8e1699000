//! Stage 1 of the tiered planner: decide whether the whole request can be
//! answered locally, and if not, classify it into categories and (for
//! multi-step requests) an initial ordered plan.
//!
//! A cheap fast-check prompt runs first and only falls through to the full
//! classifier when it can't confidently answer locally, keeping the common
//! case to one short round trip instead of a full classification call.

use crate::config::LlmProfile;
use crate::error::{AgentError, AgentResult};
use crate::llm::LocalModelClient;

use super::types::ClassificationResult;

const KNOWN_CATEGORIES: &[&str] = &["mail", "calendar", "documents", "search", "math", "text", "system"];

fn fast_check_prompt(request: &str) -> String {
    format!(
        "You are a fast pre-check for a command-dispatching agent. Given the user request below, \
        decide ONLY whether it can be answered directly from general knowledge with no tool use and \
        no multi-step plan. Respond with JSON only: {{\"can_handle_locally\": bool, \"local_answer\": \
        string or null}}.\n\nRequest: {request}"
    )
}

fn full_classifier_prompt(request: &str, categories: &[String]) -> String {
    let available = if categories.is_empty() {
        KNOWN_CATEGORIES.join(", ")
    } else {
        categories.join(", ")
    };
    format!(
        "You are the request classifier for a command-dispatching agent. Available categories: \
        {available}.\n\nCRITICAL STEP BREAKDOWN RULES: break the request into the smallest atomic \
        steps a registered command could perform. A request to act on N items (e.g. \"reply to 5 \
        emails\") becomes N+1 steps: one step to enumerate the items, then one step per item. Do not \
        collapse multiple items into a single step.\n\nRespond with JSON only: {{\"can_handle_locally\": \
        bool, \"local_answer\": string or null, \"categories\": [string], \"needs_sequential\": bool, \
        \"steps_plan\": [string], \"reasoning\": string}}.\n\nRequest: {request}"
    )
}

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

/// Runs the fast-check, and only on a negative result runs the full
/// classifier. Either stage's JSON is parsed tolerantly (fenced or bare).
pub async fn classify_request(
    client: &LocalModelClient,
    profile: &LlmProfile,
    request: &str,
    registered_categories: &[String],
) -> AgentResult<ClassificationResult> {
    let fast_text = client.run(&fast_check_prompt(request), profile).await?;
    if let Some(value) = extract_json(&fast_text) {
        if value.get("can_handle_locally").and_then(|v| v.as_bool()) == Some(true) {
            let local_answer = value
                .get("local_answer")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            if local_answer.is_some() {
                return Ok(ClassificationResult {
                    can_handle_locally: true,
                    local_answer,
                    categories: Vec::new(),
                    needs_sequential: false,
                    steps_plan: Vec::new(),
                    reasoning: "resolved at fast-check stage".to_string(),
                });
            }
        }
    }

    let full_text = client
        .run(&full_classifier_prompt(request, registered_categories), profile)
        .await?;
    let value = extract_json(&full_text).ok_or_else(|| {
        AgentError::Execution("classifier response was not valid JSON".to_string())
    })?;
    serde_json::from_value(value)
        .map_err(|e| AgentError::Execution(format!("classifier response missing fields: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_handles_bare_object() {
        let v = extract_json("{\"can_handle_locally\": true}").unwrap();
        assert_eq!(v["can_handle_locally"], true);
    }

    #[test]
    fn extract_json_handles_fenced_object() {
        let v = extract_json("```json\n{\"can_handle_locally\": false}\n```").unwrap();
        assert_eq!(v["can_handle_locally"], false);
    }

    #[test]
    fn fast_check_prompt_includes_request() {
        let prompt = fast_check_prompt("what is the capital of france?");
        assert!(prompt.contains("what is the capital of france?"));
    }
}
