//! Remote model client — generates a brand new workflow module by sending a
//! single completion request and parsing the structured JSON it returns.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, AgentResult};

const MAX_PROMPT_CHARS: usize = 110_000;

/// Context assembled by the generation manager and handed to the remote
/// model: the current command reference, a shallow project tree, the
/// registry's own source for it to imitate, summaries of a few existing
/// workflows and tools, and the namespace:name keys already taken.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationContext {
    pub command: String,
    pub summary: String,
    pub description: String,
    pub command_reference: String,
    pub registry_source: String,
    pub sample_workflows: HashMap<String, String>,
    pub tool_summaries: HashMap<String, String>,
    pub existing_workflows: Vec<String>,
    pub previous_errors: Vec<String>,
}

/// The structured artifact the remote model must return.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedModule {
    pub module_code: String,
    #[serde(default)]
    pub tests: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Clone)]
pub struct RemoteModelClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl RemoteModelClient {
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }

    /// Sends one generation request and parses the response as
    /// [`GeneratedModule`]. Fails if the remote isn't configured, the
    /// transport fails, or the response can't be parsed into a non-empty
    /// `module_code`.
    pub async fn generate(
        &self,
        model: &str,
        temperature: f64,
        max_tokens: u32,
        context: &GenerationContext,
    ) -> AgentResult<GeneratedModule> {
        let (endpoint, api_key) = match (&self.endpoint, &self.api_key) {
            (Some(e), Some(k)) => (e, k),
            _ => {
                return Err(AgentError::Generation(
                    "remote generator is not configured (missing endpoint or API key)".to_string(),
                ))
            }
        };

        let input_text = build_prompt(context);

        let response = self
            .http
            .post(endpoint.as_str())
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "model": model,
                "input": input_text,
                "temperature": temperature,
                "max_output_tokens": max_tokens,
                "store": true,
                "metadata": {"purpose": "workflow-generation", "command": context.command},
            }))
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("remote generator request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AgentError::Transport(format!(
                "remote generator returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Transport(format!("remote generator returned non-JSON body: {e}")))?;

        let text = extract_output_text(&body)
            .ok_or_else(|| AgentError::Generation("remote generator response had no output text".to_string()))?;

        let parsed = parse_json_from_response(&text)
            .ok_or_else(|| AgentError::Generation("remote generator response was not valid JSON".to_string()))?;

        let module: GeneratedModule = serde_json::from_value(parsed)
            .map_err(|e| AgentError::Generation(format!("remote generator response missing fields: {e}")))?;

        if module.module_code.trim().is_empty() {
            return Err(AgentError::Generation(
                "remote generator returned empty module_code".to_string(),
            ));
        }

        Ok(module)
    }
}

fn extract_output_text(body: &serde_json::Value) -> Option<String> {
    if let Some(text) = body.get("output_text").and_then(|v| v.as_str()) {
        return Some(text.to_string());
    }
    let output = body.get("output")?.as_array()?;
    let mut stitched = String::new();
    for item in output {
        if let Some(content) = item.get("content").and_then(|v| v.as_array()) {
            for piece in content {
                if piece.get("type").and_then(|v| v.as_str()) == Some("output_text") {
                    if let Some(text) = piece.get("text").and_then(|v| v.as_str()) {
                        stitched.push_str(text);
                    }
                }
            }
        }
    }
    if stitched.is_empty() {
        None
    } else {
        Some(stitched)
    }
}

/// Strips a surrounding ```json fence if present, then locates the
/// outermost `{...}` span and parses it — tolerant of a model wrapping its
/// JSON in prose or markdown.
fn parse_json_from_response(text: &str) -> Option<serde_json::Value> {
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

fn build_prompt(context: &GenerationContext) -> String {
    let mut tools_section = String::new();
    for (name, summary) in context.tool_summaries.iter().take(3) {
        let truncated: String = summary.chars().take(300).collect();
        tools_section.push_str(&format!("### {name}\n{truncated}\n\n"));
    }

    let sample = context
        .sample_workflows
        .values()
        .next()
        .map(|s| s.chars().take(600).collect::<String>())
        .unwrap_or_default();

    let mut errors_section = String::new();
    if !context.previous_errors.is_empty() {
        errors_section.push_str("Previous attempts failed with:\n");
        for err in context.previous_errors.iter().rev().take(2) {
            errors_section.push_str(&format!("- {err}\n"));
        }
    }

    let text = format!(
        "Command: {}\nSummary: {}\nDescription: {}\n\nAvailable tools:\n{tools_section}\n\nSample workflow:\n{sample}\n\nExisting workflows: {}\n\nCommand reference:\n{}\n\n{errors_section}\n\
        Return JSON with keys module_code, tests, notes, summary. module_code must register the workflow \
        with `WorkflowRegistry::register` following the existing registry conventions and must implement real \
        working logic with no placeholders.",
        context.command,
        context.summary,
        context.description,
        context.existing_workflows.join(", "),
        context.command_reference,
    );

    text.chars().take(MAX_PROMPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"module_code\": \"fn x() {}\"}\n```";
        let parsed = parse_json_from_response(text).unwrap();
        assert_eq!(parsed["module_code"], "fn x() {}");
    }

    #[test]
    fn parses_json_surrounded_by_prose() {
        let text = "Sure, here you go:\n{\"module_code\": \"ok\"}\nLet me know if you need more.";
        let parsed = parse_json_from_response(text).unwrap();
        assert_eq!(parsed["module_code"], "ok");
    }

    #[test]
    fn rejects_text_with_no_braces() {
        assert!(parse_json_from_response("no json here").is_none());
    }
}
