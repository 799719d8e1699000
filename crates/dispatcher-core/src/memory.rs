//! Workflow memory — the shared, mutable state threaded through one
//! request's entire multi-step walk.
//!
//! A single [`WorkflowMemory`] is created per incoming request and lives for
//! the duration of the execution loop. Steps are appended to or expanded in
//! `steps_plan`, each completed step is appended (never mutated) to
//! `completed_steps`, and `context` accumulates values later steps can
//! reference — most importantly identifier lists a later step substitutes
//! via the `id:` sentinel.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One planned (and possibly already executed) step in the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStep {
    pub instruction: String,
}

/// A step that has finished executing, with its resolved command and output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedStep {
    pub instruction: String,
    pub command: Option<String>,
    pub output: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowMemory {
    pub original_request: String,
    pub steps_plan: Vec<PlannedStep>,
    pub completed_steps: Vec<CompletedStep>,
    pub context: HashMap<String, serde_json::Value>,
    pub categories: Vec<String>,
}

impl WorkflowMemory {
    pub fn new(original_request: String, steps_plan: Vec<String>, categories: Vec<String>) -> Self {
        Self {
            original_request,
            steps_plan: steps_plan
                .into_iter()
                .map(|instruction| PlannedStep { instruction })
                .collect(),
            completed_steps: Vec::new(),
            context: HashMap::new(),
            categories,
        }
    }

    /// Appends a completed step to the ledger. Completed steps are never
    /// rewritten — only appended — so earlier progress stays auditable even
    /// as later steps get expanded or retried.
    pub fn add_step(&mut self, instruction: String, command: Option<String>, output: serde_json::Value) {
        self.completed_steps.push(CompletedStep {
            instruction,
            command,
            output,
            timestamp: Utc::now(),
        });
    }

    /// Inserts `new_steps` in place of the step at `index`, for
    /// `NEEDS_EXPANSION` decisions that break one instruction into several.
    pub fn expand_step(&mut self, index: usize, new_steps: Vec<String>) {
        let planned: Vec<PlannedStep> = new_steps
            .into_iter()
            .map(|instruction| PlannedStep { instruction })
            .collect();
        if index < self.steps_plan.len() {
            self.steps_plan.splice(index..=index, planned);
        } else {
            self.steps_plan.extend(planned);
        }
    }

    pub fn get_current_step_number(&self) -> usize {
        self.completed_steps.len() + 1
    }

    pub fn get_remaining_steps(&self) -> &[PlannedStep] {
        let done = self.completed_steps.len();
        if done >= self.steps_plan.len() {
            &[]
        } else {
            &self.steps_plan[done..]
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_steps.len() >= self.steps_plan.len()
    }

    pub fn set_context(&mut self, key: &str, value: serde_json::Value) {
        self.context.insert(key.to_string(), value);
    }

    /// Renders the exact textual projection the planner consumes for its
    /// per-step prompt: the original request, the numbered plan with
    /// done/pending markers, a truncated log of completed step outputs, and
    /// an "Available Context" section.
    ///
    /// Identifier-like lists (keys containing `message_id`) are expanded as
    /// individually numbered items, up to 10, so the planner can reference a
    /// specific one with the `id:MESSAGE_ID` sentinel; other list-valued
    /// context collapses to an item count, and everything else is truncated
    /// to 50 characters.
    pub fn get_summary(&self) -> String {
        let mut out = String::new();
        out.push_str("Original Request: ");
        out.push_str(&self.original_request);
        out.push('\n');

        out.push_str(&format!("Plan ({} steps):\n", self.steps_plan.len()));
        for (i, step) in self.steps_plan.iter().enumerate() {
            let marker = if i < self.completed_steps.len() { "\u{2713}" } else { "\u{25cb}" };
            out.push_str(&format!("  {marker} {}. {}\n", i + 1, step.instruction));
        }

        if !self.completed_steps.is_empty() {
            out.push_str("Completed Steps:\n");
            for (i, step) in self.completed_steps.iter().enumerate() {
                let rendered = step.output.to_string();
                let snippet: String = rendered.chars().take(100).collect();
                out.push_str(&format!("  {}. {} -> {}\n", i + 1, step.instruction, snippet));
            }
        }

        if !self.context.is_empty() {
            out.push_str("Available Context:\n");
            let mut keys: Vec<&String> = self.context.keys().collect();
            keys.sort();
            for key in keys {
                let value = &self.context[key];
                let rendered = if let Some(items) = value.as_array() {
                    if key.contains("message_id") {
                        let shown: Vec<String> = items
                            .iter()
                            .take(10)
                            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                            .collect();
                        format!("[{}]", shown.join(", "))
                    } else {
                        format!("{{{} items}}", items.len())
                    }
                } else {
                    let s = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                    s.chars().take(50).collect()
                };
                out.push_str(&format!("  {key}: {rendered}\n"));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_marks_completed_and_pending_steps() {
        let mut mem = WorkflowMemory::new(
            "reply to the last 2 emails".to_string(),
            vec!["list emails".to_string(), "reply to each".to_string()],
            vec!["mail".to_string()],
        );
        mem.add_step("list emails".to_string(), Some("mail:list".to_string()), serde_json::json!({"count": 2}));
        let summary = mem.get_summary();
        assert!(summary.contains("\u{2713} 1. list emails"));
        assert!(summary.contains("\u{25cb} 2. reply to each"));
    }

    #[test]
    fn message_id_lists_are_expanded_individually() {
        let mut mem = WorkflowMemory::new("x".to_string(), vec![], vec![]);
        mem.set_context("mail:last_message_ids", serde_json::json!(["m1", "m2", "m3"]));
        let summary = mem.get_summary();
        assert!(summary.contains("[m1, m2, m3]"));
    }

    #[test]
    fn other_lists_collapse_to_count() {
        let mut mem = WorkflowMemory::new("x".to_string(), vec![], vec![]);
        mem.set_context("tags", serde_json::json!(["a", "b"]));
        let summary = mem.get_summary();
        assert!(summary.contains("{2 items}"));
    }

    #[test]
    fn expand_step_splices_in_place() {
        let mut mem = WorkflowMemory::new(
            "x".to_string(),
            vec!["a".to_string(), "b".to_string()],
            vec![],
        );
        mem.expand_step(0, vec!["a1".to_string(), "a2".to_string()]);
        assert_eq!(mem.steps_plan.len(), 3);
        assert_eq!(mem.steps_plan[0].instruction, "a1");
        assert_eq!(mem.steps_plan[2].instruction, "b");
    }

    #[test]
    fn is_complete_tracks_completed_vs_planned() {
        let mut mem = WorkflowMemory::new("x".to_string(), vec!["a".to_string()], vec![]);
        assert!(!mem.is_complete());
        mem.add_step("a".to_string(), None, serde_json::json!(null));
        assert!(mem.is_complete());
    }
}
