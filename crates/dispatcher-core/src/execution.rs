//! Execution loop — drives one request from classification to a final,
//! concatenated textual result (spec §4.G).
//!
//! A single [`ExecutionLoop`] is built once per process (it owns the
//! registry, planner profiles, and generation manager) and its
//! [`ExecutionLoop::run_request`] is called once per incoming request,
//! building a fresh [`WorkflowMemory`] each time.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::command_reference::CommandReferenceCache;
use crate::config::RuntimeConfig;
use crate::error::{AgentError, AgentResult};
use crate::generation::GenerationManager;
use crate::llm::{LocalModelClient, RemoteModelClient};
use crate::memory::WorkflowMemory;
use crate::planner::{classify_request, plan_step_execution, StepDecision, StepExecutionPlan};
use crate::registry::WorkflowRegistry;

const SUCCESS_MARKER: &str = "\u{2713}";
const FAILURE_MARKER: &str = "\u{2717}";

/// Counts expansions attempted for the current step only. The count resets
/// whenever the step pointer advances, since the expansion depth bound is
/// per step, not per request (spec §4.G termination clause b).
#[derive(Default)]
struct ExpansionTracker {
    step_index: Option<usize>,
    count: u32,
}

impl ExpansionTracker {
    /// Bumps the count for `step_index`, resetting it first if the pointer
    /// moved since the last bump, and returns the new count.
    fn bump(&mut self, step_index: usize) -> u32 {
        if self.step_index != Some(step_index) {
            self.step_index = Some(step_index);
            self.count = 0;
        }
        self.count += 1;
        self.count
    }
}

pub struct ExecutionLoop {
    registry: WorkflowRegistry,
    config: RuntimeConfig,
    local_client: LocalModelClient,
    reference_cache: CommandReferenceCache,
    generation: GenerationManager,
}

impl ExecutionLoop {
    pub fn new(registry: WorkflowRegistry, config: RuntimeConfig, remote_client: RemoteModelClient) -> Self {
        let local_client = LocalModelClient::with_config(&config);
        local_client.warmup(&config.local_command_classifier.model);
        Self {
            generation: GenerationManager::new(registry.clone(), config.clone(), remote_client),
            registry,
            config,
            local_client,
            reference_cache: CommandReferenceCache::new(),
        }
    }

    fn known_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .registry
            .iter_workflows()
            .into_iter()
            .map(|spec| spec.namespace.clone())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// Runs `request` end to end and returns the final user-facing text.
    pub async fn run_request(&self, request: &str) -> AgentResult<String> {
        let classification = classify_request(
            &self.local_client,
            &self.config.local_command_classifier,
            request,
            &self.known_categories(),
        )
        .await?;

        if classification.can_handle_locally {
            let answer = classification.local_answer.unwrap_or_default();
            info!(request, "resolved locally without dispatch");
            return Ok(format!("{SUCCESS_MARKER} {answer}"));
        }

        let mut memory = WorkflowMemory::new(
            request.to_string(),
            classification.steps_plan,
            classification.categories,
        );

        let mut used_identifiers: HashSet<String> = HashSet::new();
        let mut expansion_tracker = ExpansionTracker::default();

        while !memory.is_complete() {
            let step_index = memory.completed_steps.len();
            let instruction = memory.steps_plan[step_index].instruction.clone();
            let command_reference = self.reference_cache.get_or_render(&self.registry, &memory.categories);

            let plan = plan_step_execution(
                &self.local_client,
                &self.config.local_planner,
                &memory,
                &command_reference,
            )
            .await?;

            self.apply_step_plan(&mut memory, &instruction, plan, &mut used_identifiers, &mut expansion_tracker)
                .await?;
        }

        let rendered: Vec<String> = memory
            .completed_steps
            .iter()
            .map(|step| render_step_output(&step.output))
            .collect();
        Ok(rendered.join("\n"))
    }

    async fn apply_step_plan(
        &self,
        memory: &mut WorkflowMemory,
        instruction: &str,
        plan: StepExecutionPlan,
        used_identifiers: &mut HashSet<String>,
        expansion_tracker: &mut ExpansionTracker,
    ) -> AgentResult<()> {
        match plan.decision {
            StepDecision::LocalAnswer => {
                let answer = plan.local_answer.unwrap_or_default();
                memory.add_step(instruction.to_string(), Some("local_answer".to_string()), serde_json::json!(answer));
                Ok(())
            }

            StepDecision::ExecuteCommand => {
                let raw_command = plan.command.ok_or_else(|| {
                    AgentError::Execution("step planner chose EXECUTE_COMMAND without a command".to_string())
                })?;
                self.execute_command_step(memory, instruction, &raw_command, used_identifiers).await
            }

            StepDecision::NeedsExpansion => {
                let step_index = memory.completed_steps.len();
                if plan.expanded_steps.is_empty() {
                    return Err(AgentError::Execution(
                        "step planner chose NEEDS_EXPANSION without any expanded steps".to_string(),
                    ));
                }
                let attempt = expansion_tracker.bump(step_index);
                if attempt > self.config.max_expansion_depth {
                    warn!(instruction, "expansion depth exceeded, falling back to literal instruction");
                    memory.add_step(
                        instruction.to_string(),
                        Some("local_answer(expansion_limit)".to_string()),
                        serde_json::json!(instruction),
                    );
                    return Ok(());
                }
                debug!(instruction, count = plan.expanded_steps.len(), "expanding step");
                memory.expand_step(step_index, plan.expanded_steps);
                Ok(())
            }

            StepDecision::NeedsNewWorkflow => {
                let request = plan.workflow_request.ok_or_else(|| {
                    AgentError::Execution(
                        "step planner chose NEEDS_NEW_WORKFLOW without a workflow_request".to_string(),
                    )
                })?;
                let command_key = request.command_key();
                if !self.generation.can_attempt(&command_key) {
                    memory.add_step(
                        instruction.to_string(),
                        Some(command_key.clone()),
                        serde_json::json!(format!(
                            "{FAILURE_MARKER} generation quota reached for '{command_key}'"
                        )),
                    );
                    return Ok(());
                }

                let outcome = self
                    .generation
                    .ensure_workflow(&request, &command_key, HashMap::new())
                    .await;

                if outcome.success {
                    info!(command_key, "generated workflow registered, re-planning step");
                    // do not advance: the next loop iteration replans the
                    // same still-pending step, which should now resolve to
                    // EXECUTE_COMMAND against the freshly registered key.
                    Ok(())
                } else {
                    let joined = outcome.errors.join("; ");
                    memory.add_step(
                        instruction.to_string(),
                        Some(command_key),
                        serde_json::json!(format!("{FAILURE_MARKER} generation failed: {joined}")),
                    );
                    Ok(())
                }
            }
        }
    }

    async fn execute_command_step(
        &self,
        memory: &mut WorkflowMemory,
        instruction: &str,
        raw_command: &str,
        used_identifiers: &mut HashSet<String>,
    ) -> AgentResult<()> {
        let sub_commands: Vec<&str> = raw_command.split(" && ").map(str::trim).collect();
        let mut outputs = Vec::with_capacity(sub_commands.len());
        let mut last_error: Option<String> = None;

        for sub_command in &sub_commands {
            let resolved = resolve_identifier_sentinel(sub_command, &memory.context, used_identifiers);
            match self.dispatch_one(memory, &resolved).await {
                Ok(output) => outputs.push(output),
                Err(AgentError::NotFound(msg)) => {
                    let (namespace, action) = split_namespace_action(&resolved)?;
                    let command_key = format!("{namespace}:{action}");
                    if !self.generation.can_attempt(&command_key) {
                        last_error = Some(format!("{msg} (generation quota reached)"));
                        break;
                    }
                    let synthesized = crate::planner::NewWorkflowRequest {
                        namespace,
                        action,
                        description: format!("Implements the CLI command `{resolved}`."),
                        prompt_hint: format!("Implement the command `{resolved}` exactly as written."),
                    };
                    let outcome = self
                        .generation
                        .ensure_workflow(&synthesized, &resolved, memory.context.clone())
                        .await;
                    match outcome.output {
                        Some(output) => outputs.push(output),
                        None => {
                            last_error = Some(outcome.errors.join("; "));
                            break;
                        }
                    }
                }
                Err(AgentError::Execution(msg)) => {
                    last_error = Some(msg);
                    break;
                }
                Err(other) => return Err(other),
            }
        }

        let command_tag = Some(raw_command.to_string());
        let output = if let Some(err) = last_error {
            serde_json::json!(format!("{FAILURE_MARKER} {err}"))
        } else if outputs.len() == 1 {
            outputs.into_iter().next().unwrap()
        } else {
            serde_json::json!({"chained": outputs})
        };

        memory.add_step(instruction.to_string(), command_tag, output);
        Ok(())
    }

    /// Dispatches a single (already identifier-resolved) command against
    /// the registry, promoting any `context` object the handler returned
    /// into `memory.context` under `"{namespace}:{key}"`.
    async fn dispatch_one(&self, memory: &mut WorkflowMemory, command: &str) -> AgentResult<serde_json::Value> {
        let (namespace, _) = split_namespace_action(command)?;
        let result = self.registry.execute(command, memory.context.clone())?;
        if let Some(updates) = result.output.get("context").and_then(|v| v.as_object()) {
            for (key, value) in updates {
                memory.set_context(&format!("{namespace}:{key}"), value.clone());
            }
        }
        Ok(result.output)
    }
}

fn split_namespace_action(command: &str) -> AgentResult<(String, String)> {
    let head = command.trim().split(' ').next().unwrap_or_default();
    let (namespace, action) = head.split_once(':').ok_or_else(|| {
        AgentError::Validation(format!("command '{command}' is missing a ':' between namespace and name"))
    })?;
    Ok((namespace.to_string(), action.to_string()))
}

/// Substitutes the sentinel `id:MESSAGE_ID` in `command`, if present, with
/// the next identifier from `context["mail:last_message_ids"]` that hasn't
/// already been used in this request (spec §4.G, invariant 8).
fn resolve_identifier_sentinel(
    command: &str,
    context: &HashMap<String, serde_json::Value>,
    used: &mut HashSet<String>,
) -> String {
    if !command.contains("id:MESSAGE_ID") {
        return command.to_string();
    }
    let ids = match context.get("mail:last_message_ids").and_then(|v| v.as_array()) {
        Some(ids) => ids,
        None => return command.to_string(),
    };
    let next = ids
        .iter()
        .filter_map(|v| v.as_str())
        .find(|id| !used.contains(*id));
    match next {
        Some(id) => {
            used.insert(id.to_string());
            command.replacen("id:MESSAGE_ID", &format!("id:{id}"), 1)
        }
        None => command.to_string(),
    }
}

fn render_step_output(output: &serde_json::Value) -> String {
    match output.as_str() {
        Some(s) => s.to_string(),
        None => output.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RemoteModelClient;
    use crate::planner::NewWorkflowRequest;
    use crate::registry::WorkflowRegistry;
    use crate::workflows;

    fn test_loop() -> ExecutionLoop {
        let registry = WorkflowRegistry::new();
        workflows::register_builtins(&registry).unwrap();
        ExecutionLoop::new(registry, RuntimeConfig::from_env(), RemoteModelClient::new(None, None))
    }

    fn plan(decision: StepDecision) -> StepExecutionPlan {
        StepExecutionPlan {
            decision,
            command: None,
            expanded_steps: Vec::new(),
            workflow_request: None,
            local_answer: None,
            reasoning: String::new(),
        }
    }

    #[tokio::test]
    async fn local_answer_decision_records_a_completed_step_without_dispatch() {
        let exec = test_loop();
        let mut memory = WorkflowMemory::new("what is 7 * 6".to_string(), vec!["answer directly".to_string()], vec![]);
        let mut used = HashSet::new();
        let mut expansions = ExpansionTracker::default();

        let mut step_plan = plan(StepDecision::LocalAnswer);
        step_plan.local_answer = Some("42".to_string());

        exec.apply_step_plan(&mut memory, "answer directly", step_plan, &mut used, &mut expansions)
            .await
            .unwrap();

        assert_eq!(memory.completed_steps.len(), 1);
        assert_eq!(memory.completed_steps[0].output, serde_json::json!("42"));
        assert_eq!(memory.completed_steps[0].command, Some("local_answer".to_string()));
    }

    #[tokio::test]
    async fn execute_command_decision_dispatches_against_the_registry() {
        let exec = test_loop();
        let mut memory = WorkflowMemory::new("add two numbers".to_string(), vec!["math:add 2 5".to_string()], vec![]);
        let mut used = HashSet::new();
        let mut expansions = ExpansionTracker::default();

        let mut step_plan = plan(StepDecision::ExecuteCommand);
        step_plan.command = Some("math:add 2 5".to_string());

        exec.apply_step_plan(&mut memory, "add two numbers", step_plan, &mut used, &mut expansions)
            .await
            .unwrap();

        assert_eq!(memory.completed_steps.len(), 1);
        assert_eq!(memory.completed_steps[0].output["sum"], 7);
    }

    #[tokio::test]
    async fn chained_commands_are_split_and_dispatched_in_order() {
        let exec = test_loop();
        let mut memory = WorkflowMemory::new("reverse then add".to_string(), vec!["chain".to_string()], vec![]);
        let mut used = HashSet::new();
        let mut expansions = ExpansionTracker::default();

        let mut step_plan = plan(StepDecision::ExecuteCommand);
        step_plan.command = Some("text:reverse hi && math:add 1 2".to_string());

        exec.apply_step_plan(&mut memory, "chain", step_plan, &mut used, &mut expansions)
            .await
            .unwrap();

        let output = &memory.completed_steps[0].output;
        let chained = output["chained"].as_array().expect("chained output array");
        assert_eq!(chained.len(), 2);
        assert_eq!(chained[0]["reversed"], "ih");
        assert_eq!(chained[1]["sum"], 3);
    }

    #[tokio::test]
    async fn execution_error_is_recorded_as_step_output_and_loop_advances() {
        let exec = test_loop();
        let mut memory = WorkflowMemory::new(
            "scan a missing path".to_string(),
            vec!["scan".to_string()],
            vec![],
        );
        let mut used = HashSet::new();
        let mut expansions = ExpansionTracker::default();

        let mut step_plan = plan(StepDecision::ExecuteCommand);
        step_plan.command = Some("system:scan_directory /no/such/path".to_string());

        exec.apply_step_plan(&mut memory, "scan", step_plan, &mut used, &mut expansions)
            .await
            .unwrap();

        assert_eq!(memory.completed_steps.len(), 1);
        let output = memory.completed_steps[0].output.as_str().unwrap();
        assert!(output.starts_with(FAILURE_MARKER));
    }

    #[tokio::test]
    async fn needs_expansion_splices_steps_in_place_without_advancing() {
        let exec = test_loop();
        let mut memory = WorkflowMemory::new(
            "reply to the last 2 emails".to_string(),
            vec!["list emails".to_string(), "reply to each".to_string()],
            vec!["mail".to_string()],
        );
        memory.add_step("list emails".to_string(), Some("mail:list".to_string()), serde_json::json!({"ok": true}));
        let mut used = HashSet::new();
        let mut expansions = ExpansionTracker::default();

        let mut step_plan = plan(StepDecision::NeedsExpansion);
        step_plan.expanded_steps = vec!["reply to email 1".to_string(), "reply to email 2".to_string()];

        exec.apply_step_plan(&mut memory, "reply to each", step_plan, &mut used, &mut expansions)
            .await
            .unwrap();

        assert_eq!(memory.completed_steps.len(), 1, "expansion must not advance the step pointer");
        assert_eq!(memory.steps_plan.len(), 3);
        assert_eq!(memory.steps_plan[1].instruction, "reply to email 1");
        assert_eq!(memory.steps_plan[2].instruction, "reply to email 2");
    }

    #[tokio::test]
    async fn needs_new_workflow_records_failure_when_remote_is_unconfigured() {
        let exec = test_loop();
        let mut memory = WorkflowMemory::new(
            "fetch a web page into a file".to_string(),
            vec!["fetch html".to_string()],
            vec!["system".to_string()],
        );
        let mut used = HashSet::new();
        let mut expansions = ExpansionTracker::default();

        let mut step_plan = plan(StepDecision::NeedsNewWorkflow);
        step_plan.workflow_request = Some(NewWorkflowRequest {
            namespace: "system".to_string(),
            action: "fetch_html_from_url".to_string(),
            description: "fetches a URL into a file".to_string(),
            prompt_hint: "implement system:fetch_html_from_url url:URL file:PATH".to_string(),
        });

        exec.apply_step_plan(&mut memory, "fetch html", step_plan, &mut used, &mut expansions)
            .await
            .unwrap();

        assert_eq!(memory.completed_steps.len(), 1);
        let output = memory.completed_steps[0].output.as_str().unwrap();
        assert!(output.contains(FAILURE_MARKER));
    }

    #[tokio::test]
    async fn expansion_depth_limit_falls_back_to_literal_instruction() {
        let exec = test_loop();
        let mut memory = WorkflowMemory::new("endless".to_string(), vec!["loop forever".to_string()], vec![]);
        let mut used = HashSet::new();
        // step index 0 has already hit the per-step limit; a fresh step
        // (different index) would start its own count from zero.
        let mut expansions = ExpansionTracker { step_index: Some(0), count: exec.config.max_expansion_depth };

        let mut step_plan = plan(StepDecision::NeedsExpansion);
        step_plan.expanded_steps = vec!["loop forever again".to_string()];

        exec.apply_step_plan(&mut memory, "loop forever", step_plan, &mut used, &mut expansions)
            .await
            .unwrap();

        assert_eq!(memory.completed_steps.len(), 1);
        assert_eq!(memory.completed_steps[0].output, serde_json::json!("loop forever"));
    }

    #[tokio::test]
    async fn expansion_depth_limit_is_scoped_to_the_current_step() {
        let exec = test_loop();
        let mut memory = WorkflowMemory::new(
            "two loops".to_string(),
            vec!["step one".to_string(), "step two".to_string()],
            vec![],
        );
        memory.add_step("step one".to_string(), Some("local_answer".to_string()), serde_json::json!("done"));
        let mut used = HashSet::new();
        // step index 0 already exhausted its budget; step index 1 (the
        // current step) has never been expanded and must get its own budget.
        let mut expansions = ExpansionTracker { step_index: Some(0), count: exec.config.max_expansion_depth };

        let mut step_plan = plan(StepDecision::NeedsExpansion);
        step_plan.expanded_steps = vec!["step two a".to_string(), "step two b".to_string()];

        exec.apply_step_plan(&mut memory, "step two", step_plan, &mut used, &mut expansions)
            .await
            .unwrap();

        assert_eq!(memory.completed_steps.len(), 1, "expansion must not advance the step pointer");
        assert_eq!(memory.steps_plan.len(), 3);
        assert_eq!(memory.steps_plan[1].instruction, "step two a");
        assert_eq!(memory.steps_plan[2].instruction, "step two b");
    }

    #[test]
    fn identifier_sentinel_substitutes_next_unused_id() {
        let mut context = HashMap::new();
        context.insert(
            "mail:last_message_ids".to_string(),
            serde_json::json!(["m1", "m2", "m3"]),
        );
        let mut used = HashSet::new();

        let first = resolve_identifier_sentinel("mail:reply id:MESSAGE_ID body:hi", &context, &mut used);
        assert_eq!(first, "mail:reply id:m1 body:hi");

        let second = resolve_identifier_sentinel("mail:reply id:MESSAGE_ID body:hi", &context, &mut used);
        assert_eq!(second, "mail:reply id:m2 body:hi");
    }

    #[test]
    fn resolved_identifier_sentinel_dispatches_against_mail_reply() {
        // the sentinel substitution yields `id:<value>`, which must resolve
        // against mail:reply's `to` parameter via its `id` alias, not just
        // its `message_id` alias.
        let registry = WorkflowRegistry::new();
        workflows::register_builtins(&registry).unwrap();
        let result = registry.execute("mail:reply id:m1 body:hi", HashMap::new()).unwrap();
        assert_eq!(result.output["replied_to"], "m1");
    }

    #[test]
    fn identifier_sentinel_noop_without_sentinel() {
        let context = HashMap::new();
        let mut used = HashSet::new();
        let command = resolve_identifier_sentinel("mail:list count:5", &context, &mut used);
        assert_eq!(command, "mail:list count:5");
    }

    #[test]
    fn split_namespace_action_requires_colon() {
        assert!(split_namespace_action("noop").is_err());
        let (ns, action) = split_namespace_action("mail:list count:5").unwrap();
        assert_eq!(ns, "mail");
        assert_eq!(action, "list");
    }
}
