//! Workflow registry — a thread-safe catalog of typed commands.
//!
//! A [`WorkflowSpec`] pairs a `namespace:name` command key with a handler
//! and a [`ParameterSpec`] list describing how to parse the raw argument
//! string. [`WorkflowRegistry`] holds specs behind a `Mutex`, guarding only
//! registration/lookup — handlers run with the lock released so a handler
//! that itself dispatches through the registry (an expanded step, a
//! generated workflow calling a builtin) can never deadlock.

mod context;
mod parser;
mod spec;

pub use context::{WorkflowContext, WorkflowExecutionResult};
pub use parser::{default_parse_arguments, ParsedArguments};
pub use spec::{ParameterSpec, ParameterType, WorkflowHandler, WorkflowSpec};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{AgentError, AgentResult};
use crate::ports::Ports;

/// Metadata surfaced for the deterministic command-reference text.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    pub namespace: String,
    pub name: String,
    pub usage: String,
    pub summary: String,
    pub category: String,
}

#[derive(Default)]
struct RegistryInner {
    specs: HashMap<String, Arc<WorkflowSpec>>,
    /// insertion order, so exports and listings are stable across runs
    order: Vec<String>,
    /// bumped on every successful registration; lets callers (the planner's
    /// category-scoped command reference cache) detect when a dynamically
    /// generated workflow has changed what's available without comparing
    /// the whole catalogue.
    generation: u64,
}

/// Thread-safe catalog of registered workflows.
///
/// Cloning a `WorkflowRegistry` is cheap and shares the same underlying
/// catalog (it wraps an `Arc<Mutex<..>>`), which lets generated workflow
/// modules hold their own handle without borrowing across an FFI boundary.
#[derive(Clone)]
pub struct WorkflowRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    ports: Arc<Ports>,
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            ports: Arc::new(Ports::default()),
        }
    }
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports(ports: Ports) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            ports: Arc::new(ports),
        }
    }

    pub fn ports(&self) -> &Arc<Ports> {
        &self.ports
    }

    /// Registers a spec under its `namespace:name` key. Fails if the key
    /// is already taken — command keys are not overwritable at runtime.
    pub fn register(&self, spec: WorkflowSpec) -> AgentResult<()> {
        let key = spec.command_key();
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        if inner.specs.contains_key(&key) {
            return Err(AgentError::Registration(format!(
                "workflow '{key}' is already registered"
            )));
        }
        inner.order.push(key.clone());
        inner.specs.insert(key, Arc::new(spec));
        inner.generation += 1;
        Ok(())
    }

    /// Monotonically increasing counter bumped on every successful
    /// registration. Used to invalidate caches keyed on "what's registered"
    /// without snapshotting the whole catalogue to compare.
    pub fn generation(&self) -> u64 {
        self.inner.lock().expect("registry mutex poisoned").generation
    }

    /// Returns a snapshot of all registered specs. Iterating the snapshot
    /// never holds the registry lock, so a handler invoked from the
    /// snapshot is free to register new workflows of its own.
    pub fn iter_workflows(&self) -> Vec<Arc<WorkflowSpec>> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .order
            .iter()
            .filter_map(|key| inner.specs.get(key).cloned())
            .collect()
    }

    pub fn get(&self, command_key: &str) -> AgentResult<Arc<WorkflowSpec>> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .specs
            .get(command_key)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("workflow '{command_key}' not found")))
    }

    pub fn list(&self, namespace: Option<&str>) -> Vec<Arc<WorkflowSpec>> {
        self.iter_workflows()
            .into_iter()
            .filter(|spec| match namespace {
                Some(ns) => spec.namespace == ns,
                None => true,
            })
            .collect()
    }

    pub fn export_command_info(&self) -> Vec<CommandInfo> {
        self.iter_workflows()
            .iter()
            .map(|spec| CommandInfo {
                namespace: spec.namespace.clone(),
                name: spec.name.clone(),
                usage: spec.usage_string(),
                summary: spec.summary.clone(),
                category: spec
                    .metadata
                    .get("category")
                    .cloned()
                    .unwrap_or_else(|| format!("{} COMMANDS", spec.namespace.to_uppercase())),
            })
            .collect()
    }

    /// Splits `raw_command` into `namespace:name` and the remaining argument
    /// text, looks up the spec, parses arguments, and invokes the handler.
    ///
    /// Any error the handler returns that is not already an [`AgentError`]
    /// is wrapped as `AgentError::Execution`.
    pub fn execute(
        &self,
        raw_command: &str,
        extras: HashMap<String, serde_json::Value>,
    ) -> AgentResult<WorkflowExecutionResult> {
        let (command_key, raw_args) = split_command(raw_command)?;
        let spec = self.get(&command_key)?;
        let arguments = spec.parse_arguments(raw_args)?;
        let ctx = WorkflowContext::new(raw_command.to_string(), self.clone(), self.ports.clone(), extras);
        let output = (spec.handler)(&ctx, &arguments).map_err(|e| match e {
            AgentError::Validation(_) | AgentError::NotFound(_) | AgentError::Execution(_) => e,
            other => AgentError::Execution(other.to_string()),
        })?;
        Ok(WorkflowExecutionResult {
            spec,
            arguments,
            output,
        })
    }
}

/// Validates and splits `namespace:name arg1 arg2 ...` into the command key
/// and the remaining argument text.
///
/// Splits on the first space to separate the command head from its
/// arguments, then requires the head to contain exactly the `namespace:name`
/// form.
fn split_command(raw_command: &str) -> AgentResult<(String, &str)> {
    let trimmed = raw_command.trim();
    if !trimmed.contains(':') {
        return Err(AgentError::Validation(format!(
            "command '{raw_command}' is missing a ':' between namespace and name"
        )));
    }
    let (head, rest) = match trimmed.split_once(' ') {
        Some((h, r)) => (h, r),
        None => (trimmed, ""),
    };
    if !head.contains(':') {
        return Err(AgentError::Validation(format!(
            "command '{raw_command}' is missing a ':' between namespace and name"
        )));
    }
    Ok((head.to_string(), rest.trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::spec::{ParameterSpec, ParameterType, WorkflowSpec};

    fn noop_spec(namespace: &str, name: &str) -> WorkflowSpec {
        WorkflowSpec::new(namespace, name, "does nothing", |_ctx, _args| {
            Ok(serde_json::json!({"ok": true}))
        })
    }

    #[test]
    fn register_and_get_roundtrip() {
        let registry = WorkflowRegistry::new();
        registry.register(noop_spec("math", "add")).unwrap();
        let spec = registry.get("math:add").unwrap();
        assert_eq!(spec.name, "add");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = WorkflowRegistry::new();
        registry.register(noop_spec("math", "add")).unwrap();
        let err = registry.register(noop_spec("math", "add")).unwrap_err();
        assert!(matches!(err, AgentError::Registration(_)));
    }

    #[test]
    fn execute_dispatches_by_command_key() {
        let registry = WorkflowRegistry::new();
        registry
            .register(WorkflowSpec::new(
                "math",
                "add",
                "adds two numbers",
                |_ctx, args| {
                    let a: i64 = args.get_required("a")?.parse().unwrap();
                    let b: i64 = args.get_required("b")?.parse().unwrap();
                    Ok(serde_json::json!({"sum": a + b}))
                },
            ).with_parameter(ParameterSpec::new("a", ParameterType::Integer).required().position(0))
             .with_parameter(ParameterSpec::new("b", ParameterType::Integer).required().position(1)))
            .unwrap();

        let result = registry
            .execute("math:add 2 3", HashMap::new())
            .unwrap();
        assert_eq!(result.output["sum"], 5);
    }

    #[test]
    fn split_command_requires_colon() {
        let err = split_command("nocolon here").unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn split_command_rejects_colon_after_first_space() {
        let err = split_command("list namespace:name a b").unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }
}
