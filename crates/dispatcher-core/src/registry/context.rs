//! Execution context handed to every workflow handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ports::Ports;

use super::spec::WorkflowSpec;
use super::WorkflowRegistry;

/// Everything a handler needs besides its parsed arguments: the raw command
/// text it was invoked with, a handle back to the registry (so a handler
/// can dispatch other workflows, e.g. `doc:merge` calling `doc:convert`),
/// the shared effect ports, and free-form extras threaded in by the
/// execution loop (the active memory's context map, primarily).
#[derive(Clone)]
pub struct WorkflowContext {
    pub raw_command: String,
    pub registry: WorkflowRegistry,
    pub ports: Arc<Ports>,
    pub extras: HashMap<String, serde_json::Value>,
}

impl WorkflowContext {
    pub fn new(
        raw_command: String,
        registry: WorkflowRegistry,
        ports: Arc<Ports>,
        extras: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            raw_command,
            registry,
            ports,
            extras,
        }
    }

    /// Returns a copy of this context with one extra key set, leaving the
    /// original untouched.
    pub fn with_extra(&self, key: &str, value: serde_json::Value) -> Self {
        let mut extras = self.extras.clone();
        extras.insert(key.to_string(), value);
        Self {
            raw_command: self.raw_command.clone(),
            registry: self.registry.clone(),
            ports: self.ports.clone(),
            extras,
        }
    }

    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extras.get(key)
    }
}

/// The result of a single successful `WorkflowRegistry::execute` call.
pub struct WorkflowExecutionResult {
    pub spec: Arc<WorkflowSpec>,
    pub arguments: super::parser::ParsedArguments,
    pub output: serde_json::Value,
}
