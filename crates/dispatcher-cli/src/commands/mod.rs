//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and builds its own
//! `dispatcher_core::registry::WorkflowRegistry` — the CLI process never
//! persists anything across invocations, so there is no shared `AppState`
//! to initialize up front.

pub mod exec;
pub mod list;
pub mod run;

use dispatcher_core::config::RuntimeConfig;
use dispatcher_core::llm::RemoteModelClient;
use dispatcher_core::registry::WorkflowRegistry;
use dispatcher_core::workflows;

/// Builds a fresh registry with every built-in workflow registered.
pub fn build_registry() -> Result<WorkflowRegistry, String> {
    let registry = WorkflowRegistry::new();
    workflows::register_builtins(&registry).map_err(|e| e.to_string())?;
    Ok(registry)
}

pub fn remote_client(config: &RuntimeConfig) -> RemoteModelClient {
    RemoteModelClient::new(
        config.remote_generator_endpoint.clone(),
        config.remote_generator_api_key.clone(),
    )
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
