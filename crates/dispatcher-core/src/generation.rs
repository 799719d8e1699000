//! Generation manager — the third execution tier. When no registered
//! workflow can satisfy a step, this drives a bounded number of attempts to
//! have a remote model write one, screen it, compile it, and hot-load it
//! into the running registry (spec §4.H).
//!
//! Grounded on `WorkflowGenerationManager`/`GenerationOutcome` in
//! `original_source/agent/executor/dynamic_workflow.py`: a per-command
//! attempt table, a retry loop that accumulates errors across attempts, and
//! re-dispatch of the original command once generation succeeds. The
//! original's `importlib` hot-reload has no safe equivalent for a compiled
//! language, so this implementation instead compiles the generated source
//! to a `cdylib` with a `rustc` subprocess (mirroring the teacher's own
//! `tokio::process::Command` idiom in `acp/process.rs`) and `dlopen`s it
//! via `libloading`, calling an exported `dispatcher_register` symbol.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::error::{AgentError, AgentResult};
use crate::llm::remote::GenerationContext;
use crate::llm::RemoteModelClient;
use crate::planner::NewWorkflowRequest;
use crate::registry::WorkflowRegistry;

/// Exported symbol a generated module must define: given a handle to the
/// live registry, register whatever workflow(s) the module implements.
///
/// `WorkflowRegistry` is `Clone` and its registration method takes `&self`,
/// so the generated module only needs a shared reference — it never
/// mutates the registry's own fields directly, only calls `register`.
pub type RegisterFn = unsafe extern "C" fn(&WorkflowRegistry);

const REGISTER_SYMBOL: &[u8] = b"dispatcher_register\0";

/// Per-command-key generation attempt bookkeeping.
#[derive(Default)]
struct AttemptState {
    count: u32,
    errors: Vec<String>,
}

/// Outcome of one `ensure_workflow` call.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub success: bool,
    pub output: Option<serde_json::Value>,
    pub errors: Vec<String>,
    pub provenance: Option<String>,
}

impl GenerationOutcome {
    fn failure(errors: Vec<String>) -> Self {
        Self { success: false, output: None, errors, provenance: None }
    }
}

pub struct GenerationManager {
    registry: WorkflowRegistry,
    config: RuntimeConfig,
    remote: RemoteModelClient,
    attempts: Mutex<HashMap<String, AttemptState>>,
}

impl GenerationManager {
    pub fn new(registry: WorkflowRegistry, config: RuntimeConfig, remote: RemoteModelClient) -> Self {
        Self { registry, config, remote, attempts: Mutex::new(HashMap::new()) }
    }

    /// Whether another remote-generation attempt is allowed for `command_key`:
    /// the remote client must be configured, and the per-key attempt count
    /// must not have exhausted `remote_generator_max_attempts`.
    pub fn can_attempt(&self, command_key: &str) -> bool {
        if !self.remote.is_configured() {
            return false;
        }
        let attempts = self.attempts.lock().expect("generation attempt table poisoned");
        attempts
            .get(command_key)
            .map(|s| s.count)
            .unwrap_or(0)
            < self.config.remote_generator_max_attempts
    }

    /// Drives the bounded attempt loop for `command_key`: generate, screen,
    /// compile, hot-load, then re-dispatch `command` against the
    /// newly-registered workflow. Returns on the first successful dispatch;
    /// accumulates an error per failed attempt otherwise.
    pub async fn ensure_workflow(
        &self,
        request: &NewWorkflowRequest,
        command: &str,
        extras: HashMap<String, serde_json::Value>,
    ) -> GenerationOutcome {
        let command_key = request.command_key();

        if !self.remote.is_configured() {
            return GenerationOutcome::failure(vec!["remote generator is not configured".to_string()]);
        }

        loop {
            let (attempt_number, previous_errors) = {
                let mut attempts = self.attempts.lock().expect("generation attempt table poisoned");
                let state = attempts.entry(command_key.clone()).or_default();
                if state.count >= self.config.remote_generator_max_attempts {
                    return GenerationOutcome::failure(state.errors.clone());
                }
                state.count += 1;
                (state.count, state.errors.clone())
            };

            info!(command_key, attempt_number, "attempting workflow generation");

            match self.attempt_once(request, command, &extras, &previous_errors).await {
                Ok(outcome) => return outcome,
                Err(message) => {
                    let mut attempts = self.attempts.lock().expect("generation attempt table poisoned");
                    attempts.entry(command_key.clone()).or_default().errors.push(message);
                }
            }
        }
    }

    /// Runs exactly one generate/screen/compile/load/dispatch cycle. `Ok`
    /// means this attempt's final dispatch succeeded or definitively failed
    /// in a way that should stop the loop; `Err(message)` records a
    /// recoverable failure and lets the caller retry.
    async fn attempt_once(
        &self,
        request: &NewWorkflowRequest,
        command: &str,
        extras: &HashMap<String, serde_json::Value>,
        previous_errors: &[String],
    ) -> Result<GenerationOutcome, String> {
        let context = self.build_generation_context(request, command, previous_errors);

        let module = self
            .remote
            .generate(
                &self.config.remote_generator_model,
                self.config.remote_generator_temperature,
                self.config.remote_generator_max_tokens,
                &context,
            )
            .await
            .map_err(|e| e.to_string())?;

        let screen = dispatcher_safety_scan::screen_source(&module.module_code);
        if !screen.is_safe {
            return Err(format!("safety screen rejected generated module: {}", screen.issues.join("; ")));
        }

        let module_path = self.module_path(request);
        std::fs::create_dir_all(&self.config.generated_dir)
            .map_err(|e| format!("failed to create generated workflow dir: {e}"))?;
        std::fs::write(&module_path, &module.module_code)
            .map_err(|e| format!("failed to write generated module: {e}"))?;

        match self.compile_and_load(&module_path) {
            Ok(()) => {}
            Err(e) => {
                let _ = std::fs::remove_file(&module_path);
                return Err(e);
            }
        }

        match self.registry.execute(command, extras.clone()) {
            Ok(result) => Ok(GenerationOutcome {
                success: true,
                output: Some(result.output),
                errors: Vec::new(),
                provenance: Some(format!(
                    "\u{1f916} workflow '{}' generated automatically via {}.",
                    request.command_key(),
                    self.config.remote_generator_model
                )),
            }),
            Err(e) => Err(format!("generated workflow registered but dispatch failed: {e}")),
        }
    }

    fn module_path(&self, request: &NewWorkflowRequest) -> PathBuf {
        self.config
            .generated_dir
            .join(format!("{}_{}.rs", request.namespace, request.action))
    }

    fn build_generation_context(
        &self,
        request: &NewWorkflowRequest,
        command: &str,
        previous_errors: &[String],
    ) -> GenerationContext {
        let existing_workflows: Vec<String> = self
            .registry
            .iter_workflows()
            .iter()
            .map(|spec| spec.command_key())
            .collect();

        GenerationContext {
            command: command.to_string(),
            summary: format!("{}:{} — {}", request.namespace, request.action, request.description),
            description: request.prompt_hint.clone(),
            command_reference: crate::command_reference::build_command_reference(&self.registry),
            registry_source: REGISTRY_SOURCE_HINT.to_string(),
            sample_workflows: HashMap::new(),
            tool_summaries: HashMap::new(),
            existing_workflows,
            previous_errors: previous_errors.to_vec(),
        }
    }

    /// Compiles `source_path` to a `cdylib` with a `rustc` subprocess, then
    /// `dlopen`s it and calls its exported `dispatcher_register` symbol
    /// against the live registry.
    ///
    /// # Safety assumption
    ///
    /// The loaded library is assumed to have been compiled against the same
    /// `dispatcher_core` version as this process (resolved via the
    /// workspace's own build artifacts), so `WorkflowRegistry`'s layout and
    /// the `RegisterFn` ABI match on both sides of the `dlopen` boundary.
    /// The library is intentionally leaked (never `dlclose`d) so function
    /// pointers it registered stay valid for the process's remaining
    /// lifetime.
    fn compile_and_load(&self, source_path: &Path) -> Result<(), String> {
        let dylib_path = source_path.with_extension(dylib_extension());
        let deps_dir = locate_deps_dir()?;

        let status = std::process::Command::new("rustc")
            .arg("--edition").arg("2021")
            .arg("--crate-type").arg("cdylib")
            .arg("-L").arg(&deps_dir)
            .arg("--extern").arg(format!("dispatcher_core={}", locate_rlib(&deps_dir, "dispatcher_core")?.display()))
            .arg("--extern").arg(format!("serde_json={}", locate_rlib(&deps_dir, "serde_json")?.display()))
            .arg("-o").arg(&dylib_path)
            .arg(source_path)
            .status()
            .map_err(|e| format!("failed to spawn rustc: {e}"))?;

        if !status.success() {
            return Err(format!("rustc exited with {status}"));
        }

        let library = unsafe { libloading::Library::new(&dylib_path) }
            .map_err(|e| format!("failed to load compiled workflow: {e}"))?;
        let register: libloading::Symbol<RegisterFn> = unsafe { library.get(REGISTER_SYMBOL) }
            .map_err(|e| format!("compiled workflow has no '{}' symbol: {e}", String::from_utf8_lossy(REGISTER_SYMBOL)))?;

        unsafe { register(&self.registry) };

        // keep the mapped library resident — its registered function
        // pointers must stay valid for as long as the registry does.
        std::mem::forget(library);
        Ok(())
    }
}

const REGISTRY_SOURCE_HINT: &str = "\
pub fn register(registry: &WorkflowRegistry) -> AgentResult<()> {
    registry.register(
        WorkflowSpec::new(\"namespace\", \"action\", \"summary\", handler)
            .with_parameter(ParameterSpec::new(\"arg\", ParameterType::String).required().position(0)),
    )
}
";

fn dylib_extension() -> &'static str {
    if cfg!(target_os = "macos") {
        "dylib"
    } else if cfg!(target_os = "windows") {
        "dll"
    } else {
        "so"
    }
}

/// Finds the workspace's own `target/{debug,release}/deps` directory by
/// walking up from the current executable's location — cargo places every
/// dependency's compiled `.rlib` there (not directly under `target/debug`,
/// which holds only the final binary/cdylib artifacts), and the generated
/// module must link against the exact rlibs this process was built with.
fn locate_deps_dir() -> Result<PathBuf, String> {
    let exe = std::env::current_exe().map_err(|e| format!("could not resolve current executable: {e}"))?;
    let mut dir = exe.as_path();
    while let Some(parent) = dir.parent() {
        if parent.file_name().map(|n| n == "debug" || n == "release").unwrap_or(false) {
            return Ok(parent.join("deps"));
        }
        dir = parent;
    }
    Err("could not locate a target/{debug,release}/deps directory from the current executable".to_string())
}

/// Finds the newest `lib<crate_name>-*.rlib` under `deps_dir`. Multiple
/// versions can accumulate across incremental builds; the most recently
/// modified one is the one this process actually linked against.
fn locate_rlib(deps_dir: &Path, crate_name: &str) -> Result<PathBuf, String> {
    let prefix = format!("lib{crate_name}-");
    let entries = std::fs::read_dir(deps_dir)
        .map_err(|e| format!("failed to list {}: {e}", deps_dir.display()))?;
    let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".rlib") {
            let modified = entry.metadata().and_then(|m| m.modified()).unwrap_or(std::time::UNIX_EPOCH);
            candidates.push((modified, entry.path()));
        }
    }
    candidates.sort_by_key(|(t, _)| *t);
    candidates.pop().map(|(_, path)| path).ok_or_else(|| format!(
        "no {prefix}*.rlib found under {} — build the workspace in this profile first",
        deps_dir.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RemoteModelClient;

    fn manager() -> GenerationManager {
        GenerationManager::new(
            WorkflowRegistry::new(),
            RuntimeConfig::from_env(),
            RemoteModelClient::new(None, None),
        )
    }

    #[test]
    fn cannot_attempt_when_remote_unconfigured() {
        let manager = manager();
        assert!(!manager.can_attempt("math:cube"));
    }

    #[tokio::test]
    async fn ensure_workflow_fails_fast_when_unconfigured() {
        let manager = manager();
        let request = NewWorkflowRequest {
            namespace: "math".to_string(),
            action: "cube".to_string(),
            description: "cubes a number".to_string(),
            prompt_hint: "implement math:cube n:NUMBER".to_string(),
        };
        let outcome = manager.ensure_workflow(&request, "math:cube n:3", HashMap::new()).await;
        assert!(!outcome.success);
        assert!(!outcome.errors.is_empty());
    }
}
