//! `system:*`, `math:*`, `text:*` workflows — pure, dependency-free
//! built-ins.
//!
//! `math:add` and `text:reverse` need no network call or filesystem access,
//! so they double as worked examples of the registration pattern and ground
//! the registry/parser test suite without an LLM round trip.
//! `system:scan_directory` is the one built-in that does real I/O, kept
//! local rather than behind a port since it only ever touches the caller's
//! own filesystem.

use std::path::Path;

use crate::error::{AgentError, AgentResult};
use crate::registry::{
    ParameterSpec, ParameterType, ParsedArguments, WorkflowContext, WorkflowRegistry, WorkflowSpec,
};

pub fn register(registry: &WorkflowRegistry) -> AgentResult<()> {
    registry.register(
        WorkflowSpec::new("math", "add", "adds two numbers together", math_add_handler)
            .with_description("Performs addition of two integers and returns the result.")
            .with_parameter(ParameterSpec::new("a", ParameterType::Integer).required().position(0))
            .with_parameter(ParameterSpec::new("b", ParameterType::Integer).required().position(1))
            .with_metadata("category", "MATH COMMANDS")
            .with_metadata("usage", "math:add a:NUMBER b:NUMBER"),
    )?;

    registry.register(
        WorkflowSpec::new("text", "reverse", "reverses a string", text_reverse_handler)
            .with_description("Reverses the characters of the given text.")
            .with_parameter(ParameterSpec::new("input", ParameterType::String).required().position(0))
            .with_metadata("category", "TEXT COMMANDS")
            .with_metadata("usage", "text:reverse input"),
    )?;

    registry.register(
        WorkflowSpec::new("system", "scan_directory", "lists files and subdirectories", scan_directory_handler)
            .with_description("Scans a directory and returns its immediate entries with basic metadata.")
            .with_parameter(ParameterSpec::new("path", ParameterType::String).required().position(0))
            .with_parameter(ParameterSpec::new("show_hidden", ParameterType::Bool).default("false"))
            .with_metadata("category", "SYSTEM COMMANDS")
            .with_metadata("usage", "system:scan_directory path [show_hidden:true|false]"),
    )?;

    Ok(())
}

fn math_add_handler(_ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let a: i64 = args.get_required("a")?.parse().expect("validated by ParameterType::Integer");
    let b: i64 = args.get_required("b")?.parse().expect("validated by ParameterType::Integer");
    Ok(serde_json::json!({"sum": a + b}))
}

fn text_reverse_handler(_ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let input = args.get_required("input")?;
    let reversed: String = input.chars().rev().collect();
    Ok(serde_json::json!({"reversed": reversed}))
}

fn scan_directory_handler(_ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let path = args.get_required("path")?;
    let show_hidden = matches!(args.get("show_hidden"), Some("true"));

    let dir = Path::new(path);
    if !dir.exists() {
        return Err(AgentError::Execution(format!("path does not exist: {path}")));
    }
    if !dir.is_dir() {
        return Err(AgentError::Execution(format!("path is not a directory: {path}")));
    }

    let mut entries = Vec::new();
    let read_dir = std::fs::read_dir(dir)
        .map_err(|e| AgentError::Execution(format!("failed to scan directory: {e}")))?;
    for entry in read_dir {
        let entry = entry.map_err(|e| AgentError::Execution(format!("failed to read entry: {e}")))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !show_hidden && name.starts_with('.') {
            continue;
        }
        let metadata = entry
            .metadata()
            .map_err(|e| AgentError::Execution(format!("failed to stat entry: {e}")))?;
        entries.push(serde_json::json!({
            "name": name,
            "is_dir": metadata.is_dir(),
            "is_file": metadata.is_file(),
            "size": metadata.len(),
        }));
    }
    entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    Ok(serde_json::json!({"scanned_path": path, "entries": entries}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn registry() -> WorkflowRegistry {
        let registry = WorkflowRegistry::new();
        register(&registry).unwrap();
        registry
    }

    #[test]
    fn math_add_sums_positional_arguments() {
        let result = registry().execute("math:add 2 5", HashMap::new()).unwrap();
        assert_eq!(result.output["sum"], 7);
    }

    #[test]
    fn text_reverse_reverses_input() {
        let result = registry().execute("text:reverse hello", HashMap::new()).unwrap();
        assert_eq!(result.output["reversed"], "olleh");
    }

    #[test]
    fn scan_directory_lists_temp_dir_entries() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"hi").unwrap();
        let command = format!("system:scan_directory \"{}\"", tmp.path().display());
        let result = registry().execute(&command, HashMap::new()).unwrap();
        let entries = result.output["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["name"], "a.txt");
    }

    #[test]
    fn scan_directory_rejects_missing_path() {
        let err = registry().execute("system:scan_directory /no/such/path", HashMap::new()).unwrap_err();
        assert!(matches!(err, AgentError::Execution(_)));
    }
}
