//! `doc:*` workflows — merge, convert — backed by [`crate::ports::DocumentPort`].
//!
//! The port itself is the opaque seam onto the real PDF/PPTX/DOCX codecs
//! (out of scope per spec §1); these handlers only resolve arguments and
//! forward to it.

use crate::error::AgentResult;
use crate::registry::{
    ParameterSpec, ParameterType, ParsedArguments, WorkflowContext, WorkflowRegistry, WorkflowSpec,
};

pub fn register(registry: &WorkflowRegistry) -> AgentResult<()> {
    registry.register(
        WorkflowSpec::new("doc", "merge", "merges multiple documents into one", merge_handler)
            .with_description("Merges a comma-separated list of file paths into a single document.")
            .with_parameter(ParameterSpec::new("files", ParameterType::String).required().position(0))
            .with_metadata("category", "DOCUMENT COMMANDS")
            .with_metadata("usage", "doc:merge files:a.pdf,b.pdf,c.pdf"),
    )?;

    registry.register(
        WorkflowSpec::new("doc", "convert", "converts a document to another format", convert_handler)
            .with_description("Converts a file at a given path to the requested output format.")
            .with_parameter(ParameterSpec::new("input", ParameterType::String).required().position(0))
            .with_parameter(ParameterSpec::new("to", ParameterType::String).required())
            .with_metadata("category", "DOCUMENT COMMANDS")
            .with_metadata("usage", "doc:convert input to:FORMAT"),
    )?;

    Ok(())
}

fn merge_handler(ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let files: Vec<String> = args
        .get_required("files")?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let output = ctx.ports.documents.merge(&files)?;
    Ok(serde_json::json!({"merged_path": output, "input_count": files.len()}))
}

fn convert_handler(ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let input = args.get_required("input")?;
    let to = args.get_required("to")?;
    let output = ctx.ports.documents.convert(input, to)?;
    Ok(serde_json::json!({"converted_path": output}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Ports;
    use std::collections::HashMap;

    fn registry_with_documents() -> WorkflowRegistry {
        let registry = WorkflowRegistry::with_ports(Ports::default());
        register(&registry).unwrap();
        registry
    }

    #[test]
    fn merge_counts_inputs() {
        let registry = registry_with_documents();
        let result = registry
            .execute("doc:merge files:a.pdf,b.pdf,c.pdf", HashMap::new())
            .unwrap();
        assert_eq!(result.output["input_count"], 3);
    }

    #[test]
    fn convert_changes_extension() {
        let registry = registry_with_documents();
        let result = registry.execute("doc:convert report.docx to:pdf", HashMap::new()).unwrap();
        assert_eq!(result.output["converted_path"], "report.pdf");
    }
}
