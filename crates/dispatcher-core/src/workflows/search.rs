//! `search:*` workflows — backed by [`crate::ports::WebSearchPort`].

use crate::error::AgentResult;
use crate::registry::{
    ParameterSpec, ParameterType, ParsedArguments, WorkflowContext, WorkflowRegistry, WorkflowSpec,
};

pub fn register(registry: &WorkflowRegistry) -> AgentResult<()> {
    registry.register(
        WorkflowSpec::new("search", "web", "searches the web for a query", web_handler)
            .with_description("Runs a web search and returns the top ranked results.")
            .with_parameter(ParameterSpec::new("query", ParameterType::String).required().position(0))
            .with_parameter(ParameterSpec::new("count", ParameterType::Integer).default("5"))
            .with_metadata("category", "SEARCH COMMANDS")
            .with_metadata("usage", "search:web query [count:N]"),
    )?;

    Ok(())
}

fn web_handler(ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let query = args.get_required("query")?;
    let count: usize = args.get("count").unwrap_or("5").parse().unwrap_or(5);
    let results = ctx.ports.search.search(query, count)?;
    Ok(serde_json::json!({
        "results": results.iter().map(|r| serde_json::json!({
            "title": r.title, "url": r.url, "snippet": r.snippet,
        })).collect::<Vec<_>>(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Ports;
    use std::collections::HashMap;

    #[test]
    fn search_respects_requested_count() {
        let registry = WorkflowRegistry::with_ports(Ports::default());
        register(&registry).unwrap();
        let result = registry.execute("search:web \"rust async runtimes\" count:3", HashMap::new()).unwrap();
        assert_eq!(result.output["results"].as_array().unwrap().len(), 3);
    }
}
