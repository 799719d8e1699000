//! `WorkflowSpec` and `ParameterSpec` — the typed description of a single
//! registered command.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, AgentResult};

use super::context::WorkflowContext;
use super::parser::{default_parse_arguments, ParsedArguments};

/// The coercion applied to a raw argument token once it has been resolved
/// to a parameter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Integer,
    Float,
    Bool,
}

const TRUTHY: &[&str] = &["true", "1", "yes", "y", "on"];
const FALSEY: &[&str] = &["false", "0", "no", "n", "off"];

/// Describes one named or positional argument a workflow accepts.
#[derive(Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub param_type: ParameterType,
    pub required: bool,
    pub default: Option<String>,
    pub aliases: Vec<String>,
    /// 0-based slot this parameter fills when supplied positionally
    /// (i.e. without a `key:value`/`key=value` prefix).
    pub position: Option<usize>,
}

impl ParameterSpec {
    pub fn new(name: &str, param_type: ParameterType) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            param_type,
            required: false,
            default: None,
            aliases: Vec::new(),
            position: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn position(mut self, index: usize) -> Self {
        self.position = Some(index);
        self
    }

    /// Normalizes and type-checks a raw string token, raising
    /// `AgentError::Validation` when the value doesn't fit `param_type`.
    pub fn parse_value(&self, raw: &str) -> AgentResult<String> {
        match self.param_type {
            ParameterType::Bool => {
                let lowered = raw.to_lowercase();
                if TRUTHY.contains(&lowered.as_str()) {
                    Ok("true".to_string())
                } else if FALSEY.contains(&lowered.as_str()) {
                    Ok("false".to_string())
                } else {
                    Err(AgentError::Validation(format!(
                        "parameter '{}' expects a boolean, got '{raw}'",
                        self.name
                    )))
                }
            }
            ParameterType::Integer => raw.parse::<i64>().map(|_| raw.to_string()).map_err(|_| {
                AgentError::Validation(format!(
                    "parameter '{}' expects an integer, got '{raw}'",
                    self.name
                ))
            }),
            ParameterType::Float => raw.parse::<f64>().map(|_| raw.to_string()).map_err(|_| {
                AgentError::Validation(format!(
                    "parameter '{}' expects a number, got '{raw}'",
                    self.name
                ))
            }),
            ParameterType::String => Ok(raw.to_string()),
        }
    }
}

pub type WorkflowHandler =
    fn(&WorkflowContext, &ParsedArguments) -> AgentResult<serde_json::Value>;

/// A registered workflow: its identity, its parameter contract, and the
/// handler invoked once arguments have been parsed.
#[derive(Clone)]
pub struct WorkflowSpec {
    pub namespace: String,
    pub name: String,
    pub summary: String,
    pub description: String,
    pub handler: WorkflowHandler,
    pub parameters: Vec<ParameterSpec>,
    /// Overrides the default key:value/positional parser for workflows
    /// whose command syntax doesn't fit that mold (e.g. free-text queries).
    pub parameter_parser: Option<fn(&str, &[ParameterSpec]) -> AgentResult<ParsedArguments>>,
    pub preferred_llm: Option<String>,
    pub safety_tags: Vec<String>,
    pub auto_retry: bool,
    pub max_retries: u32,
    pub metadata: HashMap<String, String>,
}

impl WorkflowSpec {
    pub fn new(namespace: &str, name: &str, summary: &str, handler: WorkflowHandler) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            summary: summary.to_string(),
            description: String::new(),
            handler,
            parameters: Vec::new(),
            parameter_parser: None,
            preferred_llm: None,
            safety_tags: Vec::new(),
            auto_retry: false,
            max_retries: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, param: ParameterSpec) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_description(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    pub fn with_custom_parser(
        mut self,
        parser: fn(&str, &[ParameterSpec]) -> AgentResult<ParsedArguments>,
    ) -> Self {
        self.parameter_parser = Some(parser);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn command_key(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    pub fn parse_arguments(&self, raw_args: &str) -> AgentResult<ParsedArguments> {
        match self.parameter_parser {
            Some(parser) => parser(raw_args, &self.parameters),
            None => default_parse_arguments(raw_args, &self.parameters),
        }
    }

    /// Renders a deterministic usage string, e.g. `mail:send to subject body`.
    pub fn usage_string(&self) -> String {
        let mut positional: Vec<&ParameterSpec> =
            self.parameters.iter().filter(|p| p.position.is_some()).collect();
        positional.sort_by_key(|p| p.position.unwrap());
        let named: Vec<&ParameterSpec> =
            self.parameters.iter().filter(|p| p.position.is_none()).collect();

        let mut parts = vec![self.command_key()];
        for p in positional {
            parts.push(if p.required {
                p.name.clone()
            } else {
                format!("[{}]", p.name)
            });
        }
        for p in named {
            parts.push(if p.required {
                format!("{}:<{}>", p.name, p.name)
            } else {
                format!("[{}:<{}>]", p.name, p.name)
            });
        }
        parts.join(" ")
    }
}

/// Convenience wrapper used by handlers that need a registry back-reference
/// without creating a true Arc cycle.
pub type SharedSpec = Arc<WorkflowSpec>;
