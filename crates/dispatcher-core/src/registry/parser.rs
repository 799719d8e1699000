//! Default argument parser: POSIX shell-word tokenizing plus
//! `key:value` / `key=value` / positional resolution.

use std::collections::HashMap;

use crate::error::{AgentError, AgentResult};

use super::spec::ParameterSpec;

/// Arguments resolved to parameter names, after type coercion and default
/// application. Values are kept as strings (handlers call `.parse()`
/// themselves) since parameter types only gate validation here.
#[derive(Debug, Clone, Default)]
pub struct ParsedArguments {
    values: HashMap<String, String>,
}

impl ParsedArguments {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn get_required(&self, name: &str) -> AgentResult<&str> {
        self.get(name).ok_or_else(|| {
            AgentError::Validation(format!("missing required parameter '{name}'"))
        })
    }

    pub fn insert(&mut self, name: &str, value: String) {
        self.values.insert(name.to_string(), value);
    }
}

/// Resolves an alias or canonical name to its parameter's canonical name.
fn resolve_alias_map(parameters: &[ParameterSpec]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for param in parameters {
        map.insert(param.name.clone(), param.name.clone());
        for alias in &param.aliases {
            map.insert(alias.clone(), param.name.clone());
        }
    }
    map
}

/// Tokenizes `raw_args` with POSIX shell-word rules, then resolves each
/// token as `key:value`, `key=value`, or — if it matches neither — the
/// next unfilled positional parameter in declared position order.
///
/// All missing-required-parameter failures are collected and reported in
/// a single combined error rather than one-at-a-time, so a caller fixes
/// every mistake in a command on the first retry.
pub fn default_parse_arguments(
    raw_args: &str,
    parameters: &[ParameterSpec],
) -> AgentResult<ParsedArguments> {
    let tokens = shell_words::split(raw_args)
        .map_err(|e| AgentError::Validation(format!("could not tokenize arguments: {e}")))?;

    let alias_map = resolve_alias_map(parameters);
    let mut positional: Vec<&ParameterSpec> =
        parameters.iter().filter(|p| p.position.is_some()).collect();
    positional.sort_by_key(|p| p.position.unwrap());

    let mut resolved: HashMap<String, String> = HashMap::new();
    let mut positional_cursor = 0usize;
    let mut last_named_key: Option<String> = None;
    let mut excess: Vec<String> = Vec::new();

    for token in &tokens {
        let (key, value) = if let Some((k, v)) = split_kv(token, ':') {
            (Some(k), v)
        } else if let Some((k, v)) = split_kv(token, '=') {
            (Some(k), v)
        } else {
            (None, token.as_str())
        };

        match key.and_then(|k| alias_map.get(k).cloned()) {
            Some(canonical) => {
                resolved.insert(canonical.clone(), value.to_string());
                last_named_key = Some(canonical);
            }
            None => {
                if positional_cursor < positional.len() {
                    let name = positional[positional_cursor].name.clone();
                    resolved.insert(name, token.clone());
                    positional_cursor += 1;
                } else {
                    excess.push(token.clone());
                }
            }
        }
    }

    if !excess.is_empty() {
        return Err(AgentError::Validation(match &last_named_key {
            Some(key) => format!(
                "unexpected extra argument(s) {:?} — did you forget to quote the value for '{key}'?",
                excess
            ),
            None => format!("unexpected extra argument(s): {}", excess.join(", ")),
        }));
    }

    let mut missing = Vec::new();
    let mut parsed = ParsedArguments::default();
    for param in parameters {
        match resolved.get(&param.name) {
            Some(raw) => {
                let value = param.parse_value(raw)?;
                parsed.insert(&param.name, value);
            }
            None => {
                if let Some(default) = &param.default {
                    parsed.insert(&param.name, default.clone());
                } else if param.required {
                    missing.push(param.name.clone());
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(AgentError::Validation(format!(
            "missing required parameter(s): {}",
            missing.join(", ")
        )));
    }

    Ok(parsed)
}

fn split_kv(token: &str, sep: char) -> Option<(&str, &str)> {
    let idx = token.find(sep)?;
    // avoid splitting a bare URL or value that merely contains ':' deep in
    // the token by requiring the key portion to look like an identifier
    let key = &token[..idx];
    if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    Some((key, &token[idx + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::spec::ParameterType;

    fn spec(name: &str, ty: ParameterType) -> ParameterSpec {
        ParameterSpec::new(name, ty)
    }

    #[test]
    fn resolves_key_value_pairs() {
        let params = vec![spec("to", ParameterType::String), spec("subject", ParameterType::String)];
        let parsed = default_parse_arguments("to:alice@example.com subject:\"hello there\"", &params).unwrap();
        assert_eq!(parsed.get("to"), Some("alice@example.com"));
        assert_eq!(parsed.get("subject"), Some("hello there"));
    }

    #[test]
    fn resolves_positional_parameters_in_order() {
        let params = vec![
            spec("a", ParameterType::Integer).position(0),
            spec("b", ParameterType::Integer).position(1),
        ];
        let parsed = default_parse_arguments("2 3", &params).unwrap();
        assert_eq!(parsed.get("a"), Some("2"));
        assert_eq!(parsed.get("b"), Some("3"));
    }

    #[test]
    fn applies_defaults_and_aliases() {
        let params = vec![
            spec("count", ParameterType::Integer).default("5").alias("n"),
        ];
        let parsed = default_parse_arguments("", &params).unwrap();
        assert_eq!(parsed.get("count"), Some("5"));

        let parsed = default_parse_arguments("n:9", &params).unwrap();
        assert_eq!(parsed.get("count"), Some("9"));
    }

    #[test]
    fn bool_truthy_falsey_normalization() {
        let params = vec![spec("urgent", ParameterType::Bool)];
        let parsed = default_parse_arguments("urgent:Yes", &params).unwrap();
        assert_eq!(parsed.get("urgent"), Some("true"));
        let parsed = default_parse_arguments("urgent:0", &params).unwrap();
        assert_eq!(parsed.get("urgent"), Some("false"));
    }

    #[test]
    fn unquoted_whitespace_value_rejected_as_excess_argument() {
        let params = vec![
            spec("id", ParameterType::String).required(),
            spec("body", ParameterType::String).required(),
        ];
        let parsed = default_parse_arguments(
            "id:abc body:\"Thanks, will do.\"",
            &params,
        )
        .unwrap();
        assert_eq!(parsed.get("id"), Some("abc"));
        assert_eq!(parsed.get("body"), Some("Thanks, will do."));

        let err = default_parse_arguments("id:abc body:Thanks, will do.", &params).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("body"), "error should name 'body': {msg}");
    }

    #[test]
    fn missing_required_parameters_collected() {
        let params = vec![
            spec("a", ParameterType::String).required(),
            spec("b", ParameterType::String).required(),
        ];
        let err = default_parse_arguments("", &params).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains('a') && msg.contains('b'));
    }
}
