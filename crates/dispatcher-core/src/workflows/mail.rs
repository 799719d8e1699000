//! `mail:*` workflows — list, reply, send — backed by [`crate::ports::MailPort`].
//!
//! `mail:list` keeps the original's custom parser for free-text invocations
//! like "last 5 from alice" alongside the standard `count:`/`sender:`
//! key:value form, since users type the former far more often than the
//! latter.

use regex::Regex;

use crate::error::{AgentError, AgentResult};
use crate::registry::{
    ParameterSpec, ParameterType, ParsedArguments, WorkflowContext, WorkflowRegistry, WorkflowSpec,
};

pub fn register(registry: &WorkflowRegistry) -> AgentResult<()> {
    registry.register(
        WorkflowSpec::new("mail", "list", "lists recent messages", list_handler)
            .with_description("Lists the most recent mail messages, optionally filtered by sender or a text query.")
            .with_parameter(ParameterSpec::new("count", ParameterType::Integer).default("5"))
            .with_parameter(ParameterSpec::new("sender", ParameterType::String))
            .with_parameter(ParameterSpec::new("query", ParameterType::String))
            .with_custom_parser(parse_mail_list),
    )?;

    registry.register(
        WorkflowSpec::new("mail", "reply", "replies to a message", reply_handler)
            .with_description("Replies to an existing message by id.")
            .with_parameter(ParameterSpec::new("to", ParameterType::String).required().alias("message_id").alias("id"))
            .with_parameter(ParameterSpec::new("body", ParameterType::String).required()),
    )?;

    registry.register(
        WorkflowSpec::new("mail", "send", "sends a new message", send_handler)
            .with_description("Sends a brand new message.")
            .with_parameter(ParameterSpec::new("to", ParameterType::String).required().position(0))
            .with_parameter(ParameterSpec::new("subject", ParameterType::String).required())
            .with_parameter(ParameterSpec::new("body", ParameterType::String).required()),
    )?;

    Ok(())
}

fn list_handler(ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let count: usize = args.get("count").unwrap_or("5").parse().unwrap_or(5);
    let sender = args.get("sender");
    let query = args.get("query");
    let messages = ctx.ports.mail.list(count, sender, query)?;
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    Ok(serde_json::json!({
        "messages": messages.iter().map(|m| serde_json::json!({
            "id": m.id, "sender": m.sender, "subject": m.subject, "body": m.body,
        })).collect::<Vec<_>>(),
        // promoted by the execution loop into memory.context as
        // "mail:last_message_ids"
        "context": {"last_message_ids": ids},
    }))
}

fn reply_handler(ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let to = args.get_required("to")?;
    let body = args.get_required("body")?;
    ctx.ports.mail.reply(to, body)?;
    Ok(serde_json::json!({"replied_to": to}))
}

fn send_handler(ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let to = args.get_required("to")?;
    let subject = args.get_required("subject")?;
    let body = args.get_required("body")?;
    let id = ctx.ports.mail.send(to, subject, body)?;
    Ok(serde_json::json!({"sent_id": id}))
}

/// Custom parser for `mail:list`: recognizes the free-text "last N [from
/// SENDER]" phrasing in addition to `count:`/`sender:`/`query:` tokens, and
/// extracts a bare email address from free text as an implicit sender
/// filter.
fn parse_mail_list(raw_args: &str, parameters: &[ParameterSpec]) -> AgentResult<ParsedArguments> {
    let last_n = Regex::new(r"(?i)last\s+(\d+)").expect("valid regex");
    let email = Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").expect("valid regex");

    if raw_args.trim().is_empty() {
        return crate::registry::default_parse_arguments(raw_args, parameters);
    }

    // if it reads like key:value tokens, defer to the default parser
    if raw_args.contains(':') || raw_args.contains('=') {
        return crate::registry::default_parse_arguments(raw_args, parameters);
    }

    let mut parsed = ParsedArguments::default();
    let count = last_n
        .captures(raw_args)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    if let Some(count) = &count {
        count
            .parse::<i64>()
            .map_err(|_| AgentError::Validation(format!("'{count}' is not a valid count")))?;
        parsed.insert("count", count.clone());
    } else {
        parsed.insert("count", "5".to_string());
    }

    if let Some(m) = email.find(raw_args) {
        parsed.insert("sender", m.as_str().to_string());
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Ports;
    use std::collections::HashMap;

    fn registry_with_mail() -> WorkflowRegistry {
        let registry = WorkflowRegistry::with_ports(Ports::default());
        register(&registry).unwrap();
        registry
    }

    #[test]
    fn list_defaults_to_five() {
        let registry = registry_with_mail();
        let result = registry.execute("mail:list", HashMap::new()).unwrap();
        assert!(result.output["messages"].as_array().unwrap().len() <= 5);
    }

    #[test]
    fn free_text_last_n_is_parsed() {
        let parsed = parse_mail_list("last 2 from alice@example.com", &[]).unwrap();
        assert_eq!(parsed.get("count"), Some("2"));
        assert_eq!(parsed.get("sender"), Some("alice@example.com"));
    }

    #[test]
    fn reply_records_against_mail_port() {
        let registry = registry_with_mail();
        let result = registry
            .execute("mail:reply to:m1 body:\"thanks!\"", HashMap::new())
            .unwrap();
        assert_eq!(result.output["replied_to"], "m1");
    }
}
