//! `calendar:*` workflows — list, create — backed by [`crate::ports::CalendarPort`].

use crate::error::AgentResult;
use crate::registry::{
    ParameterSpec, ParameterType, ParsedArguments, WorkflowContext, WorkflowRegistry, WorkflowSpec,
};

pub fn register(registry: &WorkflowRegistry) -> AgentResult<()> {
    registry.register(
        WorkflowSpec::new("calendar", "list", "lists events in a date range", list_handler)
            .with_description("Lists calendar events between two ISO-8601 dates.")
            .with_parameter(ParameterSpec::new("from", ParameterType::String).required())
            .with_parameter(ParameterSpec::new("to", ParameterType::String).required())
            .with_metadata("category", "CALENDAR COMMANDS")
            .with_metadata("usage", "calendar:list from:DATE to:DATE"),
    )?;

    registry.register(
        WorkflowSpec::new("calendar", "create", "creates a new event", create_handler)
            .with_description("Creates a calendar event with a title, start time, and optional attendees.")
            .with_parameter(ParameterSpec::new("title", ParameterType::String).required().position(0))
            .with_parameter(ParameterSpec::new("start", ParameterType::String).required())
            .with_parameter(ParameterSpec::new("attendees", ParameterType::String).default(""))
            .with_metadata("category", "CALENDAR COMMANDS")
            .with_metadata("usage", "calendar:create title start:DATE [attendees:a@x.com,b@x.com]"),
    )?;

    Ok(())
}

fn list_handler(ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let from = args.get_required("from")?;
    let to = args.get_required("to")?;
    let events = ctx.ports.calendar.list(from, to)?;
    Ok(serde_json::json!({
        "events": events.iter().map(|e| serde_json::json!({
            "id": e.id, "title": e.title, "start": e.start, "attendees": e.attendees,
        })).collect::<Vec<_>>(),
    }))
}

fn create_handler(ctx: &WorkflowContext, args: &ParsedArguments) -> AgentResult<serde_json::Value> {
    let title = args.get_required("title")?;
    let start = args.get_required("start")?;
    let attendees: Vec<String> = args
        .get("attendees")
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let id = ctx.ports.calendar.create(title, start, attendees)?;
    Ok(serde_json::json!({"event_id": id}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Ports;
    use std::collections::HashMap;

    fn registry_with_calendar() -> WorkflowRegistry {
        let registry = WorkflowRegistry::with_ports(Ports::default());
        register(&registry).unwrap();
        registry
    }

    #[test]
    fn create_then_list_roundtrips() {
        let registry = registry_with_calendar();
        let created = registry
            .execute(
                "calendar:create \"Launch review\" start:2026-08-01T10:00 attendees:a@x.com,b@x.com",
                HashMap::new(),
            )
            .unwrap();
        assert!(created.output["event_id"].as_str().is_some());

        let listed = registry
            .execute("calendar:list from:2026-01-01 to:2026-12-31", HashMap::new())
            .unwrap();
        let events = listed.output["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["title"], "Launch review");
        assert_eq!(events[0]["attendees"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn missing_required_date_is_rejected() {
        let registry = registry_with_calendar();
        let err = registry.execute("calendar:list from:2026-01-01", HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("to"));
    }
}
