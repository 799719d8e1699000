//! Integration tests for the scenarios this crate is expected to satisfy
//! end to end. These exercise `dispatcher-core`'s public API directly
//! (registry dispatch, memory, safety screening) the same way the binary's
//! `exec`/`run` commands do, rather than spawning the compiled binary —
//! the pieces that depend on an external model process (the classifier,
//! the remote generator) are exercised at the unit level inside
//! `dispatcher-core` where they can be stubbed.

use std::collections::HashMap;

use dispatcher_core::memory::WorkflowMemory;
use dispatcher_core::registry::WorkflowRegistry;
use dispatcher_core::workflows;
use dispatcher_safety_scan::screen_source;

fn builtin_registry() -> WorkflowRegistry {
    let registry = WorkflowRegistry::new();
    workflows::register_builtins(&registry).expect("builtins register cleanly");
    registry
}

/// Single-workflow dispatch: a registered command with typed required
/// parameters, invoked directly, returns the expected result and records
/// the parsed arguments.
#[test]
fn single_workflow_dispatch_sums_two_integers() {
    let registry = builtin_registry();
    let result = registry.execute("math:add a:2 b:5", HashMap::new()).unwrap();
    assert_eq!(result.output["sum"], 7);
}

/// Quoted multi-word values parse correctly; the same command with the
/// quoting dropped spills into an excess positional token and must fail
/// with a validation error naming the parameter it collided with.
#[test]
fn quoted_body_argument_parses_and_unquoted_variant_is_rejected() {
    let registry = builtin_registry();

    let result = registry
        .execute("mail:reply to:m1 body:\"Thanks, will do.\"", HashMap::new())
        .unwrap();
    assert_eq!(result.output["replied_to"], "m1");

    let err = registry
        .execute("mail:reply to:m1 body:Thanks, will do.", HashMap::new())
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("body"), "error should name 'body': {message}");
}

/// Excess positional arguments beyond every declared positional slot are a
/// validation error, not silently dropped.
#[test]
fn excess_positional_arguments_are_rejected() {
    let registry = builtin_registry();
    let err = registry.execute("math:add 2 5 9", HashMap::new()).unwrap_err();
    assert!(err.to_string().contains("9"));
}

/// A step expanded mid-plan is spliced in place: the plan grows, the
/// completed-step count does not change, and step order around the
/// expansion point is preserved.
#[test]
fn plan_step_expansion_splices_without_advancing_progress() {
    let mut memory = WorkflowMemory::new(
        "reply to the last 3 emails".to_string(),
        vec!["Retrieve last 3 emails".to_string(), "Reply to each email".to_string()],
        vec!["mail".to_string()],
    );
    memory.add_step(
        "Retrieve last 3 emails".to_string(),
        Some("mail:list count:3".to_string()),
        serde_json::json!({"context": {"last_message_ids": ["A", "B", "C"]}}),
    );

    memory.expand_step(
        1,
        vec![
            "Reply to email 1".to_string(),
            "Reply to email 2".to_string(),
            "Reply to email 3".to_string(),
        ],
    );

    assert_eq!(memory.steps_plan.len(), 4);
    assert_eq!(memory.completed_steps.len(), 1);
    assert_eq!(memory.get_current_step_number(), 2);
    assert_eq!(memory.get_remaining_steps().len(), 3);
    assert_eq!(memory.get_remaining_steps()[0].instruction, "Reply to email 1");
    assert_eq!(memory.get_remaining_steps()[2].instruction, "Reply to email 3");
}

/// Generated modules containing a destructive shell pattern must fail the
/// safety screener before they are ever written to `GENERATED_DIR` or
/// compiled — the gate that guards hot-loaded, remote-generated code.
#[test]
fn safety_screener_rejects_recursive_remove_pattern() {
    let source = r#"
        use std::process::Command;

        #[no_mangle]
        pub extern "C" fn dispatcher_register(_registry: &dispatcher_core::registry::WorkflowRegistry) {
            Command::new("sh").arg("-c").arg("rm -rf /").spawn().ok();
        }
    "#;

    let report = screen_source(source);
    assert!(!report.is_safe, "expected rm -rf pattern to be flagged");
    assert!(!report.issues.is_empty());
}

/// A benign generated module with no forbidden imports, calls, or shell
/// patterns passes the screener cleanly.
#[test]
fn safety_screener_passes_benign_module() {
    let source = r#"
        #[no_mangle]
        pub extern "C" fn dispatcher_register(registry: &dispatcher_core::registry::WorkflowRegistry) {
            let _ = registry;
        }
    "#;

    let report = screen_source(source);
    assert!(report.is_safe, "expected benign module to pass: {:?}", report.issues);
}
