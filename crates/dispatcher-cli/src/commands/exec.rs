//! `dispatcher exec "namespace:name arg1 arg2"` — dispatches a single
//! already-formed command directly against the registry, bypassing the
//! planner entirely. Useful for scripting and for debugging a workflow in
//! isolation from the classifier/planner round trip.

use std::collections::HashMap;

use super::{build_registry, print_json};

pub async fn run(command: &str) -> Result<(), String> {
    let registry = build_registry()?;
    let result = registry.execute(command, HashMap::new()).map_err(|e| e.to_string())?;
    print_json(&result.output);
    Ok(())
}
