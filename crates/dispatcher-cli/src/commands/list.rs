//! `dispatcher list` — prints the deterministic command reference for
//! every registered workflow.

use dispatcher_core::command_reference::build_command_reference;

use super::build_registry;

pub async fn run() -> Result<(), String> {
    let registry = build_registry()?;
    println!("{}", build_command_reference(&registry));
    Ok(())
}
