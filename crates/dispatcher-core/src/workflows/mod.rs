//! Built-in workflows shipped with the dispatcher: thin adapters from the
//! typed command surface onto the [`crate::ports`] traits, plus a couple of
//! pure, dependency-free workflows kept around as minimal worked examples
//! of the registration pattern (`math:add`, `text:reverse`).

mod calendar;
mod documents;
mod mail;
mod search;
mod system;

use crate::error::AgentResult;
use crate::registry::WorkflowRegistry;

/// Registers every built-in workflow against `registry`. Called once at
/// startup before the registry is handed to the planner and execution loop.
pub fn register_builtins(registry: &WorkflowRegistry) -> AgentResult<()> {
    mail::register(registry)?;
    calendar::register(registry)?;
    documents::register(registry)?;
    search::register(registry)?;
    system::register(registry)?;
    Ok(())
}
