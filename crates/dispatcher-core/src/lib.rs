//! dispatcher-core — transport-agnostic planning and dispatch engine.
//!
//! Turns a free-form natural-language request into an ordered sequence of
//! executions against a registry of typed workflows. Three execution tiers
//! cooperate on every request:
//!
//! - an in-process local model answers directly when no external data or
//!   tool is needed ([`llm::local`]),
//! - a registered [`registry::WorkflowSpec`] is dispatched when an existing
//!   command matches ([`registry`]),
//! - a large remote model generates and installs a brand new workflow when
//!   neither of the above applies ([`generation`]).
//!
//! [`execution`] drives one request end to end, consulting [`planner`] at
//! the request level and at each step, and threading [`memory::WorkflowMemory`]
//! through the whole walk.

pub mod command_reference;
pub mod config;
pub mod error;
pub mod execution;
pub mod generation;
pub mod llm;
pub mod memory;
pub mod planner;
pub mod ports;
pub mod registry;
pub mod workflows;

pub use error::AgentError;
pub use memory::WorkflowMemory;
pub use registry::{WorkflowRegistry, WorkflowSpec};
