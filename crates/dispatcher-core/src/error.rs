//! Core error type shared across the registry, planner, execution loop and
//! generation manager.
//!
//! `AgentError` collects the error taxonomy the original Python agent raised
//! as distinct exception classes (`WorkflowValidationError`,
//! `WorkflowNotFoundError`, `WorkflowExecutionError`, `WorkflowRegistrationError`)
//! plus two categories needed once generation and network transports entered
//! the picture.

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("registration error: {0}")]
    Registration(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
