//! Error type for tool registration, parsing, and execution.

use conduit_core::FlowError;

/// Errors produced while registering, detecting, or executing tools.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No tool is registered under the requested name.
    #[error("tool '{0}' not found")]
    NotFound(String),

    /// A tool's executor returned a failure.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The arguments given to a tool were malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A tool call was detected but no registry is present on the
    /// request context.
    #[error("no tools available in context")]
    NoToolsAvailable,

    /// Underlying carrier/flow failure surfaced while running a tool.
    #[error("flow error: {0}")]
    Flow(#[from] FlowError),
}
