//! Error type for the agent loop.

use conduit_client::ClientError;
use conduit_core::FlowError;
use conduit_tool::ToolError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("failed to decode multimodal input: {0}")]
    InvalidMultimodalInput(String),
}

impl AgentError {
    /// Wraps this error for propagation through a [`conduit_core::Handler`]
    /// chain as a [`FlowError::Handler`].
    #[must_use]
    pub fn into_flow_error(self) -> FlowError {
        match self {
            AgentError::Flow(e) => e,
            other => FlowError::from_handler(other),
        }
    }
}
