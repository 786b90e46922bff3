//! Input classification, schema injection, provider dispatch, tool-call
//! detection, execution, and synthesis, composed into a single
//! [`conduit_core::Handler`].
//!
//! [`Agent::new`] builds that handler from a
//! [`conduit_client::Client`] and an [`AgentOptions`]. With no tools
//! configured it is a thin pass-through to the client; with tools it
//! runs the full loop documented on [`agent`].

mod agent;
mod classifier;
mod error;
mod options;
mod types;

pub use agent::Agent;
pub use classifier::classify;
pub use error::AgentError;
pub use options::{AgentOptions, ToolResultFormatter};
pub use types::{ClassifiedInput, ClassifiedKind, ContentPart, ContentPartKind, MultimodalInput};
