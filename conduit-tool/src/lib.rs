//! Tool registry, call detection, and bounded-concurrency execution.
//!
//! A [`Tool`] wraps a [`conduit_core::Handler`] with a name, description,
//! and JSON-Schema parameter shape. A [`Registry`] groups tools and is
//! placed on a request context by [`registry_handler`]. [`Detect`] sniffs
//! a bounded prefix of a model response to decide whether it carries the
//! canonical tool-call envelope, and [`Execute`] parses, runs, and
//! formats the resulting calls.

pub mod detector;
pub mod error;
pub mod executor;
pub mod parser;
pub mod schema;
pub mod tool;
pub mod types;

pub use detector::{Detect, DEFAULT_DETECT_BUFFER};
pub use error::ToolError;
pub use executor::{Execute, ExecuteOptions};
pub use parser::{parse_tool_calls, TOOL_CALLS_MARKER};
pub use schema::{format_tools_as_openai, to_gemini_json, to_ollama_json, to_openai_json, ToolSchema};
pub use tool::{default_string_schema, registry_handler, tools_from_context, Registry, Tool};
pub use types::{ToolCall, ToolResult};
