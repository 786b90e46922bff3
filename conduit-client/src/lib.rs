//! Provider client contract, a deterministic mock implementation, and a
//! named registry for holding multiple clients alongside their retry
//! and health-check configuration.

mod client;
mod error;
mod manager;
mod mock;
mod options;

pub use client::Client;
pub use error::ClientError;
pub use manager::{ClientManager, HealthCheckConfig, RetryConfig};
pub use mock::{MockClient, MockToolCall};
pub use options::{ChatOptions, ResponseFormat, ResponseFormatKind, UsageHandler, UsageMetadata};
