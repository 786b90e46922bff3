//! Streaming handler and flow primitives.
//!
//! A [`Handler`] consumes a [`Request`] and produces a [`Response`]; a
//! [`Flow`] wires a sequence of handlers together with in-memory pipes so
//! each stage's output streams directly into the next stage's input
//! without buffering the whole message at every hop.

pub mod carrier;
pub mod error;
pub mod flow;
pub mod handler;

pub use carrier::{
    read_to_string, read_to_vec, write_bytes, write_string, Context, Request, Response,
};
pub use error::{BoxError, FlowError};
pub use flow::{chain, Flow, PassThrough};
pub use handler::Handler;
