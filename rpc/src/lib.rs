//! Profiling envelope for RPC requests
//!
//! This library wraps an outgoing RPC request with distributed-profiling
//! metadata, and unwraps it on the receiving side back into the metadata and
//! the reconstructed request.

pub mod command;
pub mod commands;
pub mod profiling;
pub mod registry;

pub use command::RpcCommand;
pub use profiling::{
    split_metadata, InboundProfilingRequest, OutboundProfilingRequest, ProfilingMetadata,
    ProfilingRequest, MAX_ENVELOPE_DEPTH,
};
pub use registry::{RequestDecoder, RequestRegistry};
