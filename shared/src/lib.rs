//! Shared types and codecs for profwire
//!
//! This crate contains the message and tensor types, the tuple codec, and the
//! wrapped payload codec used by the profiling envelope and its tooling.

pub mod error;
pub mod protocol;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{ProtocolError, Result};
pub use protocol::value::Value;
pub use types::{message::*, profiler::*, tensor::*};
