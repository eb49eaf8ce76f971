//! Value types carried over the wire

pub mod message;
pub mod profiler;
pub mod tensor;
