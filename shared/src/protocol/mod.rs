//! Wire protocol definitions
//!
//! `wire` holds the tuple codec, `wrapped` splices a metadata blob onto an
//! existing payload.

pub mod value;
pub mod wire;
pub mod wrapped;
