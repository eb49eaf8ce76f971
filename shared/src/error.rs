//! Error type shared by the profwire codecs and the profiling envelope.

use thiserror::Error;

use crate::types::message::MessageType;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Incorrect message type: expected {expected}, got {actual}")]
    UnexpectedMessageType {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("Wrapped payload should not be empty")]
    EmptyWrappedPayload,

    #[error("Expected payload of size {expected} but got {actual}")]
    TupleArity { expected: usize, actual: usize },

    #[error("Messages wrapped with profiling requests must be requests, got {0}")]
    NotARequest(MessageType),

    #[error("Wrapped command is not available on an outbound profiling request")]
    WrappedCommandUnavailable,

    #[error("Wrapped payload too short: {len} bytes cannot hold the size trailer")]
    WrappedPayloadTooShort { len: usize },

    #[error("Wrong payload sizes: payload is {payload} bytes but additional payload is {additional} bytes")]
    WrappedPayloadSize { payload: usize, additional: u64 },

    #[error("Malformed value: expected {expected}, got {actual}")]
    MalformedValue {
        expected: &'static str,
        actual: String,
    },

    #[error("Tensor slot {index} out of range for a table of {len} tensors")]
    TensorSlot { index: u32, len: usize },

    #[error("Tensor data is {actual} bytes but shape {shape:?} of {dtype} needs {expected}")]
    TensorSize {
        dtype: &'static str,
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Tensor shape {shape:?} of {dtype} overflows the addressable size")]
    TensorOverflow {
        dtype: &'static str,
        shape: Vec<usize>,
    },

    #[error("Profiling requests nested more than {max} deep")]
    EnvelopeDepth { max: usize },

    #[error("No request decoder registered for message type {0}")]
    UnknownMessageType(MessageType),

    #[error("A request decoder is already registered for message type {0}")]
    DuplicateDecoder(MessageType),

    #[error("Codec version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl ProtocolError {
    /// Build a [`ProtocolError::MalformedValue`] from anything printable.
    pub fn malformed(expected: &'static str, actual: impl std::fmt::Display) -> Self {
        ProtocolError::MalformedValue {
            expected,
            actual: actual.to_string(),
        }
    }

    /// Whether this error reports a broken caller invariant or peer protocol
    /// mismatch, as opposed to a failure inside the byte codec.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, ProtocolError::Serialization(_))
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_message_names_sizes() {
        let err = ProtocolError::TupleArity {
            expected: 3,
            actual: 4,
        };
        assert_eq!(err.to_string(), "Expected payload of size 3 but got 4");
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_not_a_request_uses_symbolic_name() {
        let err = ProtocolError::NotARequest(MessageType::PYTHON_RET);
        assert!(err.to_string().contains("PYTHON_RET"));
    }
}
