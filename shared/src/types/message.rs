//! The unit of wire transmission between RPC workers.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::tensor::Tensor;

/// Correlation id linking a request to its response
pub type MessageId = i64;

/// Id carried by a message the transport has not numbered yet
pub const UNSET_MESSAGE_ID: MessageId = -1;

/// Identifier of an RPC worker
pub type WorkerId = i16;

/// Message-type tag.
///
/// The low byte numbers the kind, the high bits flag it as a request or a
/// response. The tag space is open: crates outside this one may mint their
/// own tags with [`MessageType::request`] / [`MessageType::response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageType(u16);

impl MessageType {
    pub const REQUEST_FLAG: u16 = 0x100;
    pub const RESPONSE_FLAG: u16 = 0x200;

    pub const SCRIPT_CALL: MessageType = MessageType::request(0);
    pub const SCRIPT_RET: MessageType = MessageType::response(1);
    pub const PYTHON_CALL: MessageType = MessageType::request(2);
    pub const PYTHON_RET: MessageType = MessageType::response(3);
    pub const RUN_WITH_PROFILING_REQ: MessageType = MessageType::request(19);
    pub const RUN_WITH_PROFILING_RESP: MessageType = MessageType::response(20);
    pub const EXCEPTION: MessageType = MessageType::response(55);

    /// Tag for request kind `kind`
    pub const fn request(kind: u8) -> Self {
        MessageType(kind as u16 | Self::REQUEST_FLAG)
    }

    /// Tag for response kind `kind`
    pub const fn response(kind: u8) -> Self {
        MessageType(kind as u16 | Self::RESPONSE_FLAG)
    }

    pub const fn from_u16(raw: u16) -> Self {
        MessageType(raw)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn is_request(self) -> bool {
        self.0 & Self::REQUEST_FLAG != 0
    }

    pub const fn is_response(self) -> bool {
        self.0 & Self::RESPONSE_FLAG != 0
    }

    fn name(self) -> Option<&'static str> {
        let name = match self {
            MessageType::SCRIPT_CALL => "SCRIPT_CALL",
            MessageType::SCRIPT_RET => "SCRIPT_RET",
            MessageType::PYTHON_CALL => "PYTHON_CALL",
            MessageType::PYTHON_RET => "PYTHON_RET",
            MessageType::RUN_WITH_PROFILING_REQ => "RUN_WITH_PROFILING_REQ",
            MessageType::RUN_WITH_PROFILING_RESP => "RUN_WITH_PROFILING_RESP",
            MessageType::EXCEPTION => "EXCEPTION",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{:#06x}", self.0),
        }
    }
}

/// An RPC message: payload bytes, tensor buffers, a type tag and a correlation id.
///
/// Tensors are reference-counted buffers, so moving them between messages
/// never copies tensor data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    payload: Vec<u8>,
    tensors: Vec<Tensor>,
    message_type: MessageType,
    id: MessageId,
}

impl Message {
    pub fn new(
        payload: Vec<u8>,
        tensors: Vec<Tensor>,
        message_type: MessageType,
        id: MessageId,
    ) -> Self {
        Self {
            payload,
            tensors,
            message_type,
            id,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn set_id(&mut self, id: MessageId) {
        self.id = id;
    }

    pub fn is_request(&self) -> bool {
        self.message_type.is_request()
    }

    pub fn is_response(&self) -> bool {
        self.message_type.is_response()
    }

    /// Move every field out: `(payload, tensors, message_type, id)`.
    pub fn into_parts(self) -> (Vec<u8>, Vec<Tensor>, MessageType, MessageId) {
        (self.payload, self.tensors, self.message_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_response_flags() {
        assert!(MessageType::SCRIPT_CALL.is_request());
        assert!(!MessageType::SCRIPT_CALL.is_response());
        assert!(MessageType::PYTHON_RET.is_response());
        assert!(!MessageType::PYTHON_RET.is_request());
        assert!(MessageType::RUN_WITH_PROFILING_REQ.is_request());
        assert!(MessageType::RUN_WITH_PROFILING_RESP.is_response());
    }

    #[test]
    fn test_tag_values() {
        assert_eq!(MessageType::RUN_WITH_PROFILING_REQ.as_u16(), 0x113);
        assert_eq!(MessageType::RUN_WITH_PROFILING_RESP.as_u16(), 0x214);
        assert_eq!(MessageType::from_u16(0x102), MessageType::PYTHON_CALL);
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageType::PYTHON_CALL.to_string(), "PYTHON_CALL");
        assert_eq!(MessageType::request(42).to_string(), "0x012a");
    }

    #[test]
    fn test_into_parts_moves_everything() {
        let mut msg = Message::new(b"abc".to_vec(), vec![], MessageType::PYTHON_CALL, 3);
        msg.set_id(9);
        let (payload, tensors, ty, id) = msg.into_parts();
        assert_eq!(payload, b"abc");
        assert!(tensors.is_empty());
        assert_eq!(ty, MessageType::PYTHON_CALL);
        assert_eq!(id, 9);
    }
}
