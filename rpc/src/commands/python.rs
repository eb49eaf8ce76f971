//! Calls whose payload is an opaque, already-pickled blob.

use std::any::Any;

use profwire_shared::{Message, MessageType, Result, Tensor, UNSET_MESSAGE_ID};

use crate::command::{expect_type, RpcCommand};

/// A call carrying a pickled user function and its arguments.
///
/// The payload is passed through byte for byte; tensors referenced by the
/// pickle travel in the message tensor list.
#[derive(Debug, Clone, PartialEq)]
pub struct PythonCall {
    pickled_payload: Vec<u8>,
    tensors: Vec<Tensor>,
}

impl PythonCall {
    pub fn new(pickled_payload: Vec<u8>, tensors: Vec<Tensor>) -> Self {
        Self {
            pickled_payload,
            tensors,
        }
    }

    pub fn pickled_payload(&self) -> &[u8] {
        &self.pickled_payload
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn from_message(message: Message) -> Result<Self> {
        expect_type(message.message_type(), MessageType::PYTHON_CALL)?;
        let (payload, tensors, _, _) = message.into_parts();
        Ok(Self::new(payload, tensors))
    }
}

impl RpcCommand for PythonCall {
    fn message_type(&self) -> MessageType {
        MessageType::PYTHON_CALL
    }

    fn into_message(self: Box<Self>) -> Result<Message> {
        Ok(Message::new(
            self.pickled_payload,
            self.tensors,
            MessageType::PYTHON_CALL,
            UNSET_MESSAGE_ID,
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Return value of a [`PythonCall`].
#[derive(Debug, Clone, PartialEq)]
pub struct PythonResp {
    pickled_payload: Vec<u8>,
    tensors: Vec<Tensor>,
}

impl PythonResp {
    pub fn new(pickled_payload: Vec<u8>, tensors: Vec<Tensor>) -> Self {
        Self {
            pickled_payload,
            tensors,
        }
    }

    pub fn pickled_payload(&self) -> &[u8] {
        &self.pickled_payload
    }

    pub fn from_message(message: Message) -> Result<Self> {
        expect_type(message.message_type(), MessageType::PYTHON_RET)?;
        let (payload, tensors, _, _) = message.into_parts();
        Ok(Self::new(payload, tensors))
    }
}

impl RpcCommand for PythonResp {
    fn message_type(&self) -> MessageType {
        MessageType::PYTHON_RET
    }

    fn into_message(self: Box<Self>) -> Result<Message> {
        Ok(Message::new(
            self.pickled_payload,
            self.tensors,
            MessageType::PYTHON_RET,
            UNSET_MESSAGE_ID,
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profwire_shared::ProtocolError;

    #[test]
    fn test_payload_passes_through() {
        let tensor = Tensor::from_bytes(vec![1u8, 2]);
        let call = PythonCall::new(b"ABCD".to_vec(), vec![tensor.clone()]);
        let msg = Box::new(call.clone()).into_message().unwrap();
        assert_eq!(msg.payload(), b"ABCD");
        assert_eq!(msg.id(), UNSET_MESSAGE_ID);
        assert!(msg.tensors()[0].shares_buffer_with(&tensor));

        assert_eq!(PythonCall::from_message(msg).unwrap(), call);
    }

    #[test]
    fn test_wrong_type_rejected() {
        let msg = Message::new(b"x".to_vec(), vec![], MessageType::PYTHON_RET, 1);
        assert!(matches!(
            PythonCall::from_message(msg),
            Err(ProtocolError::UnexpectedMessageType {
                expected: MessageType::PYTHON_CALL,
                ..
            })
        ));
    }

    #[test]
    fn test_response_is_response() {
        let resp = PythonResp::new(b"ok".to_vec(), vec![]);
        let msg = Box::new(resp).into_message().unwrap();
        assert!(msg.is_response());
        assert_eq!(PythonResp::from_message(msg).unwrap().pickled_payload(), b"ok");
    }
}
