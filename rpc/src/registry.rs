//! Tag-keyed factory turning request messages into commands.

use std::collections::HashMap;

use profwire_shared::{Message, MessageType, ProtocolError, Result};
use tracing::debug;

use crate::command::RpcCommand;
use crate::commands::{PythonCall, ScriptCall};
use crate::profiling::InboundProfilingRequest;

/// Rebuilds one request kind from its message.
///
/// Decoders receive the registry so wrapping kinds can reconstruct their inner request.
pub type RequestDecoder = fn(Message, &RequestRegistry) -> Result<Box<dyn RpcCommand>>;

fn decode_script_call(message: Message, _: &RequestRegistry) -> Result<Box<dyn RpcCommand>> {
    Ok(Box::new(ScriptCall::from_message(message)?))
}

fn decode_python_call(message: Message, _: &RequestRegistry) -> Result<Box<dyn RpcCommand>> {
    Ok(Box::new(PythonCall::from_message(message)?))
}

fn decode_profiling_request(
    message: Message,
    registry: &RequestRegistry,
) -> Result<Box<dyn RpcCommand>> {
    Ok(Box::new(InboundProfilingRequest::from_message(
        message, registry,
    )?))
}

/// Open set of request decoders keyed by message type.
#[derive(Clone)]
pub struct RequestRegistry {
    decoders: HashMap<MessageType, RequestDecoder>,
}

impl RequestRegistry {
    /// Registry with no decoders
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registry preloaded with every request kind this crate defines.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(MessageType, RequestDecoder); 3] = [
            (MessageType::SCRIPT_CALL, decode_script_call),
            (MessageType::PYTHON_CALL, decode_python_call),
            (MessageType::RUN_WITH_PROFILING_REQ, decode_profiling_request),
        ];
        for (message_type, decoder) in builtins {
            registry.decoders.insert(message_type, decoder);
        }
        registry
    }

    /// Add a decoder for a request tag.
    pub fn register(&mut self, message_type: MessageType, decoder: RequestDecoder) -> Result<()> {
        if !message_type.is_request() {
            return Err(ProtocolError::NotARequest(message_type));
        }
        if self.decoders.contains_key(&message_type) {
            return Err(ProtocolError::DuplicateDecoder(message_type));
        }
        self.decoders.insert(message_type, decoder);
        Ok(())
    }

    pub fn contains(&self, message_type: MessageType) -> bool {
        self.decoders.contains_key(&message_type)
    }

    /// Reconstruct the command a request message encodes.
    pub fn deserialize_request(&self, message: Message) -> Result<Box<dyn RpcCommand>> {
        let message_type = message.message_type();
        if !message.is_request() {
            return Err(ProtocolError::NotARequest(message_type));
        }
        let decoder = self
            .decoders
            .get(&message_type)
            .ok_or(ProtocolError::UnknownMessageType(message_type))?;
        debug!(%message_type, id = message.id(), "deserializing request");
        decoder(message, self)
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for RequestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.decoders.keys().copied().collect();
        tags.sort();
        f.debug_struct("RequestRegistry")
            .field("decoders", &tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profwire_shared::UNSET_MESSAGE_ID;

    #[test]
    fn test_builtins_registered() {
        let registry = RequestRegistry::default();
        assert!(registry.contains(MessageType::SCRIPT_CALL));
        assert!(registry.contains(MessageType::PYTHON_CALL));
        assert!(registry.contains(MessageType::RUN_WITH_PROFILING_REQ));
        assert!(!RequestRegistry::new().contains(MessageType::PYTHON_CALL));
    }

    #[test]
    fn test_dispatch_by_tag() {
        let registry = RequestRegistry::with_builtins();
        let msg = Message::new(b"ABCD".to_vec(), vec![], MessageType::PYTHON_CALL, 5);
        let command = registry.deserialize_request(msg).unwrap();
        assert_eq!(command.message_type(), MessageType::PYTHON_CALL);
        let call = command.downcast_ref::<PythonCall>().unwrap();
        assert_eq!(call.pickled_payload(), b"ABCD");
    }

    #[test]
    fn test_responses_rejected() {
        let registry = RequestRegistry::with_builtins();
        let msg = Message::new(b"x".to_vec(), vec![], MessageType::PYTHON_RET, 5);
        assert!(matches!(
            registry.deserialize_request(msg),
            Err(ProtocolError::NotARequest(MessageType::PYTHON_RET))
        ));
    }

    #[test]
    fn test_unknown_request_rejected() {
        let registry = RequestRegistry::with_builtins();
        let tag = MessageType::request(77);
        let msg = Message::new(b"x".to_vec(), vec![], tag, UNSET_MESSAGE_ID);
        assert!(matches!(
            registry.deserialize_request(msg),
            Err(ProtocolError::UnknownMessageType(t)) if t == tag
        ));
    }

    #[test]
    fn test_register_custom_kind() {
        let mut registry = RequestRegistry::new();
        let tag = MessageType::request(80);
        registry
            .register(tag, |message, _| {
                let (payload, tensors, _, _) = message.into_parts();
                Ok(Box::new(PythonCall::new(payload, tensors)))
            })
            .unwrap();

        let command = registry
            .deserialize_request(Message::new(b"custom".to_vec(), vec![], tag, 1))
            .unwrap();
        assert!(command.downcast_ref::<PythonCall>().is_some());
    }

    #[test]
    fn test_register_guards() {
        let mut registry = RequestRegistry::with_builtins();
        assert!(matches!(
            registry.register(MessageType::PYTHON_CALL, |m, _| {
                Ok(Box::new(PythonCall::from_message(m)?))
            }),
            Err(ProtocolError::DuplicateDecoder(MessageType::PYTHON_CALL))
        ));
        assert!(matches!(
            registry.register(MessageType::SCRIPT_RET, |m, _| {
                Ok(Box::new(PythonCall::from_message(m)?))
            }),
            Err(ProtocolError::NotARequest(MessageType::SCRIPT_RET))
        ));
    }
}
