//! The polymorphic wrapped command.

use std::any::Any;
use std::fmt::Debug;

use profwire_shared::{Message, MessageType, ProtocolError, Result};

/// An in-memory RPC command reconstructed from (or serializable into) a [`Message`].
///
/// Concrete kinds are selected at reconstruction time by the
/// [`RequestRegistry`](crate::registry::RequestRegistry).
pub trait RpcCommand: Debug + Send + Any {
    /// Tag of the message this command serializes to
    fn message_type(&self) -> MessageType;

    /// Serialize into a message, consuming the command.
    ///
    /// The returned message carries [`UNSET_MESSAGE_ID`](profwire_shared::UNSET_MESSAGE_ID);
    /// the transport numbers it.
    fn into_message(self: Box<Self>) -> Result<Message>;

    fn as_any(&self) -> &dyn Any;
}

/// Check a message tag before decoding a command from it.
pub(crate) fn expect_type(actual: MessageType, expected: MessageType) -> Result<()> {
    if actual != expected {
        return Err(ProtocolError::UnexpectedMessageType { expected, actual });
    }
    Ok(())
}

impl<'a> dyn RpcCommand + 'a {
    /// Downcast to a concrete command kind.
    pub fn downcast_ref<T: RpcCommand>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
