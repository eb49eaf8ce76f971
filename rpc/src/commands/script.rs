//! Calls to named builtin or scripted functions.

use std::any::Any;

use profwire_shared::protocol::wire;
use profwire_shared::{
    Message, MessageType, ProtocolError, Result, Value, UNSET_MESSAGE_ID,
};

use crate::command::{expect_type, RpcCommand};

/// Call of `qualified_name` with positional `args`.
///
/// Payload: tuple codec encoding of `(qualified_name, [args...])`. Tensor
/// arguments move into the message tensor list.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCall {
    qualified_name: String,
    args: Vec<Value>,
}

impl ScriptCall {
    pub fn new(qualified_name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            args,
        }
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn from_message(message: Message) -> Result<Self> {
        expect_type(message.message_type(), MessageType::SCRIPT_CALL)?;
        let elements = wire::decode(message.payload(), message.tensors())?.into_tuple()?;
        let [name, args]: [Value; 2] =
            elements
                .try_into()
                .map_err(|elements: Vec<Value>| ProtocolError::TupleArity {
                    expected: 2,
                    actual: elements.len(),
                })?;
        Ok(Self {
            qualified_name: name.as_str()?.to_string(),
            args: args.into_list()?,
        })
    }
}

impl RpcCommand for ScriptCall {
    fn message_type(&self) -> MessageType {
        MessageType::SCRIPT_CALL
    }

    fn into_message(self: Box<Self>) -> Result<Message> {
        let this = *self;
        let (payload, tensors) = wire::encode(Value::Tuple(vec![
            Value::Str(this.qualified_name),
            Value::List(this.args),
        ]))?;
        Ok(Message::new(
            payload,
            tensors,
            MessageType::SCRIPT_CALL,
            UNSET_MESSAGE_ID,
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Return value of a [`ScriptCall`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptResp {
    value: Value,
}

impl ScriptResp {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn from_message(message: Message) -> Result<Self> {
        expect_type(message.message_type(), MessageType::SCRIPT_RET)?;
        let value = wire::decode(message.payload(), message.tensors())?;
        Ok(Self { value })
    }
}

impl RpcCommand for ScriptResp {
    fn message_type(&self) -> MessageType {
        MessageType::SCRIPT_RET
    }

    fn into_message(self: Box<Self>) -> Result<Message> {
        let (payload, tensors) = wire::encode(self.value)?;
        Ok(Message::new(
            payload,
            tensors,
            MessageType::SCRIPT_RET,
            UNSET_MESSAGE_ID,
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
