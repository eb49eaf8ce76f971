//! Dynamically typed values exchanged through the tuple codec.

use crate::error::{ProtocolError, Result};
use crate::types::tensor::Tensor;

/// A value tree as understood by the tuple codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    Tensor(Tensor),
    List(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    /// Human-readable kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Double(_) => "Double",
            Value::Str(_) => "Str",
            Value::Bytes(_) => "Bytes",
            Value::Tensor(_) => "Tensor",
            Value::List(_) => "List",
            Value::Tuple(_) => "Tuple",
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(ProtocolError::malformed("Int", other.kind())),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(ProtocolError::malformed("Bool", other.kind())),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(v) => Ok(v),
            other => Err(ProtocolError::malformed("Str", other.kind())),
        }
    }

    pub fn as_tuple(&self) -> Result<&[Value]> {
        match self {
            Value::Tuple(v) => Ok(v),
            other => Err(ProtocolError::malformed("Tuple", other.kind())),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(v) => Ok(v),
            other => Err(ProtocolError::malformed("List", other.kind())),
        }
    }

    pub fn into_tuple(self) -> Result<Vec<Value>> {
        match self {
            Value::Tuple(v) => Ok(v),
            other => Err(ProtocolError::malformed("Tuple", other.kind())),
        }
    }

    pub fn into_list(self) -> Result<Vec<Value>> {
        match self {
            Value::List(v) => Ok(v),
            other => Err(ProtocolError::malformed("List", other.kind())),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Tensor> for Value {
    fn from(v: Tensor) -> Self {
        Value::Tensor(v)
    }
}
