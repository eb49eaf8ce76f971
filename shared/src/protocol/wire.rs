//! Tuple codec and whole-message encoding.
//!
//! Uses bincode with an explicit config so sender and receiver always use the same
//! encoding (fixint for lengths and enum tags), avoiding version/skew mismatches.
//!
//! # Tensor side table
//!
//! Tensors never travel inside an encoded value tree. [`encode`] lifts every
//! [`Value::Tensor`] out into a side table and leaves a slot index in its place;
//! [`decode`] resolves the slots against the table the caller supplies. The table
//! holds the original reference-counted buffers, so no tensor data is copied.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::protocol::value::Value;
use crate::types::message::Message;
use crate::types::tensor::Tensor;

/// Version of the tuple codec blob layout
pub const TUPLE_CODEC_VERSION: u32 = 1;

/// Version of the whole-message file layout
pub const PROTOCOL_VERSION: u32 = 1;

/// Single bincode config for wire format: fixint encoding so vec lengths and enum tags
/// have a fixed size and cannot be misinterpreted across builds or bincode versions.
fn wire_bincode() -> impl bincode::config::Options {
    bincode::config::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// On-wire mirror of [`Value`] with tensors replaced by side-table slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum WireValue {
    None,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    TensorSlot(u32),
    List(Vec<WireValue>),
    Tuple(Vec<WireValue>),
}

#[derive(Serialize, Deserialize)]
struct TupleBlob {
    version: u32,
    value: WireValue,
}

fn lift(value: Value, table: &mut Vec<Tensor>) -> WireValue {
    match value {
        Value::None => WireValue::None,
        Value::Bool(v) => WireValue::Bool(v),
        Value::Int(v) => WireValue::Int(v),
        Value::Double(v) => WireValue::Double(v),
        Value::Str(v) => WireValue::Str(v),
        Value::Bytes(v) => WireValue::Bytes(v),
        Value::Tensor(t) => {
            table.push(t);
            WireValue::TensorSlot((table.len() - 1) as u32)
        }
        Value::List(items) => {
            WireValue::List(items.into_iter().map(|v| lift(v, table)).collect())
        }
        Value::Tuple(items) => {
            WireValue::Tuple(items.into_iter().map(|v| lift(v, table)).collect())
        }
    }
}

fn resolve(value: WireValue, table: &[Tensor]) -> Result<Value> {
    Ok(match value {
        WireValue::None => Value::None,
        WireValue::Bool(v) => Value::Bool(v),
        WireValue::Int(v) => Value::Int(v),
        WireValue::Double(v) => Value::Double(v),
        WireValue::Str(v) => Value::Str(v),
        WireValue::Bytes(v) => Value::Bytes(v),
        WireValue::TensorSlot(index) => {
            let tensor = table.get(index as usize).ok_or(ProtocolError::TensorSlot {
                index,
                len: table.len(),
            })?;
            Value::Tensor(tensor.clone())
        }
        WireValue::List(items) => Value::List(
            items
                .into_iter()
                .map(|v| resolve(v, table))
                .collect::<Result<_>>()?,
        ),
        WireValue::Tuple(items) => Value::Tuple(
            items
                .into_iter()
                .map(|v| resolve(v, table))
                .collect::<Result<_>>()?,
        ),
    })
}

/// Encode a value tree, moving its tensors into the returned side table.
pub fn encode(value: Value) -> Result<(Vec<u8>, Vec<Tensor>)> {
    let mut table = Vec::new();
    let blob = TupleBlob {
        version: TUPLE_CODEC_VERSION,
        value: lift(value, &mut table),
    };
    let bytes = wire_bincode().serialize(&blob)?;
    Ok((bytes, table))
}

/// Decode a value tree produced by [`encode`], resolving tensor slots in `tensors`.
pub fn decode(bytes: &[u8], tensors: &[Tensor]) -> Result<Value> {
    let version: u32 = wire_bincode().deserialize(bytes)?;
    if version != TUPLE_CODEC_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: TUPLE_CODEC_VERSION,
            actual: version,
        });
    }
    let blob: TupleBlob = wire_bincode().deserialize(bytes)?;
    resolve(blob.value, tensors)
}

#[derive(Serialize)]
struct MessageFileRef<'a> {
    version: u32,
    message: &'a Message,
}

#[derive(Deserialize)]
struct MessageFile {
    version: u32,
    message: Message,
}

impl Message {
    /// Serialize the whole message (payload, tensors, tag and id) to bytes.
    ///
    /// This is a storage format for tooling; transports frame messages themselves.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let file = MessageFileRef {
            version: PROTOCOL_VERSION,
            message: self,
        };
        wire_bincode().serialize(&file).map_err(Into::into)
    }

    /// Deserialize a message written by [`Message::to_bytes`], validating the version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let file: MessageFile = wire_bincode().deserialize(bytes)?;
        if file.version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: file.version,
            });
        }
        Ok(file.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::message::MessageType;
    use crate::types::tensor::DType;

    #[test]
    fn test_tensors_go_to_side_table() {
        let a = Tensor::from_bytes(vec![1u8, 2, 3]);
        let b = Tensor::new(DType::I32, vec![2], vec![0u8; 8]).unwrap();
        let value = Value::Tuple(vec![
            Value::Str("f".to_string()),
            Value::List(vec![Value::Tensor(a.clone()), Value::Int(5), Value::Tensor(b.clone())]),
        ]);

        let (bytes, table) = encode(value.clone()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table[0].shares_buffer_with(&a));
        assert!(table[1].shares_buffer_with(&b));

        let decoded = decode(&bytes, &table).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_scalar_tuple_has_empty_table() {
        let value = Value::Tuple(vec![Value::Int(0x113), Value::Int(7), Value::Bool(true)]);
        let (bytes, table) = encode(value.clone()).unwrap();
        assert!(table.is_empty());
        assert_eq!(decode(&bytes, &[]).unwrap(), value);
    }

    #[test]
    fn test_missing_tensor_slot() {
        let (bytes, _) = encode(Value::Tensor(Tensor::from_bytes(vec![0u8]))).unwrap();
        let err = decode(&bytes, &[]).unwrap_err();
        assert!(matches!(err, ProtocolError::TensorSlot { index: 0, len: 0 }));
    }

    #[test]
    fn test_version_header_is_fixint() {
        let (bytes, _) = encode(Value::None).unwrap();
        assert_eq!(bytes[0..4], TUPLE_CODEC_VERSION.to_le_bytes());
    }

    #[test]
    fn test_version_mismatch() {
        let (mut bytes, _) = encode(Value::Int(1)).unwrap();
        bytes[0..4].copy_from_slice(&99u32.to_le_bytes());
        let err = decode(&bytes, &[]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::VersionMismatch {
                expected: TUPLE_CODEC_VERSION,
                actual: 99
            }
        ));
    }

    #[test]
    fn test_garbage_bytes_fail() {
        assert!(decode(&[0x01, 0x00], &[]).is_err());
        assert!(Message::from_bytes(&[0xFF; 3]).is_err());
    }

    #[test]
    fn test_message_file_roundtrip() {
        let msg = Message::new(
            b"payload".to_vec(),
            vec![Tensor::from_bytes(vec![9u8; 4])],
            MessageType::RUN_WITH_PROFILING_REQ,
            42,
        );
        let bytes = msg.to_bytes().unwrap();
        let decoded = Message::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }
}
