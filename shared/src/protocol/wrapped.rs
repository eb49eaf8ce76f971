//! Splicing a secondary blob onto an existing payload.
//!
//! Layout: `primary ++ secondary ++ u64_be(len(secondary))`. The size trailer
//! sits at a fixed offset from the end, so splitting never has to look inside
//! the primary bytes.

use tracing::trace;

use crate::error::{ProtocolError, Result};
use crate::protocol::value::Value;
use crate::protocol::wire;

/// Size of the big-endian length trailer
pub const TRAILER_SIZE: usize = std::mem::size_of::<u64>();

/// Append `additional` and its length trailer to `payload`.
pub fn write_wrapped_payload(payload: &mut Vec<u8>, additional: &[u8]) {
    payload.reserve(additional.len() + TRAILER_SIZE);
    payload.extend_from_slice(additional);
    payload.extend_from_slice(&(additional.len() as u64).to_be_bytes());
}

/// Strip the secondary blob from `payload` and return it.
///
/// On success `payload` is truncated in place to the primary bytes.
/// On failure `payload` is left untouched.
pub fn split_wrapped_payload(payload: &mut Vec<u8>) -> Result<Vec<u8>> {
    if payload.len() < TRAILER_SIZE {
        return Err(ProtocolError::WrappedPayloadTooShort { len: payload.len() });
    }
    let trailer_at = payload.len() - TRAILER_SIZE;
    let mut trailer = [0u8; TRAILER_SIZE];
    trailer.copy_from_slice(&payload[trailer_at..]);
    let additional = u64::from_be_bytes(trailer);

    // The primary part must keep at least one byte.
    if additional == 0 || additional >= trailer_at as u64 {
        return Err(ProtocolError::WrappedPayloadSize {
            payload: trailer_at,
            additional,
        });
    }

    let primary_len = trailer_at - additional as usize;
    let secondary = payload[primary_len..trailer_at].to_vec();
    payload.truncate(primary_len);
    trace!(primary_len, secondary_len = secondary.len(), "split wrapped payload");
    Ok(secondary)
}

/// Strip the secondary blob from `payload` and decode it as a tuple.
///
/// The secondary blob carries no tensors of its own; any tensor slot it
/// references is an error.
pub fn read_wrapped_payload(payload: &mut Vec<u8>) -> Result<Vec<Value>> {
    let secondary = split_wrapped_payload(payload)?;
    wire::decode(&secondary, &[])?.into_tuple()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailer_layout() {
        let mut payload = b"ABCD".to_vec();
        write_wrapped_payload(&mut payload, b"xyz");
        assert_eq!(&payload[..4], b"ABCD");
        assert_eq!(&payload[4..7], b"xyz");
        assert_eq!(&payload[7..], &[0, 0, 0, 0, 0, 0, 0, 3]);

        let secondary = split_wrapped_payload(&mut payload).unwrap();
        assert_eq!(secondary, b"xyz");
        assert_eq!(payload, b"ABCD");
    }

    #[test]
    fn test_primary_that_looks_like_a_trailer() {
        // Primary bytes that themselves end in a plausible size field.
        let mut primary = vec![0u8; 7];
        primary.push(2);
        let original = primary.clone();
        write_wrapped_payload(&mut primary, b"meta");
        assert_eq!(split_wrapped_payload(&mut primary).unwrap(), b"meta");
        assert_eq!(primary, original);
    }

    #[test]
    fn test_too_short() {
        let mut payload = vec![1, 2, 3];
        let err = split_wrapped_payload(&mut payload).unwrap_err();
        assert!(matches!(err, ProtocolError::WrappedPayloadTooShort { len: 3 }));
        assert_eq!(payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_primary_rejected() {
        let mut payload = Vec::new();
        write_wrapped_payload(&mut payload, b"meta");
        let err = split_wrapped_payload(&mut payload).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::WrappedPayloadSize {
                payload: 4,
                additional: 4
            }
        ));
    }

    #[test]
    fn test_empty_secondary_rejected() {
        let mut payload = b"ABCD".to_vec();
        write_wrapped_payload(&mut payload, b"");
        assert!(matches!(
            split_wrapped_payload(&mut payload),
            Err(ProtocolError::WrappedPayloadSize { additional: 0, .. })
        ));
    }

    #[test]
    fn test_read_decodes_tuple() {
        let (blob, table) = wire::encode(Value::Tuple(vec![Value::Int(1), Value::Int(2)])).unwrap();
        assert!(table.is_empty());
        let mut payload = b"primary".to_vec();
        write_wrapped_payload(&mut payload, &blob);

        let elements = read_wrapped_payload(&mut payload).unwrap();
        assert_eq!(elements, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(payload, b"primary");
    }

    #[test]
    fn test_read_rejects_non_tuple() {
        let (blob, _) = wire::encode(Value::List(vec![Value::Int(1)])).unwrap();
        let mut payload = b"p".to_vec();
        write_wrapped_payload(&mut payload, &blob);
        assert!(matches!(
            read_wrapped_payload(&mut payload),
            Err(ProtocolError::MalformedValue { expected: "Tuple", .. })
        ));
    }
}
