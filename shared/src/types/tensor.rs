//! Tensor buffers carried alongside a message payload.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    U8,
    I32,
    I64,
    F32,
    F64,
    Bool,
}

impl DType {
    /// Size of one element in bytes
    pub fn element_size(self) -> usize {
        match self {
            DType::U8 | DType::Bool => 1,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::U8 => "u8",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::Bool => "bool",
        }
    }
}

/// A dense tensor buffer.
///
/// `data` is reference counted: clones share the same allocation.
/// Deserialized tensors go through [`Tensor::new`], so the size check holds
/// for tensors read off the wire too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    dtype: DType,
    shape: Vec<usize>,
    data: Bytes,
}

/// Unchecked field mirror used while deserializing a [`Tensor`]
#[derive(Deserialize)]
struct RawTensor {
    dtype: DType,
    shape: Vec<usize>,
    data: Bytes,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = ProtocolError;

    fn try_from(raw: RawTensor) -> Result<Self> {
        Tensor::new(raw.dtype, raw.shape, raw.data)
    }
}

/// Byte size of `shape` elements of `dtype`, or `None` if it overflows `usize`.
fn byte_size(dtype: DType, shape: &[usize]) -> Option<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))?
        .checked_mul(dtype.element_size())
}

impl Tensor {
    /// Create a tensor, checking that `data` holds exactly `shape` elements.
    pub fn new(dtype: DType, shape: Vec<usize>, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let Some(expected) = byte_size(dtype, &shape) else {
            return Err(ProtocolError::TensorOverflow {
                dtype: dtype.name(),
                shape,
            });
        };
        if data.len() != expected {
            return Err(ProtocolError::TensorSize {
                dtype: dtype.name(),
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    /// One-dimensional byte tensor over `data`
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            dtype: DType::U8,
            shape: vec![data.len()],
            data,
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Size of the buffer in bytes
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    /// True when both tensors point at the same underlying allocation.
    pub fn shares_buffer_with(&self, other: &Tensor) -> bool {
        self.data.as_ptr() == other.data.as_ptr() && self.data.len() == other.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_size_checked() {
        let ok = Tensor::new(DType::F32, vec![2, 3], vec![0u8; 24]).unwrap();
        assert_eq!(ok.numel(), 6);
        assert_eq!(ok.nbytes(), 24);

        let err = Tensor::new(DType::F32, vec![2, 3], vec![0u8; 23]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TensorSize {
                expected: 24,
                actual: 23,
                ..
            }
        ));
    }

    #[test]
    fn test_overflowing_shape_rejected() {
        let err = Tensor::new(DType::F64, vec![usize::MAX, 2], vec![0u8; 8]).unwrap_err();
        assert!(matches!(err, ProtocolError::TensorOverflow { dtype: "f64", .. }));

        // Element count fits but the byte size does not.
        let err = Tensor::new(DType::F64, vec![1 << 61], Vec::new()).unwrap_err();
        assert!(matches!(err, ProtocolError::TensorOverflow { .. }));
        assert!(err.is_contract_violation());

        // A zero dimension short-circuits to an empty tensor.
        let empty = Tensor::new(DType::F64, vec![0, usize::MAX], Vec::new()).unwrap();
        assert_eq!(empty.numel(), 0);
    }

    #[test]
    fn test_deserialize_checks_size() {
        let t = Tensor::new(DType::I32, vec![2], vec![0u8; 8]).unwrap();
        let mut json = serde_json::to_value(&t).unwrap();
        assert_eq!(serde_json::from_value::<Tensor>(json.clone()).unwrap(), t);

        json["data"] = serde_json::json!([0, 0, 0]);
        let err = serde_json::from_value::<Tensor>(json.clone()).unwrap_err();
        assert!(err.to_string().contains("needs 8"));

        json["shape"] = serde_json::json!([usize::MAX, 2]);
        assert!(serde_json::from_value::<Tensor>(json).is_err());
    }

    #[test]
    fn test_clone_shares_buffer() {
        let t = Tensor::from_bytes(vec![1u8, 2, 3, 4]);
        let c = t.clone();
        assert!(t.shares_buffer_with(&c));

        let copy = Tensor::from_bytes(t.data().to_vec());
        assert_eq!(copy, t);
        assert!(!copy.shares_buffer_with(&t));
    }

    #[test]
    fn test_scalar_shape() {
        let t = Tensor::new(DType::I64, vec![], 7i64.to_le_bytes().to_vec()).unwrap();
        assert_eq!(t.numel(), 1);
        assert_eq!(t.dtype().element_size(), 8);
    }
}
