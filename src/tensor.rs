//! Dense host tensor exchanged through communicators.
//!
//! Elements are stored little-endian in a flat byte buffer, so reductions can
//! dispatch on [`DataType`] without generic parameters leaking into the
//! rendezvous layer.

use crate::error::{Result, SimcommError};
use crate::types::DataType;

/// Rust scalar types that map onto a [`DataType`].
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: DataType;

    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DataType = $dtype;

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Self::from_le_bytes(raw)
                }

                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_element!(
    f32 => DataType::F32,
    f64 => DataType::F64,
    i8 => DataType::I8,
    i32 => DataType::I32,
    i64 => DataType::I64,
    u8 => DataType::U8,
    u32 => DataType::U32,
    u64 => DataType::U64,
);

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    dtype: DataType,
    data: Vec<u8>,
}

impl Tensor {
    /// Build a tensor from row-major values.
    pub fn from_vec<T: Element>(shape: impl Into<Vec<usize>>, values: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        let numel = numel_of(&shape);
        if values.len() != numel {
            return Err(SimcommError::BufferSizeMismatch {
                expected: numel,
                actual: values.len(),
            });
        }
        let size = T::DTYPE.size_in_bytes();
        let mut data = vec![0u8; numel * size];
        for (chunk, v) in data.chunks_exact_mut(size).zip(values) {
            v.write_le(chunk);
        }
        Ok(Self {
            shape,
            dtype: T::DTYPE,
            data,
        })
    }

    /// Tensor with every element set to `value`.
    pub fn full<T: Element>(shape: impl Into<Vec<usize>>, value: T) -> Self {
        let shape = shape.into();
        let size = T::DTYPE.size_in_bytes();
        let mut data = vec![0u8; numel_of(&shape) * size];
        for chunk in data.chunks_exact_mut(size) {
            value.write_le(chunk);
        }
        Self {
            shape,
            dtype: T::DTYPE,
            data,
        }
    }

    /// Zero-dimensional tensor holding one value.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self::full(Vec::new(), value)
    }

    /// Zero-filled tensor. All supported dtypes encode zero as zero bytes.
    pub fn zeros(shape: impl Into<Vec<usize>>, dtype: DataType) -> Self {
        let shape = shape.into();
        let data = vec![0u8; numel_of(&shape) * dtype.size_in_bytes()];
        Self { shape, dtype, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Number of elements (1 for a zero-dimensional tensor).
    pub fn numel(&self) -> usize {
        numel_of(&self.shape)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn from_raw(shape: Vec<usize>, dtype: DataType, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), numel_of(&shape) * dtype.size_in_bytes());
        Self { shape, dtype, data }
    }

    /// Decode the elements as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(SimcommError::DTypeMismatch {
                expected: self.dtype,
                actual: T::DTYPE,
            });
        }
        Ok(self
            .data
            .chunks_exact(self.dtype.size_in_bytes())
            .map(T::read_le)
            .collect())
    }

    /// Overwrite this buffer with `src`. Shape and dtype must already match.
    pub fn copy_from(&mut self, src: &Tensor) -> Result<()> {
        if self.dtype != src.dtype {
            return Err(SimcommError::DTypeMismatch {
                expected: self.dtype,
                actual: src.dtype,
            });
        }
        if self.shape != src.shape {
            return Err(SimcommError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: src.shape.clone(),
            });
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }
}

fn numel_of(shape: &[usize]) -> usize {
    shape.iter().product()
}
