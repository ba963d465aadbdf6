//! Element-wise reduction and gather kernels applied once every participant
//! of a collective has contributed.

use crate::error::{Result, SimcommError};
use crate::tensor::{Element, Tensor};
use crate::types::{AllGatherOp, CollectiveKind, DataType, ReduceOp};

/// Trait for types that support the reduction operations.
trait Reducible: Element {
    /// Pairwise combine for sum, product, max and min.
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Self;
    /// Mean of one element position across all contributions. Accumulates
    /// in a wider type so the intermediate sum cannot wrap.
    fn mean(values: &[Self]) -> Self;
}

macro_rules! impl_reducible {
    (int: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum | ReduceOp::Avg => a.wrapping_add(b),
                        ReduceOp::Product => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }

                #[inline]
                fn mean(values: &[Self]) -> Self {
                    let sum: i128 = values.iter().map(|v| *v as i128).sum();
                    // Truncates toward zero; always within range of Self.
                    (sum / values.len() as i128) as Self
                }
            }
        )*
    };
    (float: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum | ReduceOp::Avg => a + b,
                        ReduceOp::Product => a * b,
                        // NaN propagates, unlike `min`/`max` on floats.
                        ReduceOp::Min if a.is_nan() || b.is_nan() => Self::NAN,
                        ReduceOp::Max if a.is_nan() || b.is_nan() => Self::NAN,
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }

                #[inline]
                fn mean(values: &[Self]) -> Self {
                    let sum: f64 = values.iter().map(|v| *v as f64).sum();
                    (sum / values.len() as f64) as Self
                }
            }
        )*
    };
}

impl_reducible!(int: i8, i32, i64, u8, u32, u64);
impl_reducible!(float: f32, f64);

/// Combine the contributions of one collective into a single tensor.
///
/// Inputs must already be in rank order for order-sensitive kinds
/// (allgather). Mismatched shapes or dtypes are rejected rather than
/// broadcast.
pub fn apply(kind: CollectiveKind, inputs: &[Tensor]) -> Result<Tensor> {
    match kind {
        CollectiveKind::Reduce(op) => reduce(inputs, op),
        CollectiveKind::AllGather(AllGatherOp::Concat) => concat(inputs),
    }
}

/// Element-wise reduction of same-shape tensors.
pub fn reduce(inputs: &[Tensor], op: ReduceOp) -> Result<Tensor> {
    let (first, rest) = inputs.split_first().ok_or(SimcommError::EmptyContribution {
        op: CollectiveKind::Reduce(op),
    })?;
    for t in rest {
        check_dtype(first, t)?;
        if t.shape() != first.shape() {
            return Err(SimcommError::ShapeMismatch {
                expected: first.shape().to_vec(),
                actual: t.shape().to_vec(),
            });
        }
    }

    let mut out = first.clone();
    if op == ReduceOp::Avg {
        mean_slice(out.as_bytes_mut(), inputs, first.dtype());
        return Ok(out);
    }
    for t in rest {
        reduce_slice(out.as_bytes_mut(), t.as_bytes(), first.dtype(), op);
    }
    Ok(out)
}

/// Concatenate along the first dimension. Zero-dimensional inputs are
/// treated as length-1 vectors.
pub fn concat(inputs: &[Tensor]) -> Result<Tensor> {
    let first = inputs.first().ok_or(SimcommError::EmptyContribution {
        op: CollectiveKind::AllGather(AllGatherOp::Concat),
    })?;
    let inner = first.shape().get(1..).unwrap_or_default();

    let mut rows = 0usize;
    for t in inputs {
        check_dtype(first, t)?;
        let (lead, rest) = t.shape().split_first().unwrap_or((&1, &[][..]));
        if rest != inner {
            return Err(SimcommError::ShapeMismatch {
                expected: first.shape().to_vec(),
                actual: t.shape().to_vec(),
            });
        }
        rows += lead;
    }

    let mut shape = Vec::with_capacity(inner.len() + 1);
    shape.push(rows);
    shape.extend_from_slice(inner);
    let data = inputs.iter().flat_map(|t| t.as_bytes()).copied().collect();
    Ok(Tensor::from_raw(shape, first.dtype(), data))
}

fn check_dtype(expected: &Tensor, actual: &Tensor) -> Result<()> {
    if actual.dtype() != expected.dtype() {
        return Err(SimcommError::DTypeMismatch {
            expected: expected.dtype(),
            actual: actual.dtype(),
        });
    }
    Ok(())
}

/// Element-wise reduce on byte slices interpreted as `dtype` elements.
fn reduce_slice(dst: &mut [u8], src: &[u8], dtype: DataType, op: ReduceOp) {
    match dtype {
        DataType::F32 => reduce_slice_typed::<f32>(dst, src, op),
        DataType::F64 => reduce_slice_typed::<f64>(dst, src, op),
        DataType::I8 => reduce_slice_typed::<i8>(dst, src, op),
        DataType::I32 => reduce_slice_typed::<i32>(dst, src, op),
        DataType::I64 => reduce_slice_typed::<i64>(dst, src, op),
        DataType::U8 => reduce_slice_typed::<u8>(dst, src, op),
        DataType::U32 => reduce_slice_typed::<u32>(dst, src, op),
        DataType::U64 => reduce_slice_typed::<u64>(dst, src, op),
    }
}

fn mean_slice(dst: &mut [u8], inputs: &[Tensor], dtype: DataType) {
    match dtype {
        DataType::F32 => mean_slice_typed::<f32>(dst, inputs),
        DataType::F64 => mean_slice_typed::<f64>(dst, inputs),
        DataType::I8 => mean_slice_typed::<i8>(dst, inputs),
        DataType::I32 => mean_slice_typed::<i32>(dst, inputs),
        DataType::I64 => mean_slice_typed::<i64>(dst, inputs),
        DataType::U8 => mean_slice_typed::<u8>(dst, inputs),
        DataType::U32 => mean_slice_typed::<u32>(dst, inputs),
        DataType::U64 => mean_slice_typed::<u64>(dst, inputs),
    }
}

fn reduce_slice_typed<T: Reducible>(dst: &mut [u8], src: &[u8], op: ReduceOp) {
    let t_size = std::mem::size_of::<T>();
    for (d, s) in dst.chunks_exact_mut(t_size).zip(src.chunks_exact(t_size)) {
        let r = T::reduce(T::read_le(d), T::read_le(s), op);
        r.write_le(d);
    }
}

fn mean_slice_typed<T: Reducible>(dst: &mut [u8], inputs: &[Tensor]) {
    let t_size = std::mem::size_of::<T>();
    let mut column = Vec::with_capacity(inputs.len());
    for (i, d) in dst.chunks_exact_mut(t_size).enumerate() {
        let range = i * t_size..(i + 1) * t_size;
        column.clear();
        column.extend(inputs.iter().map(|t| T::read_le(&t.as_bytes()[range.clone()])));
        T::mean(&column).write_le(d);
    }
}
