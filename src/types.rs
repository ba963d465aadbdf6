use std::str::FromStr;

use crate::error::SimcommError;

/// Unique identifier for a node in an execution graph.
pub type NodeId = u64;

/// Rank of a participant in a communicator group (0-indexed).
pub type Rank = u32;

/// Opaque identity of a participant (actor) supplied by the execution runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Element types a [`Tensor`](crate::Tensor) can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    F32 = 0,
    F64 = 1,
    I8 = 2,
    I32 = 3,
    I64 = 4,
    U8 = 5,
    U32 = 6,
    U64 = 7,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
            DataType::I8 | DataType::U8 => 1,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::I8 => "i8",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::U8 => "u8",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reduction operations for allreduce.
///
/// Every variant must be commutative and associative: contributions are
/// combined in whatever order participants arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    Sum,
    /// Element-wise product across ranks.
    Product,
    /// Element-wise maximum across ranks.
    Max,
    /// Element-wise minimum across ranks.
    Min,
    /// Element-wise sum divided by the number of contributors.
    Avg,
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Product => f.write_str("product"),
            ReduceOp::Max => f.write_str("max"),
            ReduceOp::Min => f.write_str("min"),
            ReduceOp::Avg => f.write_str("avg"),
        }
    }
}

impl FromStr for ReduceOp {
    type Err = SimcommError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(ReduceOp::Sum),
            "product" => Ok(ReduceOp::Product),
            "max" => Ok(ReduceOp::Max),
            "min" => Ok(ReduceOp::Min),
            "avg" => Ok(ReduceOp::Avg),
            other => Err(SimcommError::UnknownTag(other.to_string())),
        }
    }
}

/// Gather operations. Concatenation is order-sensitive, so contributions
/// are laid out in rank order rather than arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllGatherOp {
    /// Concatenate contributions along the first dimension.
    Concat,
}

impl std::fmt::Display for AllGatherOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllGatherOp::Concat => f.write_str("allgather"),
        }
    }
}

/// What a collective operation computes from the per-rank contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectiveKind {
    Reduce(ReduceOp),
    AllGather(AllGatherOp),
}

impl std::fmt::Display for CollectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectiveKind::Reduce(op) => op.fmt(f),
            CollectiveKind::AllGather(op) => op.fmt(f),
        }
    }
}

impl FromStr for CollectiveKind {
    type Err = SimcommError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allgather" => Ok(CollectiveKind::AllGather(AllGatherOp::Concat)),
            other => other.parse().map(CollectiveKind::Reduce),
        }
    }
}

impl From<ReduceOp> for CollectiveKind {
    fn from(op: ReduceOp) -> Self {
        CollectiveKind::Reduce(op)
    }
}

impl From<AllGatherOp> for CollectiveKind {
    fn from(op: AllGatherOp) -> Self {
        CollectiveKind::AllGather(op)
    }
}
