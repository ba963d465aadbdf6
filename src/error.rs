use crate::comm::GroupKey;
use crate::types::{ActorId, CollectiveKind, DataType, NodeId, Rank};

pub type Result<T> = std::result::Result<T, SimcommError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SimcommError {
    #[error("collective operation requires at least one input node")]
    EmptyInputs,

    #[error("Expected an actor handle from the input node {node}")]
    MissingActor { node: NodeId },

    #[error("Expected unique actor handles for a collective operation")]
    DuplicateActors,

    #[error("Expected unique input nodes for a collective operation")]
    DuplicateInputs,

    #[error("Expected actor handles to match the custom communicator group")]
    GroupMismatch,

    #[error("{actor} is not a member of this group")]
    NotAMember { actor: ActorId },

    #[error("group handle has no self rank")]
    NoSelfRank,

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("unknown collective tag: {0}")]
    UnknownTag(String),

    #[error("{key} op {op_id}: a value is already staged")]
    DuplicateValue { key: GroupKey, op_id: u64 },

    #[error("{key} op {op_id}: no participant staged a value")]
    MissingValue { key: GroupKey, op_id: u64 },

    #[error("{key} op {op_id}: rank {rank} contributed twice")]
    DuplicateContribution { key: GroupKey, op_id: u64, rank: Rank },

    #[error("{key} op {op_id}: all {arity} participants already arrived")]
    TooManyParticipants { key: GroupKey, op_id: u64, arity: usize },

    #[error("{key} op {op_id}: a participant abandoned the rendezvous")]
    Abandoned { key: GroupKey, op_id: u64 },

    #[error("{key} op {op_id}: collective kind mismatch (expected {expected}, got {actual})")]
    KindMismatch {
        key: GroupKey,
        op_id: u64,
        expected: CollectiveKind,
        actual: CollectiveKind,
    },

    #[error("{key} has {expected} participants, requested {actual}")]
    ArityMismatch {
        key: GroupKey,
        expected: usize,
        actual: usize,
    },

    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DTypeMismatch {
        expected: DataType,
        actual: DataType,
    },

    #[error("{op} requires at least one contribution")]
    EmptyContribution { op: CollectiveKind },

    #[error("buffer size mismatch: expected {expected} elements, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("{operation} on {key} timed out after {timeout_ms}ms (op {op_id})")]
    Timeout {
        operation: &'static str,
        key: GroupKey,
        op_id: u64,
        timeout_ms: u64,
    },

    #[error("group is closed after a failed operation")]
    Closed,

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl SimcommError {
    /// Whether this error leaves a group unusable.
    ///
    /// Validation and membership errors are raised before any rendezvous
    /// state is touched. Everything else may have left a peer waiting on an
    /// op id that can no longer be completed.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            SimcommError::EmptyInputs
                | SimcommError::MissingActor { .. }
                | SimcommError::DuplicateActors
                | SimcommError::DuplicateInputs
                | SimcommError::GroupMismatch
                | SimcommError::NotAMember { .. }
                | SimcommError::NoSelfRank
                | SimcommError::InvalidRank { .. }
                | SimcommError::UnknownTag(_)
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for SimcommError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        SimcommError::LockPoisoned("rendezvous state")
    }
}
