//! In-process simulation of collective communication groups.
//!
//! Participants of a data-parallel execution graph exchange and reduce
//! tensors through shared [`Communicator`]s instead of interconnect
//! hardware. A [`CommRegistry`] hands out one communicator per group key,
//! each participant talks to it through its own [`Group`] handle, and the
//! [`collective`] module validates which graph nodes take part in a
//! collective before anything is scheduled.

pub mod collective;
pub mod comm;
pub mod config;
pub mod error;
pub mod group;
pub mod reduce;
pub mod tensor;
pub mod types;

pub use collective::{
    ActorHandle, CollectiveOperation, CollectiveOutputNode, MethodNode, Producer, Transport,
};
pub use comm::{CommRegistry, Communicator, GroupKey};
pub use config::SimcommConfig;
pub use error::{Result, SimcommError};
pub use group::Group;
pub use tensor::{Element, Tensor};
pub use types::{ActorId, AllGatherOp, CollectiveKind, DataType, NodeId, Rank, ReduceOp};
