//! Graph-construction side of collectives: validating which producers take
//! part in an operation and attaching the shared descriptor to each.

mod actor;
pub mod allgather;
pub mod allreduce;
mod node;
mod operation;

pub use actor::ActorHandle;
pub use node::{MethodNode, Producer};
pub use operation::{CollectiveOperation, CollectiveOutputNode, Transport, bind};
