use std::sync::Arc;

use crate::collective::{CollectiveOutputNode, Producer, Transport, operation};
use crate::error::Result;
use crate::types::{CollectiveKind, ReduceOp};

/// Bind `inputs` to an allreduce with `op`.
///
/// Each returned node yields the reduced tensor for the actor of the
/// corresponding input.
pub fn bind(
    inputs: &[Arc<dyn Producer>],
    op: ReduceOp,
    transport: Transport,
) -> Result<Vec<Arc<CollectiveOutputNode>>> {
    operation::bind(inputs, CollectiveKind::Reduce(op), transport)
}
