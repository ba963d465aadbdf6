use std::sync::Arc;

use crate::collective::{CollectiveOutputNode, Producer, Transport, operation};
use crate::error::Result;
use crate::types::{AllGatherOp, CollectiveKind};

/// Bind `inputs` to an allgather. Each returned node yields every input
/// concatenated along the first dimension in group rank order.
pub fn bind(
    inputs: &[Arc<dyn Producer>],
    transport: Transport,
) -> Result<Vec<Arc<CollectiveOutputNode>>> {
    operation::bind(inputs, CollectiveKind::AllGather(AllGatherOp::Concat), transport)
}
