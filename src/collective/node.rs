use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::collective::ActorHandle;
use crate::types::NodeId;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_node_id() -> NodeId {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A graph node whose output can feed a collective operation.
pub trait Producer: Send + Sync {
    /// Identity of the node. Two entries with the same id are the same node.
    fn node_id(&self) -> NodeId;

    /// Actor that runs this node, if any.
    fn actor(&self) -> Option<&ActorHandle>;
}

/// An actor method call in the execution graph.
#[derive(Debug)]
pub struct MethodNode {
    id: NodeId,
    method: String,
    actor: Option<ActorHandle>,
}

impl MethodNode {
    /// Node that runs `method` on `actor`.
    pub fn new(actor: &ActorHandle, method: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: next_node_id(),
            method: method.into(),
            actor: Some(actor.clone()),
        })
    }

    /// Node with no owning actor, such as a graph input.
    pub fn detached(method: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: next_node_id(),
            method: method.into(),
            actor: None,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl Producer for MethodNode {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn actor(&self) -> Option<&ActorHandle> {
        self.actor.as_ref()
    }
}
