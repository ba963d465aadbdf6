use std::collections::HashSet;
use std::sync::Arc;

use crate::collective::node::next_node_id;
use crate::collective::{ActorHandle, Producer};
use crate::error::{Result, SimcommError};
use crate::group::Group;
use crate::tensor::Tensor;
use crate::types::{ActorId, CollectiveKind, NodeId};

/// How participants of a collective reach each other.
#[derive(Debug, Clone, Default)]
pub enum Transport {
    /// Whatever group the execution engine sets up for the actors.
    #[default]
    Default,
    /// An explicit group; its membership must match the bound actors.
    Group(Arc<Group>),
}

/// A validated collective operation shared by all of its output nodes.
#[derive(Debug)]
pub struct CollectiveOperation {
    inputs: Vec<NodeId>,
    actors: Vec<ActorHandle>,
    kind: CollectiveKind,
    transport: Transport,
}

impl CollectiveOperation {
    /// Validate `inputs` as the participants of one collective.
    ///
    /// Checks run in a fixed order so each malformed graph gets one
    /// distinguishing error: empty input list, the same node listed twice,
    /// a node without an actor, two nodes on one actor, and finally a
    /// mismatch against an explicit group.
    pub fn new(
        inputs: &[Arc<dyn Producer>],
        kind: CollectiveKind,
        transport: Transport,
    ) -> Result<Self> {
        if inputs.is_empty() {
            return Err(SimcommError::EmptyInputs);
        }

        let mut seen_nodes = HashSet::with_capacity(inputs.len());
        if !inputs.iter().all(|n| seen_nodes.insert(n.node_id())) {
            return Err(SimcommError::DuplicateInputs);
        }

        let actors = inputs
            .iter()
            .map(|n| {
                n.actor().cloned().ok_or(SimcommError::MissingActor {
                    node: n.node_id(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let actor_ids: HashSet<ActorId> = actors.iter().map(ActorHandle::id).collect();
        if actor_ids.len() != actors.len() {
            return Err(SimcommError::DuplicateActors);
        }

        if let Transport::Group(group) = &transport {
            let members: HashSet<ActorId> = group.members().iter().copied().collect();
            if members != actor_ids {
                return Err(SimcommError::GroupMismatch);
            }
        }

        Ok(Self {
            inputs: inputs.iter().map(|n| n.node_id()).collect(),
            actors,
            kind,
            transport,
        })
    }

    /// Input node ids, in bind order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Participating actors, parallel to [`inputs`](Self::inputs).
    pub fn actors(&self) -> &[ActorHandle] {
        &self.actors
    }

    pub fn kind(&self) -> CollectiveKind {
        self.kind
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Run this operation for one participant on its group handle,
    /// allocating the output buffer.
    pub async fn execute(&self, group: &Group, send: &Tensor) -> Result<Tensor> {
        match self.kind {
            CollectiveKind::Reduce(op) => {
                let mut recv = Tensor::zeros(send.shape(), send.dtype());
                group.allreduce(send, &mut recv, op).await?;
                Ok(recv)
            }
            CollectiveKind::AllGather(_) => {
                let world = group.world_size() as usize;
                let shape = match send.shape().split_first() {
                    Some((lead, rest)) => [&[lead * world][..], rest].concat(),
                    None => vec![world],
                };
                let mut recv = Tensor::zeros(shape, send.dtype());
                group.allgather(send, &mut recv).await?;
                Ok(recv)
            }
        }
    }
}

/// One participant's view of a bound collective.
#[derive(Debug)]
pub struct CollectiveOutputNode {
    id: NodeId,
    input: NodeId,
    actor: ActorHandle,
    bind_index: u64,
    operation: Arc<CollectiveOperation>,
}

impl CollectiveOutputNode {
    /// The node whose output this participant contributes.
    pub fn input(&self) -> NodeId {
        self.input
    }

    /// Position of this bind among all binds on the same actor.
    pub fn bind_index(&self) -> u64 {
        self.bind_index
    }

    pub fn operation(&self) -> &Arc<CollectiveOperation> {
        &self.operation
    }
}

impl Producer for CollectiveOutputNode {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn actor(&self) -> Option<&ActorHandle> {
        Some(&self.actor)
    }
}

/// Validate `inputs` and attach one collective output node to each, in
/// input order. Nothing is stamped on the actors unless validation passes.
pub fn bind(
    inputs: &[Arc<dyn Producer>],
    kind: CollectiveKind,
    transport: Transport,
) -> Result<Vec<Arc<CollectiveOutputNode>>> {
    let operation = Arc::new(CollectiveOperation::new(inputs, kind, transport)?);

    let outputs: Vec<Arc<CollectiveOutputNode>> = operation
        .inputs()
        .iter()
        .zip(operation.actors())
        .map(|(&input, actor)| {
            Arc::new(CollectiveOutputNode {
                id: next_node_id(),
                input,
                actor: actor.clone(),
                bind_index: actor.next_bind_index(),
                operation: Arc::clone(&operation),
            })
        })
        .collect();

    tracing::debug!(
        kind = %operation.kind(),
        participants = outputs.len(),
        "collective bound"
    );
    Ok(outputs)
}
