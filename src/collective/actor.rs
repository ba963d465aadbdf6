use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::ActorId;

/// Handle to a participant of the execution graph.
///
/// Clones share the bind index, which numbers every operation bound to the
/// actor so repeated binds from the same actor can be told apart.
#[derive(Clone)]
pub struct ActorHandle {
    id: ActorId,
    bind_index: Arc<AtomicU64>,
}

impl ActorHandle {
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            bind_index: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Index the next bind on this actor will receive.
    pub fn bind_index(&self) -> u64 {
        self.bind_index.load(Ordering::Acquire)
    }

    /// Claim the current bind index and advance it.
    pub(crate) fn next_bind_index(&self) -> u64 {
        self.bind_index.fetch_add(1, Ordering::AcqRel)
    }
}

impl PartialEq for ActorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActorHandle {}

impl std::hash::Hash for ActorHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHandle")
            .field("id", &self.id)
            .field("bind_index", &self.bind_index())
            .finish()
    }
}
