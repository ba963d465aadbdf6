use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::comm::{Communicator, GroupKey};
use crate::error::{Result, SimcommError};

/// Maps group keys to their single shared [`Communicator`].
///
/// Participants resolve keys independently and in any order; the first
/// resolve creates the communicator and every later one, racing or not,
/// gets the same instance. The registry lock only guards the map and is
/// never held while a communicator blocks.
#[derive(Default)]
pub struct CommRegistry {
    comms: Mutex<HashMap<GroupKey, Arc<Communicator>>>,
}

impl CommRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the communicator for `key`, creating it with `arity`
    /// participants if it does not exist yet.
    pub fn resolve(&self, key: &GroupKey, arity: usize) -> Result<Arc<Communicator>> {
        let mut comms = self
            .comms
            .lock()
            .map_err(|_| SimcommError::LockPoisoned("communicator registry"))?;

        if let Some(existing) = comms.get(key) {
            if existing.arity() != arity {
                return Err(SimcommError::ArityMismatch {
                    key: key.clone(),
                    expected: existing.arity(),
                    actual: arity,
                });
            }
            return Ok(Arc::clone(existing));
        }

        let comm = Arc::new(Communicator::new(key.clone(), arity));
        comms.insert(key.clone(), Arc::clone(&comm));
        tracing::debug!(%key, arity, "communicator created");
        Ok(comm)
    }

    /// Remove the communicator for `key`.
    ///
    /// Participants still blocked on it keep their reference and are not
    /// woken; destroying a communicator with pending waiters is a caller
    /// error.
    pub fn destroy(&self, key: &GroupKey) -> Option<Arc<Communicator>> {
        let removed = self
            .comms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if let Some(comm) = &removed {
            let pending = comm.pending_ops();
            if pending > 0 {
                tracing::warn!(%key, pending, "destroying communicator with pending ops");
            } else {
                tracing::debug!(%key, "communicator destroyed");
            }
        }
        removed
    }

    pub fn get(&self, key: &GroupKey) -> Option<Arc<Communicator>> {
        self.comms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn contains(&self, key: &GroupKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of live communicators.
    pub fn len(&self) -> usize {
        self.comms.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
