use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

use crate::comm::GroupKey;
use crate::error::{Result, SimcommError};
use crate::reduce;
use crate::tensor::Tensor;
use crate::types::{CollectiveKind, Rank};

/// Rendezvous state for one op id. Created by the first arrival and
/// removed by the last reader.
#[derive(Default)]
struct OpSlot {
    /// Point-to-point: the single staged value.
    staged: Option<Tensor>,
    /// Collective: one contribution per rank.
    contributions: Vec<(Rank, Tensor)>,
    kind: Option<CollectiveKind>,
    arrived: usize,
    read: usize,
    /// Set exactly once, when the last participant arrives.
    outcome: Option<Result<Arc<Tensor>>>,
}

/// Blocks a fixed number of participants on each op id until all of them
/// have arrived, then releases one shared result to each.
///
/// A communicator serves either point-to-point or collective traffic, never
/// both. It never times out: an op id that is missing a participant blocks
/// its waiters until the owning [`Group`](crate::Group) gives up.
pub struct Communicator {
    key: GroupKey,
    arity: usize,
    ops: Mutex<HashMap<u64, OpSlot>>,
    ready: Notify,
}

impl Communicator {
    pub fn new(key: GroupKey, arity: usize) -> Self {
        Self {
            key,
            arity,
            ops: Mutex::new(HashMap::new()),
            ready: Notify::new(),
        }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Number of participants every op id waits for.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Op ids that still hold state (not yet read by every participant).
    pub fn pending_ops(&self) -> usize {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Point-to-point rendezvous. Exactly one caller per op id passes
    /// `Some(value)`; every caller gets that value back once all arrived.
    pub async fn wait_p2p(&self, op_id: u64, value: Option<Tensor>) -> Result<Arc<Tensor>> {
        {
            let mut ops = self.ops.lock()?;
            let slot = ops.entry(op_id).or_default();
            self.check_capacity(slot, op_id)?;
            if !self.join_abandoned(slot, op_id) {
                if let Some(v) = value {
                    if slot.staged.is_some() {
                        return Err(SimcommError::DuplicateValue {
                            key: self.key.clone(),
                            op_id,
                        });
                    }
                    slot.staged = Some(v);
                }
                slot.arrived += 1;
                tracing::trace!(key = %self.key, op_id, arrived = slot.arrived, "p2p arrival");

                if slot.arrived == self.arity {
                    let outcome = slot
                        .staged
                        .take()
                        .map(Arc::new)
                        .ok_or_else(|| SimcommError::MissingValue {
                            key: self.key.clone(),
                            op_id,
                        });
                    self.complete(slot, op_id, outcome);
                }
            }
        }
        self.wait_for_outcome(op_id).await
    }

    /// Collective rendezvous. Every participant contributes one value; the
    /// last arrival applies `kind` to all of them and releases the result.
    ///
    /// Contributions are combined in rank order, which only matters for
    /// order-sensitive kinds such as allgather.
    pub async fn wait_collective(
        &self,
        op_id: u64,
        rank: Rank,
        value: Tensor,
        kind: CollectiveKind,
    ) -> Result<Arc<Tensor>> {
        {
            let mut ops = self.ops.lock()?;
            let slot = ops.entry(op_id).or_default();
            self.check_capacity(slot, op_id)?;
            if !self.join_abandoned(slot, op_id) {
                match slot.kind {
                    Some(expected) if expected != kind => {
                        return Err(SimcommError::KindMismatch {
                            key: self.key.clone(),
                            op_id,
                            expected,
                            actual: kind,
                        });
                    }
                    _ => slot.kind = Some(kind),
                }
                if slot.contributions.iter().any(|(r, _)| *r == rank) {
                    return Err(SimcommError::DuplicateContribution {
                        key: self.key.clone(),
                        op_id,
                        rank,
                    });
                }
                slot.contributions.push((rank, value));
                slot.arrived += 1;
                tracing::trace!(key = %self.key, op_id, rank, arrived = slot.arrived, "collective arrival");

                if slot.arrived == self.arity {
                    let mut contributions = std::mem::take(&mut slot.contributions);
                    contributions.sort_by_key(|(r, _)| *r);
                    let inputs: Vec<Tensor> = contributions.into_iter().map(|(_, t)| t).collect();
                    let outcome = reduce::apply(kind, &inputs).map(Arc::new);
                    self.complete(slot, op_id, outcome);
                }
            }
        }
        self.wait_for_outcome(op_id).await
    }

    fn check_capacity(&self, slot: &OpSlot, op_id: u64) -> Result<()> {
        if slot.arrived >= self.arity {
            return Err(SimcommError::TooManyParticipants {
                key: self.key.clone(),
                op_id,
                arity: self.arity,
            });
        }
        Ok(())
    }

    fn complete(&self, slot: &mut OpSlot, op_id: u64, outcome: Result<Arc<Tensor>>) {
        match &outcome {
            Ok(_) => tracing::debug!(key = %self.key, op_id, arity = self.arity, "rendezvous complete"),
            Err(e) => tracing::error!(key = %self.key, op_id, error = %e, "rendezvous failed"),
        }
        slot.outcome = Some(outcome);
        self.ready.notify_waiters();
    }

    /// Count a late arrival on an op id that already failed because a
    /// participant left. The caller then reads the stored error.
    fn join_abandoned(&self, slot: &mut OpSlot, op_id: u64) -> bool {
        if slot.outcome.is_none() {
            return false;
        }
        slot.arrived += 1;
        tracing::debug!(key = %self.key, op_id, arrived = slot.arrived, "arrival on abandoned op");
        true
    }

    async fn wait_for_outcome(&self, op_id: u64) -> Result<Arc<Tensor>> {
        let mut guard = AbandonOnDrop {
            comm: self,
            op_id,
            armed: true,
        };
        loop {
            // Register interest before checking, so a completion between
            // the check and the await is not lost.
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.try_read(op_id) {
                guard.armed = false;
                return outcome;
            }
            notified.await;
        }
    }

    /// A waiter left before reading its outcome (timeout or cancellation).
    ///
    /// An op that has not completed fails with `Abandoned` for everyone
    /// still waiting or yet to arrive. Either way the leaver counts as a
    /// reader, so the slot is released once the remaining peers have read.
    fn abandon(&self, op_id: u64) {
        let mut ops = self.ops.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = ops.get_mut(&op_id) else {
            return;
        };
        if slot.outcome.is_none() {
            tracing::warn!(key = %self.key, op_id, arrived = slot.arrived, "participant abandoned rendezvous");
            slot.staged = None;
            slot.contributions.clear();
            slot.outcome = Some(Err(SimcommError::Abandoned {
                key: self.key.clone(),
                op_id,
            }));
            self.ready.notify_waiters();
        }
        slot.read += 1;
        if slot.read == self.arity {
            ops.remove(&op_id);
            tracing::trace!(key = %self.key, op_id, "op state released");
        }
    }

    fn try_read(&self, op_id: u64) -> Option<Result<Arc<Tensor>>> {
        let mut ops = match self.ops.lock() {
            Ok(ops) => ops,
            Err(e) => return Some(Err(e.into())),
        };
        let slot = ops.get_mut(&op_id)?;
        let outcome = slot.outcome.clone()?;
        slot.read += 1;
        if slot.read == self.arity {
            ops.remove(&op_id);
            tracing::trace!(key = %self.key, op_id, "op state released");
        }
        Some(outcome)
    }
}

/// Abandons the op if the waiting future is dropped before reading.
struct AbandonOnDrop<'a> {
    comm: &'a Communicator,
    op_id: u64,
    armed: bool,
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.comm.abandon(self.op_id);
        }
    }
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("key", &self.key)
            .field("arity", &self.arity)
            .field("pending_ops", &self.pending_ops())
            .finish()
    }
}
