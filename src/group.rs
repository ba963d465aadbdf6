//! Per-participant rendezvous client.
//!
//! A [`Group`] is the participant-side view of a communication group: it
//! knows the ordered membership, its own rank, and how many operations it
//! has issued on every group key. Each call resolves the shared
//! [`Communicator`] for its key through the injected [`CommRegistry`] and
//! blocks on it under the configured deadline.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::comm::{CommRegistry, Communicator, GroupKey};
use crate::config::SimcommConfig;
use crate::error::{Result, SimcommError};
use crate::tensor::Tensor;
use crate::types::{ActorId, AllGatherOp, CollectiveKind, DataType, Rank, ReduceOp};

pub struct Group {
    members: Arc<[ActorId]>,
    rank: Option<Rank>,
    registry: Arc<CommRegistry>,
    config: SimcommConfig,
    /// Next op id per group key. Advanced only after a call completes.
    op_counters: Mutex<HashMap<GroupKey, u64>>,
    /// Every key this handle resolved, for `destroy`.
    communicators: Mutex<HashSet<GroupKey>>,
    closed: AtomicBool,
}

impl Group {
    /// Membership-only view with no self rank, as held by whoever builds
    /// the graph. Use [`with_rank`](Self::with_rank) or
    /// [`for_actor`](Self::for_actor) to get a handle that can communicate.
    pub fn new(
        members: impl Into<Vec<ActorId>>,
        registry: Arc<CommRegistry>,
        config: SimcommConfig,
    ) -> Self {
        let members: Vec<ActorId> = members.into();
        Self {
            members: members.into(),
            rank: None,
            registry,
            config,
            op_counters: Mutex::new(HashMap::new()),
            communicators: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Handle for the participant at `rank`, sharing membership, registry
    /// and configuration but with its own op counters.
    pub fn with_rank(&self, rank: Rank) -> Result<Self> {
        self.check_rank(rank)?;
        Ok(Self {
            members: Arc::clone(&self.members),
            rank: Some(rank),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            op_counters: Mutex::new(HashMap::new()),
            communicators: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Handle for the participant identified by `actor`.
    pub fn for_actor(&self, actor: ActorId) -> Result<Self> {
        self.with_rank(self.rank_of(actor)?)
    }

    /// Ordered membership; a participant's rank is its index here.
    pub fn members(&self) -> &[ActorId] {
        &self.members
    }

    pub fn rank_of(&self, actor: ActorId) -> Result<Rank> {
        self.members
            .iter()
            .position(|m| *m == actor)
            .map(|p| p as Rank)
            .ok_or(SimcommError::NotAMember { actor })
    }

    pub fn self_rank(&self) -> Option<Rank> {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn registry(&self) -> &Arc<CommRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SimcommConfig {
        &self.config
    }

    /// Whether a previous failure has made this handle unusable.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send `tensor` to `peer`, blocking until the peer receives it.
    pub async fn send(&self, tensor: Tensor, peer: Rank) -> Result<()> {
        let me = self.require_rank()?;
        self.check_rank(peer)?;
        let key = GroupKey::p2p(me, peer);
        let (comm, op_id) = self.begin(&key, 2)?;

        let timeout = self.config.p2p_timeout;
        self.rendezvous("send", &key, op_id, timeout, async {
            comm.wait_p2p(op_id, Some(tensor)).await.map(drop)
        })
        .await
    }

    /// Receive a tensor from `peer` into a buffer produced by `allocator`.
    pub async fn recv<A>(
        &self,
        shape: &[usize],
        dtype: DataType,
        peer: Rank,
        allocator: A,
    ) -> Result<Tensor>
    where
        A: FnOnce(&[usize], DataType) -> Tensor + Send,
    {
        let me = self.require_rank()?;
        self.check_rank(peer)?;
        let key = GroupKey::p2p(peer, me);
        let (comm, op_id) = self.begin(&key, 2)?;

        let timeout = self.config.p2p_timeout;
        self.rendezvous("recv", &key, op_id, timeout, async {
            let received = comm.wait_p2p(op_id, None).await?;
            let mut buf = allocator(shape, dtype);
            buf.copy_from(&received)?;
            Ok(buf)
        })
        .await
    }

    /// Reduce `send` across every member and write the result into `recv`.
    pub async fn allreduce(&self, send: &Tensor, recv: &mut Tensor, op: ReduceOp) -> Result<()> {
        let key = GroupKey::allreduce(&self.all_ranks());
        self.collective("allreduce", key, send, recv, op.into())
            .await
    }

    /// Concatenate every member's `send` in rank order into `recv`.
    pub async fn allgather(&self, send: &Tensor, recv: &mut Tensor) -> Result<()> {
        let key = GroupKey::allgather(&self.all_ranks());
        self.collective("allgather", key, send, recv, AllGatherOp::Concat.into())
            .await
    }

    /// Remove every communicator this handle resolved from the registry.
    pub fn destroy(&self) {
        let keys: Vec<GroupKey> = self
            .communicators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for key in &keys {
            self.registry.destroy(key);
        }
        self.op_counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::debug!(rank = ?self.rank, count = keys.len(), "group destroyed");
    }

    async fn collective(
        &self,
        operation: &'static str,
        key: GroupKey,
        send: &Tensor,
        recv: &mut Tensor,
        kind: CollectiveKind,
    ) -> Result<()> {
        let me = self.require_rank()?;
        let (comm, op_id) = self.begin(&key, self.members.len())?;

        let timeout = self.config.collective_timeout;
        self.rendezvous(operation, &key, op_id, timeout, async {
            let result = comm.wait_collective(op_id, me, send.clone(), kind).await?;
            recv.copy_from(&result)
        })
        .await
    }

    /// Resolve the communicator for `key` and read the next op id.
    fn begin(&self, key: &GroupKey, arity: usize) -> Result<(Arc<Communicator>, u64)> {
        if self.is_closed() {
            return Err(SimcommError::Closed);
        }
        let comm = self.registry.resolve(key, arity)?;
        self.communicators.lock()?.insert(key.clone());
        let op_id = self.op_counters.lock()?.get(key).copied().unwrap_or(0);
        Ok((comm, op_id))
    }

    /// Run one blocking call under `timeout`. Success advances the key's op
    /// counter; a terminal failure closes the group. Timing out drops the
    /// wait, which abandons the op id so peers fail instead of completing
    /// with this participant's stale contribution.
    async fn rendezvous<T>(
        &self,
        operation: &'static str,
        key: &GroupKey,
        op_id: u64,
        timeout: Duration,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let outcome = match tokio::time::timeout(timeout, fut).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SimcommError::Timeout {
                operation,
                key: key.clone(),
                op_id,
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(v) => {
                *self.op_counters.lock()?.entry(key.clone()).or_insert(0) += 1;
                Ok(v)
            }
            Err(e) => {
                if e.is_terminal() {
                    self.close(operation, &e);
                }
                Err(e)
            }
        }
    }

    fn close(&self, operation: &'static str, cause: &SimcommError) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::warn!(rank = ?self.rank, operation, error = %cause, "group closed");
        }
    }

    fn require_rank(&self) -> Result<Rank> {
        self.rank.ok_or(SimcommError::NoSelfRank)
    }

    fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank >= self.world_size() {
            return Err(SimcommError::InvalidRank {
                rank,
                world_size: self.world_size(),
            });
        }
        Ok(())
    }

    fn all_ranks(&self) -> Vec<Rank> {
        (0..self.world_size()).collect()
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("members", &self.members)
            .field("rank", &self.rank)
            .field("closed", &self.is_closed())
            .finish()
    }
}
