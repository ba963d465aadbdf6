use std::sync::Arc;

use crate::types::Rank;

/// Deterministic name of one communication group.
///
/// Every participant derives the key independently; the fixed prefix and
/// separator guarantee that peers agreeing on the ranks agree on the key
/// byte for byte. Each operation family gets its own namespace so a
/// two-rank allreduce never shares op counters with a send/recv pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(Arc<str>);

impl GroupKey {
    const PREFIX: &'static str = "communicator";

    /// Key for point-to-point traffic flowing from `src` to `dst`.
    ///
    /// `send` uses `(self, peer)` and `recv` uses `(peer, self)`, which is
    /// what lands a sender and its receiver on the same key.
    pub fn p2p(src: Rank, dst: Rank) -> Self {
        Self::from_parts("p2p", [src, dst])
    }

    /// Key for an allreduce over `ranks`, in any order.
    pub fn allreduce(ranks: &[Rank]) -> Self {
        Self::from_parts("allreduce", sorted(ranks))
    }

    /// Key for an allgather over `ranks`, in any order.
    pub fn allgather(ranks: &[Rank]) -> Self {
        Self::from_parts("allgather", sorted(ranks))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_parts(family: &str, ranks: impl IntoIterator<Item = Rank>) -> Self {
        let mut s = format!("{}-{family}", Self::PREFIX);
        for r in ranks {
            s.push('-');
            s.push_str(&r.to_string());
        }
        Self(s.into())
    }
}

fn sorted(ranks: &[Rank]) -> Vec<Rank> {
    let mut v = ranks.to_vec();
    v.sort_unstable();
    v
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
