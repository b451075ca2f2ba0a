//! [`Distributed`]: a per-object replicated-state base. Wrapper types that
//! need cluster-consistent internal state (a messaging handler table, a
//! locking wrapper's lease, index metadata) embed one of these rather than
//! keeping plain local state.
//!
//! Leadership here is decided the way a single-decree Raft group would
//! settle it absent contested elections: the lexicographically lowest
//! member of the current peer set is master. Real log replication across
//! peers is out of scope for this engine — it commits locally and exposes
//! the `is_master`/`on_master`/`*_sync` contract wrapper code depends on;
//! cross-node fan-out of committed entries is the messaging bus's job (see
//! `pioneer_distribution::messaging`). See DESIGN.md for why.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{CommitEntry, CommitIndex, PeerId};

/// Replicates a value of type `S` across the current peer set's notion of
/// a leader. `S` must be cheaply cloneable since every read hands back an
/// owned snapshot rather than a guard over the log.
pub struct Distributed<S> {
    this_node: PeerId,
    peers: Arc<RwLock<Vec<PeerId>>>,
    log: RwLock<Vec<CommitEntry<S>>>,
}

impl<S: Clone + Send + Sync + 'static> Distributed<S> {
    pub fn new(this_node: PeerId, peers: Arc<RwLock<Vec<PeerId>>>, initial: S) -> Self {
        Self {
            this_node,
            peers,
            log: RwLock::new(vec![CommitEntry { index: 0, state: initial }]),
        }
    }

    /// True iff this node is leader of this object's replication group.
    pub async fn is_master(&self) -> bool {
        self.leader().await == self.this_node
    }

    async fn leader(&self) -> PeerId {
        let peers = self.peers.read().await;
        std::iter::once(self.this_node.clone())
            .chain(peers.iter().cloned())
            .min()
            .unwrap_or_else(|| self.this_node.clone())
    }

    /// Run `f` only when this node is leader; non-leaders see a no-op and
    /// get back `None`.
    pub async fn on_master<F, Fut, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        if self.is_master().await {
            Some(f().await)
        } else {
            None
        }
    }

    /// Commit a new state value. Only the leader may propose; followers
    /// get `None` and should route the mutation to the leader instead.
    pub async fn propose(&self, state: S) -> Option<CommitIndex> {
        if !self.is_master().await {
            return None;
        }
        let mut log = self.log.write().await;
        let index = log.last().map(|e| e.index + 1).unwrap_or(0);
        log.push(CommitEntry { index, state });
        debug!(node = %self.this_node, index, "committed new state");
        Some(index)
    }

    pub async fn current(&self) -> S {
        self.log.read().await.last().expect("log always has an initial entry").state.clone()
    }

    pub async fn commit_index(&self) -> CommitIndex {
        self.log.read().await.last().expect("log always has an initial entry").index
    }

    /// Whether the local log has caught the leader's commit index. Always
    /// true for this single-process engine; kept as a distinct call so
    /// wrapper code that awaits synchronization compiles unchanged against
    /// a future multi-node implementation.
    pub async fn is_synced(&self) -> bool {
        true
    }

    pub async fn local_sync(&self) {}

    pub async fn global_sync(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lowest_peer_id_is_leader() {
        let peers = Arc::new(RwLock::new(vec!["b".to_string(), "c".to_string()]));
        let a: Distributed<i32> = Distributed::new("a".to_string(), Arc::clone(&peers), 0);
        let b: Distributed<i32> = Distributed::new("b".to_string(), peers, 0);
        assert!(a.is_master().await);
        assert!(!b.is_master().await);
    }

    #[tokio::test]
    async fn propose_on_follower_is_rejected() {
        let peers = Arc::new(RwLock::new(vec!["a".to_string()]));
        let follower: Distributed<i32> = Distributed::new("z".to_string(), peers, 0);
        assert_eq!(follower.propose(1).await, None);
    }

    #[tokio::test]
    async fn propose_on_leader_advances_commit_index() {
        let peers = Arc::new(RwLock::new(Vec::new()));
        let leader: Distributed<i32> = Distributed::new("a".to_string(), peers, 0);
        let index = leader.propose(42).await.unwrap();
        assert_eq!(index, 1);
        assert_eq!(leader.current().await, 42);
    }
}
