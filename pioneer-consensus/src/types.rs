//! Shared vocabulary for the replicated-object engine: peer identity,
//! commit-log entries, and tuning knobs.

use serde::{Deserialize, Serialize};

/// A cluster member, identified by the address its peer-discovery record
/// was seen at.
pub type PeerId = String;

/// Monotonically increasing position in a replicated object's commit log.
pub type CommitIndex = u64;

/// One committed mutation of a replicated object's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitEntry<S> {
    pub index: CommitIndex,
    pub state: S,
}

/// Tuning for leader election and lease refresh, analogous to Raft's
/// election timeout and heartbeat interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub election_timeout: std::time::Duration,
    pub heartbeat_interval: std::time::Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            election_timeout: std::time::Duration::from_millis(1500),
            heartbeat_interval: std::time::Duration::from_millis(300),
        }
    }
}
