//! Per-object replicated state: leader election over the cluster's current
//! peer set and a local commit log wrapper types build cluster-consistent
//! behavior on top of.

mod engine;
mod types;

pub use engine::Distributed;
pub use types::{CommitEntry, CommitIndex, ConsensusConfig, PeerId};
