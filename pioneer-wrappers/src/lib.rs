//! The composable decorator stack (C5): each wrapper implements the full
//! `StorageClient` contract by forwarding to an inner client and
//! overriding only the operations its concern touches. No attribute
//! forwarding, no hidden proxy magic — composition is plain, checked
//! Rust trait implementation, stacked left-to-right (outermost first),
//! e.g. `Safety(Locking(Replication(Index(backend))))`.

mod indexing;
mod locking;
mod overlay;
mod replication;
mod safety;
mod sharding;
mod watching;

pub use indexing::IndexingWrapper;
pub use locking::{default_record_lock_timeout, LockingWrapper};
pub use overlay::OverlayWrapper;
pub use replication::ReplicationWrapper;
pub use safety::SafetyWrapper;
pub use sharding::{ShardPlacement, ShardingWrapper};
pub use watching::{Callback, WatchingWrapper};
