//! Cluster coordination built atop `pioneer-consensus`: peer discovery
//! (C6.1), the distributed lock manager (C6.3), the messaging bus (C6.4),
//! and the storage-wide lease the locking wrapper layers over a backend
//! (C7.1).

mod discovery;
mod lease;
mod lock;
mod messaging;

pub use discovery::{PeerDiscovery, SERVICE_NAME};
pub use lease::StorageLease;
pub use lock::{DistributedLockManager, LockGuard};
pub use messaging::{Handler, MessagingBus, Predicate};
