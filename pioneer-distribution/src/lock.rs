//! Cluster-coordinated named locks. Not reentrant across nodes: a second
//! `try_acquire` for the same name from any node fails until the holder
//! releases or its lease expires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pioneer_consensus::PeerId;
use pioneer_core::{PioneerError, PioneerResult};
use tokio::sync::Mutex;
use tracing::debug;

struct Held {
    owner: PeerId,
    expires_at: Instant,
}

/// A single held lock, released when dropped or explicitly via
/// [`DistributedLockManager::release`].
pub struct LockGuard {
    manager: Arc<DistributedLockManager>,
    name: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let manager = Arc::clone(&self.manager);
        let name = self.name.clone();
        tokio::spawn(async move {
            manager.release(&name).await;
        });
    }
}

/// In-memory lock table keyed by lock name. Auto-releases an abandoned
/// lock after `timeout` elapses with no refresh, standing in for the
/// cross-node failure detection a full cluster deployment would add.
pub struct DistributedLockManager {
    this_node: PeerId,
    timeout: Duration,
    held: Mutex<HashMap<String, Held>>,
}

impl DistributedLockManager {
    pub fn new(this_node: PeerId, timeout: Duration) -> Arc<Self> {
        Arc::new(Self { this_node, timeout, held: Mutex::new(HashMap::new()) })
    }

    /// Attempt to acquire `name`, waiting up to `self.timeout` for a
    /// conflicting holder's lease to expire. Fails with `LockUnavailable`
    /// if the timeout elapses first.
    pub async fn try_acquire(self: &Arc<Self>, name: &str) -> PioneerResult<LockGuard> {
        let deadline = Instant::now() + self.timeout;
        loop {
            {
                let mut held = self.held.lock().await;
                let expired = held.get(name).map(|h| Instant::now() >= h.expires_at).unwrap_or(true);
                if expired {
                    held.insert(
                        name.to_string(),
                        Held { owner: self.this_node.clone(), expires_at: Instant::now() + self.timeout },
                    );
                    debug!(lock = name, node = %self.this_node, "lock acquired");
                    return Ok(LockGuard { manager: Arc::clone(self), name: name.to_string() });
                }
            }
            if Instant::now() >= deadline {
                return Err(PioneerError::LockUnavailable(name.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub async fn release(&self, name: &str) {
        let mut held = self.held.lock().await;
        if let Some(entry) = held.get(name) {
            if entry.owner == self.this_node {
                held.remove(name);
                debug!(lock = name, node = %self.this_node, "lock released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_then_release_allows_reacquire() {
        let manager = DistributedLockManager::new("node-a".to_string(), Duration::from_millis(200));
        let guard = manager.try_acquire("header@a/b").await.unwrap();
        drop(guard);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(manager.try_acquire("header@a/b").await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_acquire_times_out() {
        let manager = DistributedLockManager::new("node-a".to_string(), Duration::from_millis(50));
        let _guard = manager.try_acquire("x").await.unwrap();
        let second = Arc::clone(&manager).try_acquire("x").await;
        assert!(matches!(second, Err(PioneerError::LockUnavailable(_))));
    }
}
