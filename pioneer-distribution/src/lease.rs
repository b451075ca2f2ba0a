//! Storage-wide lease (C7.1): protects an entire storage instance from
//! concurrent cluster writers. Persisted as `._lock.json` at the storage
//! root, refreshed on a schedule, and fails closed on an unrefreshed or
//! foreign lease.
//!
//! State machine: `Unlocked -> (acquire) -> Held -> (refresh) -> Held`,
//! `Held -> (expire) -> Unlocked`, `Held -> (release) -> Unlocked`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pioneer_core::{reserved, PioneerError, PioneerResult, StoragePath};
use pioneer_storage::StorageClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseRecord {
    cluster: String,
    timestamp: DateTime<Utc>,
    #[serde(rename = "duration")]
    duration_secs: u64,
}

impl LeaseRecord {
    fn expires_at(&self) -> DateTime<Utc> {
        self.timestamp + chrono::Duration::seconds(self.duration_secs as i64)
    }
}

fn lock_path() -> StoragePath {
    StoragePath::root().join(reserved::LOCK_FILE)
}

/// A held or releasable storage-wide lease. Construction bypasses the
/// safety wrapper (it writes `._lock.json` via `raw_put`/`raw_get`
/// directly), exactly like the other reserved-key machinery.
pub struct StorageLease {
    backend: Arc<dyn StorageClient>,
    cluster: String,
    duration: Duration,
    grace: Duration,
    held: AtomicBool,
}

impl StorageLease {
    /// Attempt to acquire the lease for `cluster`. Fails with
    /// `LeaseInvalid` if an unexpired lease held by a different cluster is
    /// already present. Spawns a background refresh task at
    /// `duration - grace` for the lifetime of the returned handle.
    pub async fn acquire(
        backend: Arc<dyn StorageClient>,
        cluster: impl Into<String>,
        duration: Duration,
        grace: Duration,
    ) -> PioneerResult<Arc<Self>> {
        let cluster = cluster.into();
        if let Ok(bytes) = backend.raw_get(&lock_path()).await {
            if let Ok(existing) = serde_json::from_slice::<LeaseRecord>(&bytes) {
                if existing.cluster != cluster && Utc::now() < existing.expires_at() {
                    return Err(PioneerError::LeaseInvalid(format!(
                        "storage already leased by cluster {:?} until {}",
                        existing.cluster,
                        existing.expires_at()
                    )));
                }
            }
        }
        let lease = Arc::new(Self { backend, cluster, duration, grace, held: AtomicBool::new(true) });
        lease.write_record().await?;
        Arc::clone(&lease).spawn_refresh();
        debug!(cluster = %lease.cluster, "storage lease acquired");
        Ok(lease)
    }

    async fn write_record(&self) -> PioneerResult<()> {
        let record = LeaseRecord {
            cluster: self.cluster.clone(),
            timestamp: Utc::now(),
            duration_secs: self.duration.as_secs(),
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| PioneerError::SerializationError(e.to_string()))?;
        self.backend.raw_put(&lock_path(), bytes).await
    }

    fn spawn_refresh(self: Arc<Self>) {
        let interval = self.duration.saturating_sub(self.grace).max(Duration::from_secs(1));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !self.held.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(e) = self.write_record().await {
                    warn!(error = %e, "storage lease refresh failed; lease may expire");
                }
            }
        });
    }

    /// True iff the last-written record is still ours and unexpired. A
    /// missed refresh is observed here, on the next operation, rather than
    /// by the background task panicking — the wrapper fails closed.
    pub async fn is_valid(&self) -> bool {
        if !self.held.load(Ordering::SeqCst) {
            return false;
        }
        match self.backend.raw_get(&lock_path()).await {
            Ok(bytes) => match serde_json::from_slice::<LeaseRecord>(&bytes) {
                Ok(record) => record.cluster == self.cluster && Utc::now() < record.expires_at(),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// Release the lease, removing `._lock.json` if it is still ours.
    pub async fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        if let Ok(bytes) = self.backend.raw_get(&lock_path()).await {
            if let Ok(record) = serde_json::from_slice::<LeaseRecord>(&bytes) {
                if record.cluster == self.cluster {
                    let _ = self.backend.raw_remove(&lock_path()).await;
                }
            }
        }
        debug!(cluster = %self.cluster, "storage lease released");
    }
}

impl Drop for StorageLease {
    fn drop(&mut self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_storage::MemoryClient;

    #[tokio::test]
    async fn second_cluster_conflicts_while_first_holds() {
        let backend: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let _first = StorageLease::acquire(backend.clone(), "node-a", Duration::from_secs(60), Duration::from_secs(5))
            .await
            .unwrap();
        let second =
            StorageLease::acquire(backend.clone(), "node-b", Duration::from_secs(60), Duration::from_secs(5)).await;
        assert!(matches!(second, Err(PioneerError::LeaseInvalid(_))));
    }

    #[tokio::test]
    async fn release_allows_other_cluster_to_acquire() {
        let backend: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let first = StorageLease::acquire(backend.clone(), "node-a", Duration::from_secs(60), Duration::from_secs(5))
            .await
            .unwrap();
        first.release().await;
        let second =
            StorageLease::acquire(backend.clone(), "node-b", Duration::from_secs(60), Duration::from_secs(5)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn expired_lease_is_invalid() {
        let backend: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let lease = StorageLease::acquire(backend, "node-a", Duration::from_millis(20), Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!lease.is_valid().await);
    }
}
