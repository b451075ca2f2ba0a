//! The error taxonomy shared by every layer of the storage stack.
//!
//! A `thiserror` enum with one variant per failure kind, matched against by
//! callers that need to recover, while everything above the storage
//! contract itself keeps using `anyhow::Result` for ordinary propagation.

use thiserror::Error;

/// Errors raised by the storage, wrapper, distribution, and database layers.
///
/// `BackendError` wraps an opaque backend failure (I/O, network) that
/// callers are not expected to match on; every other variant is a condition
/// a caller can recover from by inspecting the variant.
#[derive(Debug, Error)]
pub enum PioneerError {
    /// `get`/`stat`/`remove`/`update`/`merge` against a key with no object.
    #[error("not found: {0}")]
    NotFound(String),

    /// `insert` against a key that already has a value.
    #[error("already exists: {0}")]
    Exists(String),

    /// A public call named a reserved key.
    #[error("reserved key: {0}")]
    Reserved(String),

    /// A sharded wrapper received a key whose `storage` tag it does not own.
    #[error("wrong shard: key {key} does not belong to shard {shard}")]
    WrongShard { key: String, shard: String },

    /// A distributed lock could not be acquired before its timeout elapsed.
    #[error("lock unavailable: {0}")]
    LockUnavailable(String),

    /// A storage-wide lease has expired or is held by a different cluster.
    #[error("lease invalid: {0}")]
    LeaseInvalid(String),

    /// The merge schema named a strategy that does not apply to a field.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A `Data` value could not be serialized, even after the configured
    /// fallback encoding was tried.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An I/O or network failure inside a concrete backend driver.
    #[error("backend error: {0}")]
    BackendError(#[source] anyhow::Error),
}

impl PioneerError {
    /// True for errors that represent the normal "nothing there" case,
    /// as opposed to an operational fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PioneerError::NotFound(_))
    }
}

pub type PioneerResult<T> = std::result::Result<T, PioneerError>;
