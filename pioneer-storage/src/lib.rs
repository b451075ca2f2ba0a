//! The storage layer: object/header models, the `StorageClient` contract,
//! and the concrete backends that implement it.

mod backends;
mod client;
mod header;
mod object;

pub use backends::{build_backend, BackendKind, LocalClient, MemoryClient, S3Client};
pub use client::{ClientInfo, Medium, StorageClient};
pub use header::Header;
pub use object::{
    AccessTimeInfo, CompressionAlgorithm, ContentInfo, EncryptionAlgorithm, FileData, HashSignature,
    Item, Metadata, Object, PermissionFlags, PermissionInfo, RetentionClass, SizeInfo, TypeSignature,
};
