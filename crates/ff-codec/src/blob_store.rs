//! [`BlobStore`]: the abstract content-addressed store `deliver` falls back
//! to when even the zipped form exceeds the size limit. Out of scope per
//! the protocol (an external collaborator) — specified here only at its
//! interface.

use async_trait::async_trait;
use thiserror::Error;

/// Failures talking to the blob store.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob store put failed: {0}")]
    Put(String),
    #[error("blob store get failed: {0}")]
    Get(String),
}

/// Content-addressed blob storage, keyed by caller-supplied bucket/key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), BlobStoreError>;
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobStoreError>;
}
