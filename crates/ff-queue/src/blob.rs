//! An in-memory [`BlobStore`] double, shared by tests and the demo binary.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use ff_codec::{BlobStore, BlobStoreError};

#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), BlobStoreError> {
        self.objects.lock().unwrap().insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobStoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| BlobStoreError::Get(format!("no such object {bucket}/{key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryBlobStore::new();
        store.put("b", "k", b"hello").await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), b"hello");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_key_errors() {
        let store = InMemoryBlobStore::new();
        assert!(store.get("b", "missing").await.is_err());
    }
}
