use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::storage::{validate_name, StoreResult};
use super::{CacheBucket, CacheStorage, CachedData, CachedResponse, StoreError};
use crate::net::Response;

type Buckets = Vec<(String, BTreeMap<String, CachedResponse>)>;

/// Process-local bucket store. Bucket names are kept in creation order.
/// Clone is cheap and shares the same buckets.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    buckets: Arc<RwLock<Buckets>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    type Bucket = MemoryBucket;

    async fn open(&self, name: &str) -> StoreResult<MemoryBucket> {
        validate_name(name)?;
        let mut buckets = self.buckets.write().await;
        if !buckets.iter().any(|(n, _)| n == name) {
            buckets.push((name.to_string(), BTreeMap::new()));
        }
        Ok(MemoryBucket {
            name: name.to_string(),
            buckets: Arc::clone(&self.buckets),
        })
    }

    async fn get(&self, name: &str) -> StoreResult<Option<MemoryBucket>> {
        let exists = self.buckets.read().await.iter().any(|(n, _)| n == name);
        Ok(exists.then(|| MemoryBucket {
            name: name.to_string(),
            buckets: Arc::clone(&self.buckets),
        }))
    }

    async fn has(&self, name: &str) -> StoreResult<bool> {
        Ok(self.buckets.read().await.iter().any(|(n, _)| n == name))
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .map(|(n, _)| n.clone())
            .collect())
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|(n, _)| n != name);
        Ok(buckets.len() != before)
    }
}

/// Handle to a bucket of a [`MemoryStorage`].
///
/// Writes through a handle whose bucket has since been deleted fail with
/// [`StoreError::MissingBucket`].
pub struct MemoryBucket {
    name: String,
    buckets: Arc<RwLock<Buckets>>,
}

#[async_trait]
impl CacheBucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_key(&self, key: &str) -> StoreResult<Option<CachedResponse>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .iter()
            .find(|(n, _)| *n == self.name)
            .and_then(|(_, entries)| entries.get(key).cloned()))
    }

    async fn put(&self, key: &str, response: &Response) -> StoreResult<()> {
        let mut buckets = self.buckets.write().await;
        let entries = buckets
            .iter_mut()
            .find(|(n, _)| *n == self.name)
            .map(|(_, entries)| entries)
            .ok_or_else(|| StoreError::MissingBucket(self.name.clone()))?;
        entries.insert(key.to_string(), CachedData::new(response.clone()));
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .iter()
            .find(|(n, _)| *n == self.name)
            .map(|(_, entries)| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_bucket_once() {
        let storage = MemoryStorage::new();
        storage.open("a").await.unwrap();
        storage.open("b").await.unwrap();
        storage.open("a").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let storage = MemoryStorage::new();
        let bucket = storage.open("v1").await.unwrap();
        let response = Response::new("http://app/", 200, b"shell".to_vec());

        bucket.put("http://app/", &response).await.unwrap();

        let hit = bucket.match_key("http://app/").await.unwrap().unwrap();
        assert_eq!(hit.data, response);
        assert!(bucket.match_key("http://app/other").await.unwrap().is_none());
        assert_eq!(bucket.keys().await.unwrap(), vec!["http://app/"]);
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let storage = MemoryStorage::new();
        let one = storage.open("one").await.unwrap();
        let two = storage.open("two").await.unwrap();
        one.put("k", &Response::new("k", 200, vec![1])).await.unwrap();
        assert!(two.match_key("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.open("gone").await.unwrap();
        assert!(storage.delete("gone").await.unwrap());
        assert!(!storage.delete("gone").await.unwrap());
        assert!(!storage.delete("never-existed").await.unwrap());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_never_creates() {
        let storage = MemoryStorage::new();
        assert!(storage.get("v1").await.unwrap().is_none());
        assert!(!storage.has("v1").await.unwrap());

        storage.open("v1").await.unwrap();
        let bucket = storage.get("v1").await.unwrap().unwrap();
        assert_eq!(bucket.name(), "v1");
    }

    #[tokio::test]
    async fn test_put_into_deleted_bucket_fails() {
        let storage = MemoryStorage::new();
        let bucket = storage.open("v1").await.unwrap();
        storage.delete("v1").await.unwrap();
        let result = bucket.put("k", &Response::new("k", 200, vec![])).await;
        assert!(matches!(result, Err(StoreError::MissingBucket(_))));
        assert!(!storage.has("v1").await.unwrap());
    }
}
