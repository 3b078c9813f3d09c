//! The bucket store the cache manager persists generations in.
//!
//! Shaped after the browser Cache Storage API: named buckets, each mapping
//! a request key to a response snapshot. Hosts inject their own
//! implementation; this crate ships [`MemoryStorage`](super::MemoryStorage)
//! and [`FileStorage`](super::FileStorage).

use async_trait::async_trait;

use super::{CachedResponse, StoreError};
use crate::net::Response;

pub type StoreResult<T> = Result<T, StoreError>;

/// Named collection of buckets.
#[async_trait]
pub trait CacheStorage: Send + Sync + 'static {
    type Bucket: CacheBucket + 'static;

    /// Open a bucket, creating it if it does not exist yet.
    async fn open(&self, name: &str) -> StoreResult<Self::Bucket>;

    /// Handle to an existing bucket. Never creates one.
    async fn get(&self, name: &str) -> StoreResult<Option<Self::Bucket>>;

    /// Whether a bucket with this name exists.
    async fn has(&self, name: &str) -> StoreResult<bool>;

    /// Names of all existing buckets.
    async fn keys(&self) -> StoreResult<Vec<String>>;

    /// Delete a bucket. Returns `false` when it did not exist.
    async fn delete(&self, name: &str) -> StoreResult<bool>;
}

/// Handle to one bucket.
#[async_trait]
pub trait CacheBucket: Send + Sync {
    fn name(&self) -> &str;

    /// Look up the snapshot stored under `key`.
    async fn match_key(&self, key: &str) -> StoreResult<Option<CachedResponse>>;

    /// Store a snapshot of `response` under `key`, replacing any older one.
    async fn put(&self, key: &str, response: &Response) -> StoreResult<()>;

    /// Store several snapshots at once.
    async fn put_all(&self, entries: &[(String, Response)]) -> StoreResult<()> {
        for (key, response) in entries {
            self.put(key, response).await?;
        }
        Ok(())
    }

    /// Keys of every stored entry.
    async fn keys(&self) -> StoreResult<Vec<String>>;
}

/// Bucket names end up as file names, so keep them to a safe alphabet.
pub(crate) fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("v60-recipe-v1.4.0").is_ok());
        assert!(validate_name("fonts_cache").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../escape").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("with space").is_err());
        assert!(validate_name("a/b").is_err());
    }
}
