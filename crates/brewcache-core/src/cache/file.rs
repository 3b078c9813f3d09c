//! Filesystem-backed bucket store.
//!
//! Each bucket is one pretty-printed JSON file `<name>.json` in the cache
//! directory, mapping request keys to cached responses. Files are replaced
//! atomically (write to a temp file, then rename).

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::storage::{validate_name, StoreResult};
use super::{CacheBucket, CacheStorage, CachedData, CachedResponse, StoreError};
use crate::net::Response;

const BUCKET_EXTENSION: &str = "json";

type Entries = BTreeMap<String, CachedResponse>;

#[derive(Clone)]
pub struct FileStorage {
    cache_dir: PathBuf,
    /// Serializes read-modify-write cycles on bucket files.
    write_lock: Arc<Mutex<()>>,
}

impl FileStorage {
    pub fn new(cache_dir: PathBuf) -> StoreResult<Self> {
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| StoreError::io(&cache_dir.display().to_string(), e))?;
        Ok(Self {
            cache_dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn bucket_path(cache_dir: &Path, name: &str) -> PathBuf {
        cache_dir.join(format!("{}.{}", name, BUCKET_EXTENSION))
    }
}

async fn load(path: &Path, name: &str) -> StoreResult<Option<Entries>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(name, e)),
    };

    let entries = serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
        name: name.to_string(),
        source,
    })?;

    Ok(Some(entries))
}

async fn save(path: &Path, name: &str, entries: &Entries) -> StoreResult<()> {
    let contents = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Corrupt {
        name: name.to_string(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| StoreError::io(name, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(name, e))?;
    Ok(())
}

#[async_trait]
impl CacheStorage for FileStorage {
    type Bucket = FileBucket;

    async fn open(&self, name: &str) -> StoreResult<FileBucket> {
        validate_name(name)?;
        let path = Self::bucket_path(&self.cache_dir, name);

        let _guard = self.write_lock.lock().await;
        if load(&path, name).await?.is_none() {
            debug!(cache = name, "Creating cache bucket");
            save(&path, name, &Entries::new()).await?;
        }

        Ok(FileBucket {
            name: name.to_string(),
            path,
            write_lock: Arc::clone(&self.write_lock),
        })
    }

    async fn get(&self, name: &str) -> StoreResult<Option<FileBucket>> {
        if !self.has(name).await? {
            return Ok(None);
        }
        Ok(Some(FileBucket {
            name: name.to_string(),
            path: Self::bucket_path(&self.cache_dir, name),
            write_lock: Arc::clone(&self.write_lock),
        }))
    }

    async fn has(&self, name: &str) -> StoreResult<bool> {
        if validate_name(name).is_err() {
            return Ok(false);
        }
        let path = Self::bucket_path(&self.cache_dir, name);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(name, e))
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let dir_name = self.cache_dir.display().to_string();
        let mut dir = tokio::fs::read_dir(&self.cache_dir)
            .await
            .map_err(|e| StoreError::io(&dir_name, e))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&dir_name, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BUCKET_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        if validate_name(name).is_err() {
            return Ok(false);
        }
        let path = Self::bucket_path(&self.cache_dir, name);
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(name, e)),
        }
    }
}

pub struct FileBucket {
    name: String,
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

#[async_trait]
impl CacheBucket for FileBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_key(&self, key: &str) -> StoreResult<Option<CachedResponse>> {
        Ok(load(&self.path, &self.name)
            .await?
            .and_then(|mut entries| entries.remove(key)))
    }

    async fn put(&self, key: &str, response: &Response) -> StoreResult<()> {
        self.put_all(&[(key.to_string(), response.clone())]).await
    }

    async fn put_all(&self, new_entries: &[(String, Response)]) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = load(&self.path, &self.name)
            .await?
            .ok_or_else(|| StoreError::MissingBucket(self.name.clone()))?;
        for (key, response) in new_entries {
            entries.insert(key.clone(), CachedData::new(response.clone()));
        }
        save(&self.path, &self.name, &entries).await
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(load(&self.path, &self.name)
            .await?
            .map(|entries| entries.into_keys().collect())
            .unwrap_or_default())
    }
}
