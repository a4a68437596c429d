//! Cache storage backends

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::{fs, sync::RwLock};

use crate::config::MAX_TTL_SECS;
use crate::key::wildcard_match;
use crate::Result;

/// A cached value with its absolute expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: String,
    /// The cached data
    pub value: serde_json::Value,
    /// When the entry was created
    pub created_at: SystemTime,
    /// When the entry stops being served
    pub expires_at: SystemTime,
}

impl CacheEntry {
    /// Create a new cache entry
    ///
    /// TTLs longer than [`MAX_TTL_SECS`] are clamped to it.
    pub fn new(key: impl Into<String>, value: serde_json::Value, ttl: Duration) -> Self {
        let created_at = SystemTime::now();
        let ttl = ttl.min(Duration::from_secs(MAX_TTL_SECS));
        Self {
            key: key.into(),
            value,
            created_at,
            expires_at: created_at.checked_add(ttl).unwrap_or(created_at),
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Get remaining TTL
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.duration_since(SystemTime::now()).ok()
    }
}

/// Cache storage trait
///
/// Implemented by the in-process map and by any durable tier plugged in
/// behind it.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Store an entry, replacing any entry under the same key
    async fn set(&self, entry: CacheEntry) -> Result<()>;

    /// Retrieve an entry, expired or not
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Remove an entry
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove every entry whose key matches a `*` pattern
    async fn remove_matching(&self, pattern: &str) -> Result<usize>;

    /// Remove every expired entry
    async fn purge_expired(&self) -> Result<usize>;

    /// Clear all entries
    async fn clear(&self) -> Result<()>;

    /// Get number of entries
    async fn len(&self) -> Result<usize>;

    /// Get all keys
    async fn keys(&self) -> Result<Vec<String>>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, (u64, CacheEntry)>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((seq, _)) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }

    fn remove_where(&mut self, mut predicate: impl FnMut(&CacheEntry) -> bool) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, (_, entry))| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }
}

/// Bounded in-memory cache storage
///
/// When an insert pushes the map past `max_entries`, the oldest
/// `eviction_batch` entries by insertion order are dropped. Re-setting a key
/// counts as a fresh insertion. This approximates LRU without tracking reads.
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
    max_entries: usize,
    eviction_batch: usize,
}

impl MemoryStorage {
    /// Create new in-memory storage
    pub fn new(max_entries: usize, eviction_batch: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_entries: max_entries.max(1),
            eviction_batch: eviction_batch.max(1),
        }
    }

    /// Capacity before eviction kicks in
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Insert an entry and evict on overflow
    ///
    /// # Returns
    /// Number of entries evicted to make room
    pub async fn insert(&self, entry: CacheEntry) -> usize {
        let mut state = self.state.write().await;

        state.remove(&entry.key);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert(seq, entry.key.clone());
        state.entries.insert(entry.key.clone(), (seq, entry));

        if state.entries.len() <= self.max_entries {
            return 0;
        }

        let mut evicted = 0;
        while evicted < self.eviction_batch && state.entries.len() > 1 {
            match state.order.pop_first() {
                Some((_, key)) => {
                    state.entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(1000, 100)
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn set(&self, entry: CacheEntry) -> Result<()> {
        self.insert(entry).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let state = self.state.read().await;
        Ok(state.entries.get(key).map(|(_, entry)| entry.clone()))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.remove(key))
    }

    async fn remove_matching(&self, pattern: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        Ok(state.remove_where(|entry| wildcard_match(pattern, &entry.key)))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        Ok(state.remove_where(CacheEntry::is_expired))
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.order.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state.entries.len())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.order.values().cloned().collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Disk-based durable cache storage
///
/// One JSON file per entry, named after the SHA-256 of its key so arbitrary
/// keys map to safe, collision-free file names.
pub struct DiskStorage {
    base_path: PathBuf,
}

impl DiskStorage {
    /// Create new disk storage with base path
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Get file path for a key
    fn key_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.base_path.join(format!("{}.cache", digest))
    }

    /// Ensure base directory exists
    async fn ensure_base_dir(&self) -> Result<()> {
        if !fs::try_exists(&self.base_path).await? {
            fs::create_dir_all(&self.base_path).await?;
        }
        Ok(())
    }

    async fn read_entry(path: &Path) -> Result<Option<CacheEntry>> {
        match fs::read_to_string(path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every `.cache` file under the base path
    async fn cache_files(&self) -> Result<Vec<PathBuf>> {
        if !fs::try_exists(&self.base_path).await? {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "cache") {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn remove_where(&self, predicate: impl Fn(&CacheEntry) -> bool) -> Result<usize> {
        let mut removed = 0;
        for file in self.cache_files().await? {
            // Unreadable files are dropped too; they can never be served.
            let doomed = match Self::read_entry(&file).await {
                Ok(Some(entry)) => predicate(&entry),
                Ok(None) => false,
                Err(_) => true,
            };
            if doomed && fs::remove_file(&file).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn set(&self, entry: CacheEntry) -> Result<()> {
        self.ensure_base_dir().await?;
        let json = serde_json::to_string(&entry)?;
        fs::write(self.key_path(&entry.key), json).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Self::read_entry(&self.key_path(key)).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_matching(&self, pattern: &str) -> Result<usize> {
        self.remove_where(|entry| wildcard_match(pattern, &entry.key))
            .await
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.remove_where(CacheEntry::is_expired).await
    }

    async fn clear(&self) -> Result<()> {
        for file in self.cache_files().await? {
            fs::remove_file(&file).await?;
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.cache_files().await?.len())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for file in self.cache_files().await? {
            if let Ok(Some(entry)) = Self::read_entry(&file).await {
                keys.push(entry.key);
            }
        }
        Ok(keys)
    }

    fn name(&self) -> &str {
        "disk"
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn entry(key: &str, ttl: Duration) -> CacheEntry {
        CacheEntry::new(key, serde_json::json!({"key": key}), ttl)
    }

    #[test]
    fn test_oversized_ttl_is_clamped() {
        let endless = entry("k", Duration::MAX);
        assert!(!endless.is_expired());
        let remaining = endless.ttl_remaining().unwrap();
        assert!(remaining <= Duration::from_secs(MAX_TTL_SECS));
        assert!(remaining > Duration::from_secs(MAX_TTL_SECS - 60));
    }

    #[tokio::test]
    async fn test_memory_storage_basic_operations() {
        let storage = MemoryStorage::new(10, 1);

        storage.set(entry("k1", Duration::from_secs(60))).await.unwrap();
        let retrieved = storage.get("k1").await.unwrap().unwrap();
        assert_eq!(retrieved.value, serde_json::json!({"key": "k1"}));

        assert!(storage.remove("k1").await.unwrap());
        assert!(!storage.remove("k1").await.unwrap());
        assert!(storage.get("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_storage_evicts_oldest_batch() {
        let storage = MemoryStorage::new(4, 2);
        for i in 0..4 {
            assert_eq!(storage.insert(entry(&format!("k{}", i), Duration::from_secs(60))).await, 0);
        }

        let evicted = storage.insert(entry("k4", Duration::from_secs(60))).await;
        assert_eq!(evicted, 2);
        assert_eq!(storage.len().await.unwrap(), 3);
        assert_eq!(storage.keys().await.unwrap(), vec!["k2", "k3", "k4"]);
    }

    #[tokio::test]
    async fn test_memory_storage_reinsert_refreshes_order() {
        let storage = MemoryStorage::new(2, 1);
        storage.insert(entry("a", Duration::from_secs(60))).await;
        storage.insert(entry("b", Duration::from_secs(60))).await;
        storage.insert(entry("a", Duration::from_secs(60))).await;
        storage.insert(entry("c", Duration::from_secs(60))).await;

        assert!(storage.get("b").await.unwrap().is_none());
        assert!(storage.get("a").await.unwrap().is_some());
        assert!(storage.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_storage_remove_matching_and_purge() {
        let storage = MemoryStorage::new(10, 1);
        storage.insert(entry("files:/a:h:GUEST", Duration::from_secs(60))).await;
        storage.insert(entry("files:/a:h:ADMIN", Duration::from_secs(60))).await;
        storage.insert(entry("files:/b:h:GUEST", Duration::from_millis(1))).await;

        assert_eq!(storage.remove_matching("*:ADMIN").await.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(storage.purge_expired().await.unwrap(), 1);
        assert_eq!(storage.keys().await.unwrap(), vec!["files:/a:h:GUEST"]);
    }

    #[tokio::test]
    async fn test_disk_storage_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DiskStorage::new(temp_dir.path().join("cache"));

        let original = entry("files:/a b/:h:GUEST", Duration::from_secs(3600));
        storage.set(original.clone()).await.unwrap();

        let retrieved = storage.get("files:/a b/:h:GUEST").await.unwrap().unwrap();
        assert_eq!(retrieved, original);
        assert_eq!(storage.len().await.unwrap(), 1);
        assert_eq!(storage.keys().await.unwrap(), vec!["files:/a b/:h:GUEST"]);

        assert!(storage.remove("files:/a b/:h:GUEST").await.unwrap());
        assert!(storage.get("files:/a b/:h:GUEST").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_storage_remove_matching() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DiskStorage::new(temp_dir.path());

        storage.set(entry("tree:/x:h:GUEST", Duration::from_secs(60))).await.unwrap();
        storage.set(entry("tree:/x:h:ADMIN", Duration::from_secs(60))).await.unwrap();

        assert_eq!(storage.remove_matching("*:GUEST").await.unwrap(), 1);
        assert_eq!(storage.keys().await.unwrap(), vec!["tree:/x:h:ADMIN"]);

        storage.clear().await.unwrap();
        assert_eq!(storage.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_entry_expiration() {
        let entry = entry("k", Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(entry.is_expired());
        assert!(entry.ttl_remaining().is_none());
    }

    #[tokio::test]
    async fn test_cache_entry_ttl_remaining() {
        let entry = entry("k", Duration::from_secs(10));
        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining.as_secs() <= 10);
        assert!(remaining.as_secs() > 5);
    }
}
