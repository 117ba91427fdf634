use crate::constants::PLAN_CACHE_KEY;
use crate::domain::Plan;
use crate::error::{AggregatorError, Result};
use crate::metrics::{emit_counter, MetricName};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// One stored value with its expiry and integrity checksum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Hex SHA-256 of `blob`
    pub checksum: String,
    pub blob: String,
}

pub fn checksum(blob: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(blob.as_bytes());
    hex::encode(hasher.finalize())
}

impl CacheEntry {
    pub fn new(blob: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            stored_at: now,
            expires_at: now + ttl,
            checksum: checksum(blob),
            blob: blob.to_string(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn verify(&self) -> bool {
        checksum(&self.blob) == self.checksum
    }
}

/// Outcome of inspecting a stored entry at read time
enum EntryState {
    Fresh(String),
    Expired,
    Corrupt(String),
}

fn inspect(entry: CacheEntry, now: DateTime<Utc>) -> EntryState {
    if !entry.verify() {
        return EntryState::Corrupt("checksum mismatch".to_string());
    }
    if entry.is_expired(now) {
        return EntryState::Expired;
    }
    EntryState::Fresh(entry.blob)
}

/// Expiry-based key/value store
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fresh value for `key`. Expired entries read as absent and are cleared;
    /// corrupt entries are cleared and reported as `CacheCorruption`.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, blob: &str, ttl: Duration) -> Result<()>;
    async fn clear(&self, key: &str) -> Result<()>;
}

/// In-memory store for development/testing
#[derive(Clone, Default)]
pub struct InMemoryCacheStore {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry access, bypassing expiry and checksum checks
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn insert_entry(&self, key: &str, entry: CacheEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), entry);
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(entry) = self.entry(key) else {
            return Ok(None);
        };
        match inspect(entry, Utc::now()) {
            EntryState::Fresh(blob) => Ok(Some(blob)),
            EntryState::Expired => {
                debug!(key, "Cache entry expired");
                emit_counter(MetricName::CacheExpired, 1);
                self.clear(key).await?;
                Ok(None)
            }
            EntryState::Corrupt(reason) => {
                self.clear(key).await?;
                Err(AggregatorError::CacheCorruption {
                    key: key.to_string(),
                    reason,
                })
            }
        }
    }

    async fn set(&self, key: &str, blob: &str, ttl: Duration) -> Result<()> {
        self.insert_entry(key, CacheEntry::new(blob, ttl, Utc::now()));
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// One JSON entry file per key under a directory
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) => inspect(entry, Utc::now()),
            Err(e) => EntryState::Corrupt(format!("unreadable entry: {e}")),
        };
        match state {
            EntryState::Fresh(blob) => Ok(Some(blob)),
            EntryState::Expired => {
                debug!(key, path = %path.display(), "Cache entry expired");
                emit_counter(MetricName::CacheExpired, 1);
                self.clear(key).await?;
                Ok(None)
            }
            EntryState::Corrupt(reason) => {
                self.clear(key).await?;
                Err(AggregatorError::CacheCorruption {
                    key: key.to_string(),
                    reason,
                })
            }
        }
    }

    async fn set(&self, key: &str, blob: &str, ttl: Duration) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let entry = CacheEntry::new(blob, ttl, Utc::now());
        let json = serde_json::to_vec_pretty(&entry)?;
        // Write then rename so readers never see a half-written entry
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key, path = %path.display(), "Wrote cache entry");
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The merged plan list, persisted through a [`CacheStore`]
#[derive(Clone)]
pub struct PlanCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    key: String,
}

impl PlanCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            key: PLAN_CACHE_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Cached plans, or `None` on miss, expiry or corruption.
    ///
    /// Corrupt entries are discarded so the caller refetches.
    pub async fn load(&self) -> Option<Vec<Plan>> {
        let blob = match self.store.get(&self.key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                emit_counter(MetricName::CacheMisses, 1);
                return None;
            }
            Err(e @ AggregatorError::CacheCorruption { .. }) => {
                warn!("Discarding cached plans: {}", e);
                emit_counter(MetricName::CacheCorruptions, 1);
                return None;
            }
            Err(e) => {
                warn!("Cache read failed: {}", e);
                emit_counter(MetricName::CacheMisses, 1);
                return None;
            }
        };

        match serde_json::from_str::<Vec<Plan>>(&blob) {
            Ok(plans) => {
                info!("Loaded {} plans from cache", plans.len());
                emit_counter(MetricName::CacheHits, 1);
                Some(plans)
            }
            Err(e) => {
                warn!("Cached plan list does not parse, discarding: {}", e);
                emit_counter(MetricName::CacheCorruptions, 1);
                if let Err(e) = self.store.clear(&self.key).await {
                    warn!("Failed to clear corrupt cache entry: {}", e);
                }
                None
            }
        }
    }

    pub async fn store(&self, plans: &[Plan]) -> Result<()> {
        let blob = serde_json::to_string(plans)?;
        self.store.set(&self.key, &blob, self.ttl).await?;
        emit_counter(MetricName::CacheWrites, 1);
        info!("Cached {} plans for {} days", plans.len(), self.ttl.num_days());
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear(&self.key).await
    }
}
