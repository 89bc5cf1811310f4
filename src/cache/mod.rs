//! Two-tier (memory, then disk) time-to-live cache.
//!
//! Entries are keyed by a logical dataset name. The memory tier is the fast path
//! within a process lifetime; the disk tier is one JSON document per key,
//! `{"timestamp": <epoch seconds>, "data": <payload>}`, and survives restarts.
//!
//! Expiry is evaluated lazily on read: an entry is fresh iff `now - written_at < ttl`.
//! Nothing is ever deleted; a stale entry simply stops being served.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::PulseError;

/// Defines how a read-through call treats the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve a fresh entry if present; otherwise fetch and write through. (Default)
    #[default]
    Use,
    /// Always fetch, bypassing any cached entry, and write the new result through.
    Refresh,
    /// Always fetch and neither read from nor write to the cache.
    Bypass,
}

/// Which tier satisfied a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheTier {
    Memory,
    Disk,
}

/// A payload together with the instant it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    #[serde(rename = "timestamp", with = "epoch_seconds")]
    pub written_at: DateTime<Utc>,
    pub data: T,
}

/// A successful cache read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    pub payload: T,
    pub written_at: DateTime<Utc>,
    pub age: Duration,
    pub tier: CacheTier,
}

/// Returns the age of an entry if it is still fresh at `now`.
///
/// Age equal to `ttl` counts as expired. A timestamp slightly ahead of `now`
/// (less than one `ttl`) is treated as age zero; anything further in the future
/// is treated as expired so a bogus timestamp cannot pin an entry forever.
pub fn fresh_age(written_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> Option<Duration> {
    match (now - written_at).to_std() {
        Ok(age) if age < ttl => Some(age),
        Ok(_) => None,
        Err(_) => match (written_at - now).to_std() {
            Ok(ahead) if ahead < ttl => Some(Duration::ZERO),
            _ => None,
        },
    }
}

/// Two-tier TTL cache for payloads of type `T`.
#[derive(Debug)]
pub struct CacheStore<T> {
    memory: RwLock<HashMap<String, CacheEntry<T>>>,
    disk_dir: Option<PathBuf>,
    ttl: Duration,
}

impl<T> CacheStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// A memory-only store.
    pub fn new(ttl: Duration) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            disk_dir: None,
            ttl,
        }
    }

    /// A store whose disk tier lives in `dir` (one `<key>.json` file per key).
    pub fn with_disk_dir(ttl: Duration, dir: impl Into<PathBuf>) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            disk_dir: Some(dir.into()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Location of the disk document for `key`, if the disk tier is enabled.
    pub fn disk_path(&self, key: &str) -> Option<PathBuf> {
        self.disk_dir
            .as_ref()
            .map(|d| d.join(format!("{key}.json")))
    }

    /// Reads `key` as of the current wall-clock time.
    pub async fn read(&self, key: &str) -> Option<CacheHit<T>> {
        self.read_at(key, Utc::now()).await
    }

    /// Reads `key` as of `now`: memory first, then disk.
    ///
    /// A fresh disk entry is copied into memory (keeping its original timestamp)
    /// before it is returned, so later reads within the TTL stay off the disk.
    pub async fn read_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheHit<T>> {
        {
            let guard = self.memory.read().await;
            if let Some(entry) = guard.get(key) {
                if let Some(age) = fresh_age(entry.written_at, now, self.ttl) {
                    return Some(CacheHit {
                        payload: entry.data.clone(),
                        written_at: entry.written_at,
                        age,
                        tier: CacheTier::Memory,
                    });
                }
            }
        }

        let entry = self.load_disk(key).await?;
        let age = fresh_age(entry.written_at, now, self.ttl)?;
        let hit = CacheHit {
            payload: entry.data.clone(),
            written_at: entry.written_at,
            age,
            tier: CacheTier::Disk,
        };
        self.memory.write().await.insert(key.to_string(), entry);
        Some(hit)
    }

    /// Latest memory entry for `key`, fresh or not.
    pub async fn peek(&self, key: &str) -> Option<CacheEntry<T>> {
        self.memory.read().await.get(key).cloned()
    }

    /// Writes `payload` to both tiers with timestamp `now`, replacing any previous entry.
    ///
    /// A disk failure is logged and leaves the memory tier updated.
    pub async fn write(&self, key: &str, payload: T, now: DateTime<Utc>) {
        let entry = CacheEntry {
            written_at: now,
            data: payload,
        };
        if let Some(path) = self.disk_path(key) {
            if let Err(e) = store_document(&path, &entry).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to persist cache entry");
            }
        }
        self.memory.write().await.insert(key.to_string(), entry);
    }

    /// Loads the disk entry for `key` into memory regardless of its age.
    ///
    /// Used once at startup. Returns whether an entry was loaded.
    pub async fn hydrate(&self, key: &str) -> bool {
        match self.load_disk(key).await {
            Some(entry) => {
                self.memory.write().await.insert(key.to_string(), entry);
                true
            }
            None => false,
        }
    }

    async fn load_disk(&self, key: &str) -> Option<CacheEntry<T>> {
        let path = self.disk_path(key)?;
        match load_document(&path).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cache file");
                None
            }
        }
    }
}

async fn load_document<T: DeserializeOwned>(path: &Path) -> Result<Option<CacheEntry<T>>, PulseError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&raw)?))
}

/// Replaces the document at `path` via a sibling temp file and a rename.
async fn store_document<T: Serialize>(path: &Path, entry: &CacheEntry<T>) -> Result<(), PulseError> {
    let body = serde_json::to_vec(entry)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Serde adapter: `DateTime<Utc>` as fractional Unix seconds.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(dt.timestamp_micros() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() {
            return Err(D::Error::custom("non-finite timestamp"));
        }
        #[allow(clippy::cast_possible_truncation)]
        let micros = (secs * 1_000_000.0).round() as i64;
        DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
    }
}
