//! File-backed key/value cache with expiry
//!
//! One JSON file per key: `<dir>/<sanitized key>.cache` holding
//! `{ "value": ..., "expires": <unix seconds> }`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct Entry<T> {
    value: T,
    expires: f64,
}

pub struct FileCache {
    dir: PathBuf,
    default_ttl: Duration,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, default_ttl: Duration) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, default_ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keep `[A-Za-z0-9-_.]`; anything that sanitizes to nothing is `default`
    fn file_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();
        let safe = if safe.is_empty() { "default".to_string() } else { safe };
        self.dir.join(format!("{}.cache", safe))
    }

    /// Cached value, or `None` when missing, expired or unreadable
    ///
    /// Expired and unreadable files are removed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.file_for(key);
        let content = fs::read_to_string(&path).ok()?;

        match serde_json::from_str::<Entry<T>>(&content) {
            Ok(entry) if now_secs() <= entry.expires => Some(entry.value),
            Ok(_) => {
                debug!("Cache entry {} expired", key);
                let _ = fs::remove_file(&path);
                None
            }
            Err(e) => {
                warn!("Dropping unreadable cache entry {}: {}", key, e);
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Store `value`; `ttl` defaults to the cache's default
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<(), CacheError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = Entry {
            value,
            expires: now_secs() + ttl.as_secs_f64(),
        };
        fs::write(self.file_for(key), serde_json::to_string(&entry)?)?;
        Ok(())
    }

    /// Return the cached value or compute, store and return it
    pub fn get_or_insert_with<T, F>(&self, key: &str, ttl: Option<Duration>, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get(key) {
            return hit;
        }
        let value = compute();
        if let Err(e) = self.set(key, &value, ttl) {
            warn!("Could not save to cache: {}", e);
        }
        value
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "cache") {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    pub fn clear_key(&self, key: &str) {
        let _ = fs::remove_file(self.file_for(key));
    }
}
