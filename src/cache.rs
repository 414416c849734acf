//! # Cache Backends
//!
//! Persistenza delle `CacheEntry` tra una build e l'altra.
//!
//! ## Responsabilità:
//! - `CacheBackend`: contratto key/value `get(name, key)` / `put(name, key, entry)`
//! - `MemoryCache`: mappa in memoria, vive quanto il processo
//! - `FileCache`: file JSON per progetto, riscritto ad ogni `put`
//!
//! ## Politica:
//! - Una entry per nome di asset; un `put` con fingerprint nuovo sovrascrive
//! - `get` con fingerprint diverso da quello salvato → miss
//!
//! ## Esempio struttura cache file:
//! ```json
//! {
//!   "entries": {
//!     "main.css": {
//!       "fingerprint": "9f2c…",
//!       "stored_at": 1642680000,
//!       "entry": { "source": { "kind": "raw", "code": ".a{color:red}" }, "warnings": [] }
//!     }
//!   }
//! }
//! ```

use crate::asset::Source;
use crate::error::MinimizeError;
use crate::fingerprint::Fingerprint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Cached result of a successful chain run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source: Source,
    pub warnings: Vec<String>,
}

/// Key/value store for cache entries
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, name: &str, key: &Fingerprint) -> Result<Option<CacheEntry>, MinimizeError>;

    async fn put(&self, name: &str, key: &Fingerprint, entry: CacheEntry) -> Result<(), MinimizeError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    fingerprint: Fingerprint,
    stored_at: u64,
    entry: CacheEntry,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: HashMap<String, StoredEntry>,
}

impl CacheFile {
    fn lookup(&self, name: &str, key: &Fingerprint) -> Option<CacheEntry> {
        self.entries
            .get(name)
            .filter(|stored| &stored.fingerprint == key)
            .map(|stored| stored.entry.clone())
    }

    fn store(&mut self, name: &str, key: &Fingerprint, entry: CacheEntry) {
        self.entries.insert(
            name.to_string(),
            StoredEntry {
                fingerprint: key.clone(),
                stored_at: unix_now(),
                entry,
            },
        );
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<CacheFile>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, name: &str, key: &Fingerprint) -> Result<Option<CacheEntry>, MinimizeError> {
        Ok(self.state.lock().await.lookup(name, key))
    }

    async fn put(&self, name: &str, key: &Fingerprint, entry: CacheEntry) -> Result<(), MinimizeError> {
        self.state.lock().await.store(name, key, entry);
        Ok(())
    }
}

/// JSON cache file, one per project directory
pub struct FileCache {
    path: PathBuf,
    state: Mutex<CacheFile>,
}

impl FileCache {
    /// Default location: `<user cache dir>/css-minimizer`
    pub fn default_dir() -> Result<PathBuf, MinimizeError> {
        dirs::cache_dir()
            .map(|dir| dir.join("css-minimizer"))
            .ok_or_else(|| MinimizeError::Cache("Could not find cache directory".to_string()))
    }

    /// Open (or create) the cache file for `project` inside `cache_dir`
    pub async fn open(cache_dir: &Path, project: &Path) -> Result<Self, MinimizeError> {
        fs::create_dir_all(cache_dir).await?;

        // One file per project, named after the project path
        let hash = hex::encode(Sha256::digest(project.to_string_lossy().as_bytes()));
        let path = cache_dir.join(format!("entries_{}.json", &hash[..16]));

        let state = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Discarding unreadable cache file {}: {}", path.display(), e);
                CacheFile::default()
            })
        } else {
            CacheFile::default()
        };

        debug!(
            "Cache file {} ({} entries)",
            path.display(),
            state.entries.len()
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Drop entries for assets that no longer exist
    pub async fn retain_assets(&self, names: &[&str]) -> Result<usize, MinimizeError> {
        let (content, removed) = {
            let mut state = self.state.lock().await;
            let before = state.entries.len();
            state.entries.retain(|name, _| names.contains(&name.as_str()));
            let removed = before - state.entries.len();
            if removed == 0 {
                return Ok(0);
            }
            debug!("Removed {} stale cache entries", removed);
            (serde_json::to_string_pretty(&*state)?, removed)
        };
        fs::write(&self.path, content).await?;
        Ok(removed)
    }
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn get(&self, name: &str, key: &Fingerprint) -> Result<Option<CacheEntry>, MinimizeError> {
        Ok(self.state.lock().await.lookup(name, key))
    }

    async fn put(&self, name: &str, key: &Fingerprint, entry: CacheEntry) -> Result<(), MinimizeError> {
        // Held across the write so concurrent puts land in order
        let mut state = self.state.lock().await;
        state.store(name, key, entry);
        let content = serde_json::to_string_pretty(&*state)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}
