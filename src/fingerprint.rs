//! # Fingerprint Store
//!
//! Deriva la chiave di cache di un asset e fa da facciata verso il backend
//! di cache.
//!
//! ## Responsabilità:
//! - `Fingerprint`: sha256(hash del contenuto + digest della catena)
//! - `get`/`put` sul backend configurato
//! - Backend non disponibile → sempre miss (loggato, mai propagato)
//!
//! ## Invalidazione:
//! - Contenuto diverso (code o source map) → fingerprint diverso
//! - Minifier, versione o opzioni diverse → digest diverso → fingerprint diverso

use crate::asset::Asset;
use crate::cache::{CacheBackend, CacheEntry, MemoryCache};
use crate::chain::TransformChain;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Content-addressed cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest of the active chain configuration, computed once per build
pub fn chain_digest(chain: &TransformChain) -> String {
    let identity = chain.identity().to_string();
    hex::encode(Sha256::digest(identity.as_bytes()))
}

/// Cache facade used by the scheduler
#[derive(Clone)]
pub struct FingerprintStore {
    backend: Option<Arc<dyn CacheBackend>>,
}

impl FingerprintStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Store backed by a process-local map
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    /// Every lookup misses, nothing is written
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn key(&self, asset: &Asset, chain_digest: &str) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(asset.content_hash().as_bytes());
        hasher.update([0u8]);
        hasher.update(chain_digest.as_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub async fn get(&self, name: &str, key: &Fingerprint) -> Option<CacheEntry> {
        let backend = self.backend.as_ref()?;
        match backend.get(name, key).await {
            Ok(entry) => {
                debug!(
                    "cache {} for {}",
                    if entry.is_some() { "hit" } else { "miss" },
                    name
                );
                entry
            }
            Err(e) => {
                warn!("Cache lookup failed for {}, recomputing: {}", name, e);
                None
            }
        }
    }

    pub async fn put(&self, name: &str, key: &Fingerprint, entry: CacheEntry) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if let Err(e) = backend.put(name, key, entry).await {
            warn!("Cache write failed for {}: {}", name, e);
        }
    }
}

impl Default for FingerprintStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
