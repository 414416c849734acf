//! # Asset Model
//!
//! Un asset è un artefatto di build identificato dal nome, con il suo
//! contenuto (`Source`), l'eventuale source map e i metadati (`AssetInfo`).

use crate::sourcemap::SourceMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Content of an asset, with or without an attached source map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    Raw {
        code: String,
    },
    /// Map-bearing content. `original_source` and `inner_source_map` keep the
    /// input this content was produced from, so later build stages can chain maps.
    Mapped {
        code: String,
        name: String,
        map: SourceMap,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original_source: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inner_source_map: Option<SourceMap>,
    },
}

impl Source {
    pub fn raw(code: impl Into<String>) -> Self {
        Self::Raw { code: code.into() }
    }

    /// Content produced by an upstream stage together with its map
    pub fn with_map(name: impl Into<String>, code: impl Into<String>, map: SourceMap) -> Self {
        Self::Mapped {
            code: code.into(),
            name: name.into(),
            map,
            original_source: None,
            inner_source_map: None,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Raw { code } | Self::Mapped { code, .. } => code,
        }
    }

    pub fn map(&self) -> Option<&SourceMap> {
        match self {
            Self::Raw { .. } => None,
            Self::Mapped { map, .. } => Some(map),
        }
    }

    pub fn size(&self) -> u64 {
        self.code().len() as u64
    }
}

/// Metadata the host keeps per asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub minimized: bool,
}

/// A named asset as listed by an `AssetStore`
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub source: Source,
    pub info: AssetInfo,
    content_hash: OnceLock<String>,
}

impl Asset {
    pub fn new(name: impl Into<String>, source: Source, info: AssetInfo) -> Self {
        Self {
            name: name.into(),
            source,
            info,
            content_hash: OnceLock::new(),
        }
    }

    /// Hash of code and map, computed on first use
    pub fn content_hash(&self) -> &str {
        self.content_hash.get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update(self.source.code().as_bytes());
            if let Some(map) = self.source.map() {
                hasher.update([0u8]);
                hasher.update(serde_json::to_vec(map).unwrap_or_default());
            }
            hex::encode(hasher.finalize())
        })
    }
}
