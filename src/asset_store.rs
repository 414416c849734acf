//! Asset store contract and an in-memory implementation.
//!
//! The scheduler only lists assets and replaces the ones it minimized; how
//! assets are loaded and persisted belongs to the store.

use crate::asset::{Asset, AssetInfo, Source};
use crate::error::MinimizeError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Host-side storage of build assets
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Every asset currently in the build, in a stable order
    async fn list_assets(&self) -> Result<Vec<Asset>, MinimizeError>;

    /// Replace the content and metadata of an existing asset
    async fn update_asset(
        &self,
        name: &str,
        source: Source,
        info: AssetInfo,
    ) -> Result<(), MinimizeError>;
}

/// Assets kept in a sorted map
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    assets: Mutex<BTreeMap<String, (Source, AssetInfo)>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, name: impl Into<String>, source: Source) -> Self {
        self.assets
            .get_mut()
            .insert(name.into(), (source, AssetInfo::default()));
        self
    }

    pub async fn insert(&self, name: impl Into<String>, source: Source, info: AssetInfo) {
        self.assets.lock().await.insert(name.into(), (source, info));
    }

    pub async fn get(&self, name: &str) -> Option<(Source, AssetInfo)> {
        self.assets.lock().await.get(name).cloned()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn list_assets(&self) -> Result<Vec<Asset>, MinimizeError> {
        Ok(self
            .assets
            .lock()
            .await
            .iter()
            .map(|(name, (source, info))| Asset::new(name.clone(), source.clone(), info.clone()))
            .collect())
    }

    async fn update_asset(
        &self,
        name: &str,
        source: Source,
        info: AssetInfo,
    ) -> Result<(), MinimizeError> {
        let mut assets = self.assets.lock().await;
        match assets.get_mut(name) {
            Some(slot) => {
                *slot = (source, info);
                Ok(())
            }
            None => Err(MinimizeError::AssetStore(format!("Unknown asset: {}", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_sorted_and_update_replaces() {
        let store = MemoryAssetStore::new()
            .with_asset("b.css", Source::raw(".b { }"))
            .with_asset("a.css", Source::raw(".a { }"));

        let names: Vec<String> = store
            .list_assets()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["a.css", "b.css"]);

        store
            .update_asset("a.css", Source::raw(".a{}"), AssetInfo { minimized: true })
            .await
            .unwrap();
        let (source, info) = store.get("a.css").await.unwrap();
        assert_eq!(source.code(), ".a{}");
        assert!(info.minimized);
    }

    #[tokio::test]
    async fn test_update_unknown_asset_fails() {
        let store = MemoryAssetStore::new();
        let result = store
            .update_asset("nope.css", Source::raw(""), AssetInfo::default())
            .await;
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, MinimizeError::AssetStore(_)));
    }
}
