//! # File Management Module
//!
//! Asset store su filesystem: ogni file sotto una directory è un asset.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva dei file con `walkdir`
//! - Nome asset = path relativo con separatori `/`
//! - `<file>.map` accanto al file → source map di input dell'asset
//! - Scrittura sicura con backup automatico e rollback
//! - Modalità dry-run: nessuna scrittura, solo tracking
//!
//! ## Sicurezza operazioni:
//! - Backup `<file>.<ext>.backup` prima della sostituzione
//! - Rollback in caso di errore durante la scrittura
//! - File non UTF-8 ignorati (non sono fogli di stile)
//!
//! ## Utilità:
//! - `format_size()`: Converte bytes in formato leggibile (KB, MB, GB)
//! - `calculate_reduction()`: Calcola percentuale di riduzione

use crate::asset::{Asset, AssetInfo, Source};
use crate::asset_store::AssetStore;
use crate::error::MinimizeError;
use crate::sourcemap::SourceMap;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use walkdir::WalkDir;

const MAP_EXTENSION: &str = "map";
const BACKUP_EXTENSION: &str = "backup";

/// Directory-backed asset store
pub struct DirectoryAssets {
    root: PathBuf,
    dry_run: bool,
    minimized: Mutex<HashSet<String>>,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dry_run: false,
            minimized: Mutex::new(HashSet::new()),
        }
    }

    /// Accept updates without touching the disk
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find every candidate file under the root, sorted
    pub fn find_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| !is_auxiliary(path))
            .collect();
        files.sort();
        files
    }

    fn asset_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn asset_path(&self, name: &str) -> PathBuf {
        name.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    async fn load(&self, path: &Path) -> Result<Option<Asset>, MinimizeError> {
        let bytes = fs::read(path).await?;
        let Ok(code) = String::from_utf8(bytes) else {
            debug!("Skipping non UTF-8 file {}", path.display());
            return Ok(None);
        };

        let name = self.asset_name(path);
        let source = match read_sibling_map(path).await? {
            Some(map) => Source::with_map(name.clone(), code, map),
            None => Source::raw(code),
        };
        let info = AssetInfo {
            minimized: self.minimized.lock().await.contains(&name),
        };

        Ok(Some(Asset::new(name, source, info)))
    }
}

#[async_trait]
impl AssetStore for DirectoryAssets {
    async fn list_assets(&self) -> Result<Vec<Asset>, MinimizeError> {
        if !self.root.is_dir() {
            return Err(MinimizeError::AssetStore(format!(
                "Not a directory: {}",
                self.root.display()
            )));
        }

        let mut assets = Vec::new();
        for path in self.find_files() {
            if let Some(asset) = self.load(&path).await? {
                assets.push(asset);
            }
        }
        debug!("Loaded {} assets from {}", assets.len(), self.root.display());
        Ok(assets)
    }

    async fn update_asset(
        &self,
        name: &str,
        source: Source,
        info: AssetInfo,
    ) -> Result<(), MinimizeError> {
        let path = self.asset_path(name);
        if !path.is_file() {
            return Err(MinimizeError::AssetStore(format!("Unknown asset: {}", name)));
        }

        if self.dry_run {
            debug!("Dry run: not writing {} ({} bytes)", name, source.size());
        } else {
            replace_contents(&path, source.code().as_bytes()).await?;
            if let Some(map) = source.map() {
                fs::write(map_path(&path), map.to_json()?).await?;
            }
        }

        let mut minimized = self.minimized.lock().await;
        if info.minimized {
            minimized.insert(name.to_string());
        } else {
            minimized.remove(name);
        }
        Ok(())
    }
}

fn is_auxiliary(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(MAP_EXTENSION) | Some(BACKUP_EXTENSION)
    )
}

fn map_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(MAP_EXTENSION);
    PathBuf::from(name)
}

/// Unparsable maps come back empty so the scheduler reports them as invalid
async fn read_sibling_map(path: &Path) -> Result<Option<SourceMap>, MinimizeError> {
    let map_path = map_path(path);
    if !map_path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(&map_path).await?;
    Ok(Some(SourceMap::from_json(&content).unwrap_or_else(|e| {
        warn!("Unreadable source map {}: {}", map_path.display(), e);
        SourceMap::default()
    })))
}

/// Safely replace a file's contents, restoring the original on failure
pub async fn replace_contents(original: &Path, contents: &[u8]) -> Result<(), MinimizeError> {
    let backup_path = original.with_extension(format!(
        "{}.{}",
        original.extension().unwrap_or_default().to_string_lossy(),
        BACKUP_EXTENSION
    ));

    fs::copy(original, &backup_path).await?;

    match fs::write(original, contents).await {
        Ok(()) => {
            let _ = fs::remove_file(&backup_path).await;
            Ok(())
        }
        Err(e) => {
            let _ = fs::copy(&backup_path, original).await;
            let _ = fs::remove_file(&backup_path).await;
            Err(e.into())
        }
    }
}

/// Get human-readable file size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Calculate percentage reduction
pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
    if original_size == 0 {
        0.0
    } else {
        ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
    }
}
