//! # Css Minimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom
//! - `asset` / `asset_store`: Modello degli asset e store collaboratore
//! - `sourcemap`: Source map e lookup delle posizioni originali
//! - `selection`: Selezione degli asset per nome
//! - `minify`: Interfaccia dei minifier e backend `lightningcss`
//! - `chain`: Catena ordinata di minifier per asset
//! - `fingerprint` / `cache`: Chiavi di cache e backend di persistenza
//! - `diagnostics`: Errori e warning rimappati sulle sorgenti originali
//! - `optimizer`: Orchestratore della build, limiter e worker pool
//! - `file_manager`: Asset store su directory
//! - `progress` / `json_output`: Feedback per la CLI
//!
//! ## Utilizzo:
//! ```ignore
//! use css_minimizer::{Config, CssMinimizer, FingerprintStore, MemoryAssetStore, Source};
//!
//! let store = MemoryAssetStore::new().with_asset("a.css", Source::raw(".a{color: #ff0000;}"));
//! let minimizer = CssMinimizer::new(Config::default())?;
//! let report = minimizer.optimize(&store, &FingerprintStore::in_memory()).await?;
//! assert!(report.errors.is_empty());
//! ```

pub mod asset;
pub mod asset_store;
pub mod cache;
pub mod chain;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod file_manager;
pub mod fingerprint;
pub mod json_output;
pub mod minify;
pub mod optimizer;
pub mod progress;
pub mod selection;
pub mod sourcemap;

pub use asset::{Asset, AssetInfo, Source};
pub use asset_store::{AssetStore, MemoryAssetStore};
pub use cache::{CacheBackend, CacheEntry, FileCache, MemoryCache};
pub use chain::TransformChain;
pub use config::{Config, Parallel};
pub use diagnostics::{ContextShortener, Diagnostic, DiagnosticMapper, RequestShortener, Severity};
pub use error::MinimizeError;
pub use file_manager::DirectoryAssets;
pub use fingerprint::{Fingerprint, FingerprintStore};
pub use minify::{MinifierRegistry, Minify, MinifyError, MinifyInput, MinifyOutput};
pub use optimizer::{CssMinimizer, MinimizeReport};
pub use sourcemap::SourceMap;
