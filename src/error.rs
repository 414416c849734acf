//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `MinimizeError` per gli errori del driver (configurazione, I/O, cache)
//! - Integra con `thiserror` per automatic error conversion
//! - Gli errori per singolo asset NON passano da qui: diventano `Diagnostic`
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (asset store su disco, cache persistente)
//! - `Json`: Errori di serializzazione (config, cache, payload dei worker)
//! - `Pattern`: Regex di selezione non valida
//! - `Config`: Parametri di configurazione non validi
//! - `SourceMap`: Source map malformata (mappings non decodificabili)
//! - `UnknownMinifier`: Nome di minifier non registrato
//! - `Cache`: Backend di cache non disponibile
//! - `Worker`: Worker pool non disponibile o worker crashato
//! - `AssetStore`: Asset store collaboratore in errore
//!
//! ## Esempio:
//! ```ignore
//! if !registry.contains(name) {
//!     return Err(MinimizeError::UnknownMinifier(name.to_string()));
//! }
//! ```

/// Custom error types for the minimizer
#[derive(thiserror::Error, Debug)]
pub enum MinimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid selection pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid source map: {0}")]
    SourceMap(String),

    #[error("Unknown minifier: {0}")]
    UnknownMinifier(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Asset store error: {0}")]
    AssetStore(String),
}
