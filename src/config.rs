//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione del minimizer.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di ottimizzazione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Calcola il numero di core disponibili per il worker pool
//!
//! ## Parametri di configurazione:
//! - `test`: Pattern di selezione degli asset (default: `.css` con query string opzionale)
//! - `include` / `exclude`: Raffinamento della selezione
//! - `minify`: Un minifier o una catena ordinata (default: `lightningcss`)
//! - `minimizerOptions`: Opzioni condivise o una per stage della catena
//! - `parallel`: `true` = `cores - 1`, intero = `min(n, cores - 1)`, `false`/`0` = niente pool
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     parallel: Parallel::Workers(2),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::MinimizeError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Default asset selection: `.css` files, ignoring query strings
pub const DEFAULT_TEST: &str = r"(?i)\.css(\?.*)?$";

/// Name of the built-in minifier used when none is configured
pub const DEFAULT_MINIFIER: &str = "lightningcss";

/// A single value or a list of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// Worker pool setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parallel {
    Enabled(bool),
    Workers(usize),
}

impl Default for Parallel {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

/// Options handed to the minify stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MinimizerOptions {
    /// One entry per chain stage, paired by position
    PerStage(Vec<Value>),
    /// The same options for every stage
    Shared(Value),
}

impl MinimizerOptions {
    /// Options for the stage at `index`; `None` when a per-stage list is too short
    pub fn for_stage(&self, index: usize) -> Option<Value> {
        match self {
            Self::Shared(value) => Some(value.clone()),
            Self::PerStage(values) => values.get(index).cloned(),
        }
    }
}

/// Configuration for the minimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Asset name patterns that make an asset a candidate
    pub test: OneOrMany<String>,
    /// If non-empty, a candidate must also match one of these
    pub include: OneOrMany<String>,
    /// Candidates matching any of these are skipped
    pub exclude: OneOrMany<String>,
    /// Minifier name, or ordered chain of minifier names
    pub minify: OneOrMany<String>,
    /// Options for the minify stages
    pub minimizer_options: Option<MinimizerOptions>,
    /// Worker pool sizing
    pub parallel: Parallel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            test: OneOrMany::One(DEFAULT_TEST.to_string()),
            include: OneOrMany::default(),
            exclude: OneOrMany::default(),
            minify: OneOrMany::One(DEFAULT_MINIFIER.to_string()),
            minimizer_options: None,
            parallel: Parallel::default(),
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), MinimizeError> {
        if self.minify.as_slice().is_empty() {
            return Err(MinimizeError::Config(
                "at least one minifier must be configured".to_string(),
            ));
        }

        if self.minify.as_slice().iter().any(|name| name.trim().is_empty()) {
            return Err(MinimizeError::Config("minifier names cannot be empty".to_string()));
        }

        if self.test.as_slice().is_empty() {
            return Err(MinimizeError::Config(
                "at least one test pattern is required".to_string(),
            ));
        }

        for pattern in self
            .test
            .as_slice()
            .iter()
            .chain(self.include.as_slice())
            .chain(self.exclude.as_slice())
        {
            regex::Regex::new(pattern)?;
        }

        Ok(())
    }

    /// Options for chain stage `index`
    pub fn stage_options(&self, index: usize) -> Option<Value> {
        self.minimizer_options
            .as_ref()
            .and_then(|options| options.for_stage(index))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Number of logical cores the host reports
pub fn logical_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Worker count allowed by `parallel` on a machine with `cpus` logical cores.
/// One core always stays with the coordinating flow.
pub fn available_cores(parallel: Parallel, cpus: usize) -> usize {
    let usable = cpus.saturating_sub(1);
    match parallel {
        Parallel::Enabled(true) => usable,
        Parallel::Enabled(false) => 0,
        Parallel::Workers(n) => n.min(usable),
    }
}
