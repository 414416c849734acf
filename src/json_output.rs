//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON (una riga per evento)
//! per integrare il minimizer in altri tool.
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio della build con la configurazione effettiva
//! - `asset_complete`: Esito di un asset selezionato
//! - `diagnostic`: Errore o warning di un asset
//! - `complete`: Fine della build con statistiche finali
//! - `error`: Errore fatale del driver

use crate::config::{Config, Parallel};
use crate::diagnostics::{Diagnostic, Severity};
use crate::optimizer::{AssetOutcome, AssetStatus, MinimizeReport};
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio della build
    Start {
        input_dir: PathBuf,
        config: JsonConfig,
    },

    /// Fine elaborazione di un asset
    AssetComplete {
        name: String,
        status: AssetStatus,
        original_size: u64,
        minimized_size: u64,
        reduction_percent: f64,
    },

    /// Errore o warning di un asset
    Diagnostic {
        severity: Severity,
        file: String,
        message: String,
    },

    /// Build completata
    Complete {
        assets_processed: usize,
        assets_minimized: usize,
        assets_cached: usize,
        errors: usize,
        warnings: usize,
        total_bytes_saved: u64,
        average_reduction: f64,
        workers: usize,
        duration_seconds: f64,
    },

    /// Errore fatale
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione effettiva per output JSON
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub minify: Vec<String>,
    pub parallel: Parallel,
    pub workers_available: usize,
    pub cache: bool,
    pub dry_run: bool,
}

impl JsonConfig {
    pub fn new(config: &Config, workers_available: usize, cache: bool, dry_run: bool) -> Self {
        Self {
            minify: config.minify.as_slice().to_vec(),
            parallel: config.parallel,
            workers_available,
            cache,
            dry_run,
        }
    }
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(input_dir: PathBuf, config: JsonConfig) -> Self {
        Self::Start { input_dir, config }
    }

    pub fn asset_complete(outcome: &AssetOutcome) -> Self {
        Self::AssetComplete {
            name: outcome.name.clone(),
            status: outcome.status,
            original_size: outcome.original_size,
            minimized_size: outcome.minimized_size,
            reduction_percent: outcome.reduction_percent(),
        }
    }

    pub fn diagnostic(diagnostic: &Diagnostic) -> Self {
        Self::Diagnostic {
            severity: diagnostic.severity,
            file: diagnostic.file.clone(),
            message: diagnostic.message.clone(),
        }
    }

    pub fn complete(report: &MinimizeReport) -> Self {
        Self::Complete {
            assets_processed: report.stats.assets_processed,
            assets_minimized: report.stats.assets_minimized,
            assets_cached: report.stats.assets_cached,
            errors: report.errors.len(),
            warnings: report.warnings.len(),
            total_bytes_saved: report.stats.total_bytes_saved(),
            average_reduction: report.stats.overall_reduction_percent(),
            workers: report.workers,
            duration_seconds: report.duration.as_secs_f64(),
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }

    /// Every event describing a finished build, in emission order
    pub fn for_report(report: &MinimizeReport) -> Vec<Self> {
        report
            .assets
            .iter()
            .map(Self::asset_complete)
            .chain(report.errors.iter().map(Self::diagnostic))
            .chain(report.warnings.iter().map(Self::diagnostic))
            .chain(std::iter::once(Self::complete(report)))
            .collect()
    }
}
