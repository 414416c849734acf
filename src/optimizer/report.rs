//! Build result: per-asset outcomes, diagnostics and totals.

use crate::diagnostics::Diagnostic;
use crate::file_manager::calculate_reduction;
use crate::progress::OptimizationStats;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Minified in this build
    Minimized,
    /// Reused from the cache
    Cached,
    /// Left untouched; see the build errors
    Failed,
}

/// What happened to one selected asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetOutcome {
    pub name: String,
    pub status: AssetStatus,
    pub original_size: u64,
    pub minimized_size: u64,
    #[serde(skip)]
    pub errors: Vec<Diagnostic>,
    #[serde(skip)]
    pub warnings: Vec<Diagnostic>,
}

impl AssetOutcome {
    pub fn reduction_percent(&self) -> f64 {
        calculate_reduction(self.original_size, self.minimized_size)
    }
}

/// Collected result of one `optimize` call
#[derive(Debug, Default)]
pub struct MinimizeReport {
    /// Selected assets, in listing order
    pub assets: Vec<AssetOutcome>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub stats: OptimizationStats,
    /// Worker threads used by this build (0 = everything ran inline)
    pub workers: usize,
    pub duration: Duration,
}

impl MinimizeReport {
    /// Aggregate outcomes in listing order, so diagnostics come out deterministically
    pub fn collect(outcomes: Vec<AssetOutcome>, workers: usize, duration: Duration) -> Self {
        let mut report = Self {
            workers,
            duration,
            ..Self::default()
        };

        for mut outcome in outcomes {
            match outcome.status {
                AssetStatus::Minimized => report
                    .stats
                    .add_minimized(outcome.original_size, outcome.minimized_size),
                AssetStatus::Cached => report
                    .stats
                    .add_cached(outcome.original_size, outcome.minimized_size),
                AssetStatus::Failed => report.stats.add_error(outcome.original_size),
            }
            report.errors.append(&mut outcome.errors);
            report.warnings.append(&mut outcome.warnings);
            report.assets.push(outcome);
        }

        report
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn asset(&self, name: &str) -> Option<&AssetOutcome> {
        self.assets.iter().find(|a| a.name == name)
    }
}
