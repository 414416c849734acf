//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di minificazione.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking statistiche della build (asset processati, minificati, da cache, falliti)
//! - Calcolo percentuali di riduzione e byte risparmiati
//!
//! ## Statistiche tracciate:
//! - **assets_processed**: Totale asset selezionati ed elaborati
//! - **assets_minimized**: Asset minificati in questa build
//! - **assets_cached**: Asset ripresi dalla cache (nessun lavoro di minificazione)
//! - **errors**: Asset falliti (contenuto lasciato invariato)
//! - **total_original_size** / **total_minimized_size**: byte prima e dopo
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:02] [=========================>--------------] 12/18 (66%) [OK] main.css: 38.1% saved
//! ```

use crate::file_manager::format_size;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Progress bar for one build
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_assets: u64) -> Self {
        let bar = ProgressBar::new(total_assets);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Progress bar that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics tracker for one build
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct OptimizationStats {
    pub assets_processed: usize,
    pub assets_minimized: usize,
    pub assets_cached: usize,
    pub errors: usize,
    pub total_original_size: u64,
    pub total_minimized_size: u64,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_minimized(&mut self, original_size: u64, new_size: u64) {
        self.assets_processed += 1;
        self.assets_minimized += 1;
        self.total_original_size += original_size;
        self.total_minimized_size += new_size;
    }

    pub fn add_cached(&mut self, original_size: u64, new_size: u64) {
        self.assets_processed += 1;
        self.assets_cached += 1;
        self.total_original_size += original_size;
        self.total_minimized_size += new_size;
    }

    /// A failed asset keeps its size
    pub fn add_error(&mut self, original_size: u64) {
        self.assets_processed += 1;
        self.errors += 1;
        self.total_original_size += original_size;
        self.total_minimized_size += original_size;
    }

    pub fn total_bytes_saved(&self) -> u64 {
        self.total_original_size
            .saturating_sub(self.total_minimized_size)
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_bytes_saved() as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} assets | Minimized: {} | Cached: {} | Errors: {} | Total saved: {} ({:.2}%)",
            self.assets_processed,
            self.assets_minimized,
            self.assets_cached,
            self.errors,
            format_size(self.total_bytes_saved()),
            self.overall_reduction_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = OptimizationStats::new();
        stats.add_minimized(1000, 600);
        stats.add_cached(1000, 400);
        stats.add_error(500);

        assert_eq!(stats.assets_processed, 3);
        assert_eq!(stats.assets_minimized, 1);
        assert_eq!(stats.assets_cached, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total_bytes_saved(), 1000);
        assert_eq!(stats.overall_reduction_percent(), 40.0);
        assert_eq!(
            stats.format_summary(),
            "Processed: 3 assets | Minimized: 1 | Cached: 1 | Errors: 1 | Total saved: 1000 B (40.00%)"
        );
    }

    #[test]
    fn test_empty_stats() {
        let stats = OptimizationStats::new();
        assert_eq!(stats.overall_reduction_percent(), 0.0);
    }

    #[test]
    fn test_hidden_progress_counts() {
        let progress = ProgressManager::hidden();
        progress.update("a.css");
        progress.update("b.css");
        assert_eq!(progress.position(), 2);
        progress.finish("done");
    }
}
