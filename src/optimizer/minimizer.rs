//! # Css Minimizer Main Orchestrator
//!
//! Orchestratore della build: selezione, probe della cache, dispatch sotto
//! il limiter, commit e teardown del worker pool.
//!
//! ## Flusso per build:
//! 1. **Select**: asset che matchano `test`/`include`/`exclude`, non già `minimized`
//! 2. **Probe**: fingerprint + lookup in cache → hit / miss
//! 3. **Dispatch**: ogni asset passa dal limiter; i miss eseguono la catena
//!    inline oppure nel worker pool (creato solo se servono miss e core)
//! 4. **Commit**: cache put (solo miss), warning, `minimized = true`, update
//! 5. **Settle**: join su tutti i job, poi teardown del pool

use crate::asset_store::AssetStore;
use crate::chain::TransformChain;
use crate::config::{available_cores, logical_cores, Config};
use crate::diagnostics::{ContextShortener, DiagnosticMapper, RequestShortener, WarningsFilter};
use crate::fingerprint::{chain_digest, FingerprintStore};
use crate::minify::MinifierRegistry;
use crate::optimizer::limiter::ConcurrencyLimiter;
use crate::optimizer::report::MinimizeReport;
use crate::optimizer::task::{process_asset, BuildContext, Candidate};
use crate::optimizer::worker_pool::PoolHandle;
use crate::progress::ProgressManager;
use crate::selection::Selection;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Minimizer configured once, run once per build
pub struct CssMinimizer {
    config: Config,
    selection: Selection,
    registry: Arc<MinifierRegistry>,
    chain: TransformChain,
    chain_digest: String,
    shortener: Option<Arc<dyn RequestShortener>>,
    warnings_filter: Option<WarningsFilter>,
    cpus: usize,
    show_progress: bool,
}

impl CssMinimizer {
    /// Minimizer with the built-in minifiers
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, MinifierRegistry::with_builtins())
    }

    /// Minimizer resolving `config.minify` against a custom registry
    pub fn with_registry(config: Config, registry: MinifierRegistry) -> Result<Self> {
        config.validate()?;
        let selection = Selection::from_config(&config)?;
        let chain = TransformChain::from_config(&config, &registry)?;
        let chain_digest = chain_digest(&chain);
        debug!("Minify chain: {} stage(s), digest {}", chain.len(), chain_digest);

        Ok(Self {
            config,
            selection,
            registry: Arc::new(registry),
            chain,
            chain_digest,
            shortener: Some(Arc::new(ContextShortener::identity())),
            warnings_filter: None,
            cpus: logical_cores(),
            show_progress: false,
        })
    }

    /// Keep only warnings for which `filter(raw, file, source)` is true
    pub fn with_warnings_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str, &str, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.warnings_filter = Some(Arc::new(filter));
        self
    }

    pub fn with_request_shortener(mut self, shortener: Arc<dyn RequestShortener>) -> Self {
        self.shortener = Some(shortener);
        self
    }

    /// Override the logical core count used to size the pool
    pub fn with_cpus(mut self, cpus: usize) -> Self {
        self.cpus = cpus;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Worker threads a build may use
    pub fn available_cores(&self) -> usize {
        available_cores(self.config.parallel, self.cpus)
    }

    /// Run one build against `store`, reusing results from `cache`
    pub async fn optimize(
        &self,
        store: &dyn AssetStore,
        cache: &FingerprintStore,
    ) -> Result<MinimizeReport> {
        let start_time = Instant::now();

        let assets = store.list_assets().await?;
        let total = assets.len();
        let selected: Vec<_> = assets
            .into_iter()
            .filter(|asset| !asset.info.minimized && self.selection.matches(&asset.name))
            .collect();
        info!("🔍 {} of {} assets selected for minification", selected.len(), total);

        let mut candidates = Vec::with_capacity(selected.len());
        let mut misses = 0;
        for asset in selected {
            let key = cache.key(&asset, &self.chain_digest);
            let cached = cache.get(&asset.name, &key).await;
            if cached.is_none() {
                misses += 1;
            }
            candidates.push(Candidate { asset, key, cached });
        }
        debug!(
            "Cache probe: {} hits, {} misses",
            candidates.len() - misses,
            misses
        );

        let cores = self.available_cores();
        let pool = (cores > 0 && misses > 0)
            .then(|| PoolHandle::new(cores.min(misses), self.registry.clone()));
        let limiter = ConcurrencyLimiter::for_build(pool.as_ref().map(PoolHandle::size), misses);

        let progress = if self.show_progress {
            ProgressManager::new(candidates.len() as u64)
        } else {
            ProgressManager::hidden()
        };
        let mapper = DiagnosticMapper::new(self.shortener.clone(), self.warnings_filter.clone());
        let ctx = BuildContext {
            chain: &self.chain,
            mapper: &mapper,
            cache,
            store,
            pool: pool.as_ref(),
            progress: &progress,
        };

        let outcomes = limiter
            .run_all(
                candidates
                    .into_iter()
                    .map(|candidate| process_asset(&ctx, candidate)),
            )
            .await;

        // Every job has settled; nothing can reach the pool anymore
        let workers = match &pool {
            Some(pool) => {
                let workers = pool.workers().await;
                pool.end().await;
                workers
            }
            None => 0,
        };

        let report = MinimizeReport::collect(outcomes, workers, start_time.elapsed());
        progress.finish(&report.stats.format_summary());
        info!(
            "✅ Minification complete: {} ({} errors, {} warnings, {} workers)",
            report.stats.format_summary(),
            report.errors.len(),
            report.warnings.len(),
            report.workers
        );

        Ok(report)
    }
}
