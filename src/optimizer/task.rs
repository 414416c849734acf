//! # Asset Task Module
//!
//! Elaborazione di un singolo asset selezionato: cache hit o catena di
//! minifier (inline o nel worker pool), diagnostica e commit.
//! Separato dall'orchestratore principale per maggiore modularità.

use crate::asset::{Asset, AssetInfo};
use crate::asset_store::AssetStore;
use crate::cache::CacheEntry;
use crate::chain::{package, TransformChain};
use crate::diagnostics::{Diagnostic, DiagnosticMapper};
use crate::fingerprint::{Fingerprint, FingerprintStore};
use crate::minify::MinifyOutput;
use crate::optimizer::report::{AssetOutcome, AssetStatus};
use crate::optimizer::worker_pool::{panic_message, JobError, PoolHandle};
use crate::progress::ProgressManager;
use crate::sourcemap::{SourceMap, SourceMapConsumer};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

/// Shared, read-only collaborators of one build
pub(crate) struct BuildContext<'a> {
    pub chain: &'a TransformChain,
    pub mapper: &'a DiagnosticMapper,
    pub cache: &'a FingerprintStore,
    pub store: &'a dyn AssetStore,
    pub pool: Option<&'a PoolHandle>,
    pub progress: &'a ProgressManager,
}

/// A selected asset after the cache probe
pub(crate) struct Candidate {
    pub asset: Asset,
    pub key: Fingerprint,
    pub cached: Option<CacheEntry>,
}

/// Run one asset to completion. Never fails: problems end up in the outcome.
pub(crate) async fn process_asset(ctx: &BuildContext<'_>, candidate: Candidate) -> AssetOutcome {
    let Candidate { asset, key, cached } = candidate;
    let name = asset.name.clone();
    let original_size = asset.source.size();
    let mut warnings = Vec::new();

    let input_map = asset.source.map().cloned();
    let consumer = input_map.as_ref().and_then(|map| {
        if !map.is_valid() {
            warnings.push(Diagnostic::warning(
                &name,
                format!("{} contains invalid source map", name),
            ));
            return None;
        }
        SourceMapConsumer::new(map)
            .map_err(|e| debug!("{}: source map not usable for diagnostics: {}", name, e))
            .ok()
    });

    let (entry, status) = match cached {
        Some(entry) => {
            debug!("Reusing cached output for {}", name);
            (entry, AssetStatus::Cached)
        }
        None => match run_chain(ctx, &asset, input_map.clone()).await {
            Ok(output) => {
                let entry = CacheEntry {
                    source: package(&name, &output, asset.source.code(), input_map.as_ref()),
                    warnings: output.warnings,
                };
                ctx.cache.put(&name, &key, entry.clone()).await;
                (entry, AssetStatus::Minimized)
            }
            Err(job_error) => {
                error!("Failed to minify {}: {}", name, job_error);
                let diagnostic =
                    ctx.mapper
                        .build_error(&job_error.into_minify_error(), &name, consumer.as_ref());
                return failed(ctx, name, original_size, diagnostic, warnings);
            }
        },
    };

    warnings.extend(
        entry
            .warnings
            .iter()
            .filter_map(|w| ctx.mapper.build_warning(w, &name, consumer.as_ref())),
    );

    let minimized_size = entry.source.size();
    let info = AssetInfo { minimized: true };
    if let Err(e) = ctx.store.update_asset(&name, entry.source, info).await {
        error!("Failed to update {}: {}", name, e);
        let diagnostic = Diagnostic::error(
            &name,
            format!("{} from Css Minimizer\nFailed to update asset: {}", name, e),
        );
        return failed(ctx, name, original_size, diagnostic, warnings);
    }

    let outcome = AssetOutcome {
        name,
        status,
        original_size,
        minimized_size,
        errors: Vec::new(),
        warnings,
    };
    let tag = if status == AssetStatus::Cached { "CACHED" } else { "OK" };
    ctx.progress.update(&format!(
        "[{}] {}: {:.1}% saved",
        tag,
        outcome.name,
        outcome.reduction_percent()
    ));
    outcome
}

async fn run_chain(
    ctx: &BuildContext<'_>,
    asset: &Asset,
    input_map: Option<SourceMap>,
) -> Result<MinifyOutput, JobError> {
    match ctx.pool {
        Some(pool) => {
            let job = ctx.chain.job(&asset.name, asset.source.code(), input_map);
            pool.transform(&job).await
        }
        None => {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                ctx.chain.run(&asset.name, asset.source.code(), input_map)
            }));
            match outcome {
                Ok(result) => result.map_err(JobError::Transform),
                Err(panic) => Err(JobError::Worker(format!(
                    "worker panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            }
        }
    }
}

fn failed(
    ctx: &BuildContext<'_>,
    name: String,
    original_size: u64,
    diagnostic: Diagnostic,
    warnings: Vec<Diagnostic>,
) -> AssetOutcome {
    ctx.progress.update(&format!("[ERROR] {}", name));
    AssetOutcome {
        name,
        status: AssetStatus::Failed,
        original_size,
        minimized_size: original_size,
        errors: vec![diagnostic],
        warnings,
    }
}
