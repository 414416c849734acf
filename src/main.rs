//! # Css Minimizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Costruzione della configurazione (file JSON + override da CLI)
//! - Avvio di una build su una directory e report finale
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Valida che la directory esista
//! 4. Carica la config e applica gli override
//! 5. Apre la cache persistente (se abilitata) e lancia `CssMinimizer`
//! 6. Stampa diagnostica e statistiche; exit code != 0 se un asset è fallito
//!
//! ## Esempio di utilizzo:
//! ```bash
//! css-minimizer dist/ --parallel 4 --exclude '\.min\.css$' --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use css_minimizer::config::OneOrMany;
use css_minimizer::file_manager::format_size;
use css_minimizer::json_output::{JsonConfig, JsonMessage};
use css_minimizer::{
    Config, ContextShortener, CssMinimizer, DirectoryAssets, FileCache, FingerprintStore,
    MinimizeReport, Parallel,
};

#[derive(Parser)]
#[command(name = "css-minimizer")]
#[command(about = "Minify stylesheets in a build directory with caching and parallel workers")]
struct Args {
    /// Directory containing the build assets
    directory: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of worker threads (capped at cores - 1)
    #[arg(short, long, conflicts_with = "no_parallel")]
    parallel: Option<usize>,

    /// Run every minifier inline, without a worker pool
    #[arg(long)]
    no_parallel: bool,

    /// Directory for the persistent cache
    #[arg(long, conflicts_with = "no_cache")]
    cache_dir: Option<PathBuf>,

    /// Disable the persistent cache
    #[arg(long)]
    no_cache: bool,

    /// Asset name pattern (regex); replaces the configured `test`
    #[arg(long)]
    test: Vec<String>,

    /// Only minify assets matching one of these patterns
    #[arg(short, long)]
    include: Vec<String>,

    /// Skip assets matching any of these patterns
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Minifier chain, in order; replaces the configured `minify`
    #[arg(short, long)]
    minify: Vec<String>,

    /// Write the effective configuration (file + overrides) to this path
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Dry run - don't write optimized files
    #[arg(long)]
    dry_run: bool,

    /// Emit JSON lines instead of logs and a progress bar
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Apply command line overrides on top of the file configuration
    fn apply(&self, mut config: Config) -> Config {
        if !self.test.is_empty() {
            config.test = OneOrMany::Many(self.test.clone());
        }
        if !self.include.is_empty() {
            config.include = OneOrMany::Many(self.include.clone());
        }
        if !self.exclude.is_empty() {
            config.exclude = OneOrMany::Many(self.exclude.clone());
        }
        if !self.minify.is_empty() {
            config.minify = OneOrMany::Many(self.minify.clone());
        }
        if self.no_parallel {
            config.parallel = Parallel::Enabled(false);
        } else if let Some(workers) = self.parallel {
            config.parallel = Parallel::Workers(workers);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout stays clean for JSON lines
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if !args.directory.is_dir() {
        return Err(anyhow::anyhow!(
            "Asset directory does not exist: {}",
            args.directory.display()
        ));
    }
    let directory = args.directory.canonicalize()?;

    let config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    let config = args.apply(config);
    if let Some(path) = &args.save_config {
        config.save_to_file(path).await?;
        info!("Effective configuration written to: {}", path.display());
    }

    let minimizer = CssMinimizer::new(config)?
        .with_request_shortener(Arc::new(ContextShortener::new(&directory)))
        .with_progress(!args.json);

    let file_cache = if args.no_cache {
        None
    } else {
        let cache_dir = match &args.cache_dir {
            Some(dir) => dir.clone(),
            None => FileCache::default_dir()?,
        };
        Some(Arc::new(FileCache::open(&cache_dir, &directory).await?))
    };
    let cache = match &file_cache {
        Some(file_cache) => FingerprintStore::new(file_cache.clone()),
        None => FingerprintStore::disabled(),
    };

    let store = DirectoryAssets::new(&directory).dry_run(args.dry_run);

    if args.json {
        JsonMessage::start(
            directory.clone(),
            JsonConfig::new(
                minimizer.config(),
                minimizer.available_cores(),
                file_cache.is_some(),
                args.dry_run,
            ),
        )
        .emit();
    } else {
        info!("Starting CSS minification in: {}", directory.display());
        if let Some(file_cache) = &file_cache {
            info!("Cache file: {}", file_cache.path().display());
        }
        if args.dry_run {
            info!("Dry run mode: No files will be modified");
        }
    }

    let report = match minimizer.optimize(&store, &cache).await {
        Ok(report) => report,
        Err(e) => {
            if args.json {
                JsonMessage::error(e.to_string(), e.chain().nth(1).map(|s| s.to_string())).emit();
            }
            return Err(e);
        }
    };

    if let Some(file_cache) = &file_cache {
        let names: Vec<&str> = report.assets.iter().map(|a| a.name.as_str()).collect();
        if let Err(e) = file_cache.retain_assets(&names).await {
            warn!("Could not prune cache: {}", e);
        }
    }

    if args.json {
        for message in JsonMessage::for_report(&report) {
            message.emit();
        }
    } else {
        print_report(&report);
    }

    if report.has_errors() {
        return Err(anyhow::anyhow!(
            "{} asset(s) could not be minified",
            report.stats.errors
        ));
    }

    Ok(())
}

fn print_report(report: &MinimizeReport) {
    for diagnostic in &report.errors {
        error!("{}", diagnostic);
    }
    for diagnostic in &report.warnings {
        warn!("{}", diagnostic);
    }

    info!("=== Minification Complete ===");
    info!("Assets processed: {}", report.stats.assets_processed);
    info!("Assets minimized: {}", report.stats.assets_minimized);
    info!("Assets from cache: {}", report.stats.assets_cached);
    info!("Errors: {}", report.stats.errors);
    info!("Bytes saved: {}", format_size(report.stats.total_bytes_saved()));
    info!("Average reduction: {:.2}%", report.stats.overall_reduction_percent());
    if report.workers > 0 {
        info!("Workers used: {}", report.workers);
    }
    info!("Duration: {:.2}s", report.duration.as_secs_f64());
}
