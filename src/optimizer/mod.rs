//! # Optimizer Module
//!
//! Modulo che separa le responsabilità della build in sottomoduli:
//! - `minimizer`: Orchestratore principale (`CssMinimizer`)
//! - `task`: Elaborazione di un singolo asset
//! - `limiter`: Limite di job concorrenti
//! - `worker_pool`: Thread worker isolati e relativo ciclo di vita
//! - `report`: Esiti per asset e statistiche della build

pub mod limiter;
pub mod minimizer;
pub mod report;
mod task;
pub mod worker_pool;

pub use limiter::ConcurrencyLimiter;
pub use minimizer::CssMinimizer;
pub use report::{AssetOutcome, AssetStatus, MinimizeReport};
pub use worker_pool::{JobError, PoolHandle, WorkerPool};
