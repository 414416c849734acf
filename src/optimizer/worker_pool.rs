//! # Worker Pool
//!
//! Pool di thread dedicati che eseguono la catena di minifier fuori dal
//! flusso async di coordinamento.
//!
//! ## Responsabilità:
//! - `WorkerPool`: N thread che consumano job da un canale `crossbeam`
//! - Ogni job è JSON autocontenuto (`JobPayload`), la risposta è JSON
//!   `{"status": "ok" | "error" | "crashed", ...}`
//! - Un panic dentro un job respinge solo quel job: il thread sopravvive
//! - `PoolHandle`: ciclo di vita `Uninitialized → Running → Drained`,
//!   creazione lazy al primo job, teardown dopo che tutti i job hanno finito
//!
//! ## Stream:
//! I worker sono thread del processo host: stdout/stderr e il subscriber
//! `tracing` sono quelli dell'host.

use crate::chain::JobPayload;
use crate::error::MinimizeError;
use crate::minify::{MinifierRegistry, MinifyError, MinifyOutput};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

/// Why a pooled job did not produce output
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum JobError {
    /// A chain stage failed
    #[error("{0}")]
    Transform(MinifyError),

    /// The worker failed outside the chain (panic, payload, pool gone)
    #[error("Worker failure: {0}")]
    Worker(String),
}

impl JobError {
    /// Both kinds are reported to the build the same way
    pub fn into_minify_error(self) -> MinifyError {
        match self {
            Self::Transform(error) => error,
            Self::Worker(message) => MinifyError::new(format!("Worker failure: {}", message)),
        }
    }
}

/// Wire form of a worker reply
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum WorkerResponse {
    Ok { output: MinifyOutput },
    Error { error: MinifyError },
    Crashed { message: String },
}

struct WorkerRequest {
    payload: String,
    reply: oneshot::Sender<String>,
}

/// Fixed set of worker threads
pub struct WorkerPool {
    sender: Option<Sender<WorkerRequest>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(size: usize, registry: Arc<MinifierRegistry>) -> Result<Self, MinimizeError> {
        if size == 0 {
            return Err(MinimizeError::Worker("pool size must be at least 1".to_string()));
        }

        let (sender, receiver) = unbounded::<WorkerRequest>();
        let handles = (0..size)
            .map(|id| {
                let receiver = receiver.clone();
                let registry = registry.clone();
                thread::Builder::new()
                    .name(format!("css-minimizer-worker-{}", id))
                    .spawn(move || worker_loop(id, receiver, registry))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!("🔧 Started worker pool with {} workers", size);

        Ok(Self {
            sender: Some(sender),
            handles,
        })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Run one job on the next free worker
    pub async fn transform(&self, job: &JobPayload) -> Result<MinifyOutput, JobError> {
        let payload = serde_json::to_string(job)
            .map_err(|e| JobError::Worker(format!("cannot serialize job: {}", e)))?;

        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| JobError::Worker("pool is shut down".to_string()))?;

        let (reply, response) = oneshot::channel();
        sender
            .send(WorkerRequest { payload, reply })
            .map_err(|_| JobError::Worker("pool is shut down".to_string()))?;

        let response = response
            .await
            .map_err(|_| JobError::Worker("worker exited before replying".to_string()))?;

        match serde_json::from_str(&response) {
            Ok(WorkerResponse::Ok { output }) => Ok(output),
            Ok(WorkerResponse::Error { error }) => Err(JobError::Transform(error)),
            Ok(WorkerResponse::Crashed { message }) => Err(JobError::Worker(message)),
            Err(e) => Err(JobError::Worker(format!("unreadable worker reply: {}", e))),
        }
    }

    /// Close the queue and wait for every thread. Blocks.
    pub fn shutdown(mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("A worker thread terminated abnormally");
            }
        }
        debug!("Worker pool drained");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Threads exit once the queue is closed
        self.sender.take();
    }
}

fn worker_loop(id: usize, receiver: Receiver<WorkerRequest>, registry: Arc<MinifierRegistry>) {
    debug!("Worker {} ready", id);
    for request in receiver.iter() {
        let response = execute(&request.payload, &registry);
        if request.reply.send(response).is_err() {
            debug!("Worker {}: caller went away", id);
        }
    }
    debug!("Worker {} stopped", id);
}

fn execute(payload: &str, registry: &MinifierRegistry) -> String {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        serde_json::from_str::<JobPayload>(payload)
            .map_err(|e| format!("invalid job payload: {}", e))
            .map(|job| job.run(registry))
    }));

    let response = match outcome {
        Ok(Ok(Ok(output))) => WorkerResponse::Ok { output },
        Ok(Ok(Err(error))) => WorkerResponse::Error { error },
        Ok(Err(message)) => WorkerResponse::Crashed { message },
        Err(panic) => WorkerResponse::Crashed {
            message: format!("worker panicked: {}", panic_message(panic.as_ref())),
        },
    };

    serde_json::to_string(&response).unwrap_or_else(|e| {
        json!({ "status": "crashed", "message": format!("cannot serialize reply: {}", e) })
            .to_string()
    })
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

enum PoolState {
    Uninitialized,
    Running(Arc<WorkerPool>),
    Drained,
}

/// Lazily started pool for one build
pub struct PoolHandle {
    size: usize,
    registry: Arc<MinifierRegistry>,
    state: Mutex<PoolState>,
}

impl PoolHandle {
    pub fn new(size: usize, registry: Arc<MinifierRegistry>) -> Self {
        Self {
            size,
            registry,
            state: Mutex::new(PoolState::Uninitialized),
        }
    }

    /// Configured pool size
    pub fn size(&self) -> usize {
        self.size
    }

    /// The running pool, started on first call
    pub async fn get(&self) -> Result<Arc<WorkerPool>, MinimizeError> {
        let mut state = self.state.lock().await;
        match &*state {
            PoolState::Running(pool) => Ok(pool.clone()),
            PoolState::Drained => Err(MinimizeError::Worker("pool already drained".to_string())),
            PoolState::Uninitialized => {
                let pool = Arc::new(WorkerPool::start(self.size, self.registry.clone())?);
                *state = PoolState::Running(pool.clone());
                Ok(pool)
            }
        }
    }

    /// Run a job, starting the pool if needed
    pub async fn transform(&self, job: &JobPayload) -> Result<MinifyOutput, JobError> {
        let pool = self
            .get()
            .await
            .map_err(|e| JobError::Worker(e.to_string()))?;
        pool.transform(job).await
    }

    /// Number of workers actually started (0 if the pool never ran)
    pub async fn workers(&self) -> usize {
        match &*self.state.lock().await {
            PoolState::Running(pool) => pool.size(),
            _ => 0,
        }
    }

    #[cfg(test)]
    async fn is_drained(&self) -> bool {
        matches!(&*self.state.lock().await, PoolState::Drained)
    }

    /// Drain and join the workers. Call only after every job has settled.
    pub async fn end(&self) {
        let previous = std::mem::replace(&mut *self.state.lock().await, PoolState::Drained);
        let PoolState::Running(pool) = previous else {
            return;
        };

        match Arc::try_unwrap(pool) {
            Ok(pool) => {
                if let Err(e) = tokio::task::spawn_blocking(move || pool.shutdown()).await {
                    warn!("Worker pool shutdown failed: {}", e);
                }
            }
            // Dropping the last reference closes the queue anyway
            Err(_) => warn!("Worker pool still in use at shutdown; not joining threads"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StagePayload;
    use crate::minify::{Minify, MinifyInput};

    struct Shout;

    impl Minify for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn minify(&self, input: MinifyInput) -> Result<MinifyOutput, MinifyError> {
            if input.code.contains("panic") {
                panic!("cannot shout {}", input.name);
            }
            if input.code.contains("fail") {
                return Err(MinifyError::new("refused").at(3, 5));
            }
            Ok(MinifyOutput {
                code: input.code.to_uppercase(),
                ..Default::default()
            })
        }
    }

    fn registry() -> Arc<MinifierRegistry> {
        let mut registry = MinifierRegistry::new();
        registry.register(Arc::new(Shout));
        Arc::new(registry)
    }

    fn job(name: &str, input: &str) -> JobPayload {
        JobPayload {
            name: name.to_string(),
            input: input.to_string(),
            input_source_map: None,
            stages: vec![StagePayload {
                chain_index: 0,
                minifier: "shout".to_string(),
                options: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_pool_runs_jobs_concurrently() {
        let pool = WorkerPool::start(2, registry()).unwrap();
        assert_eq!(pool.size(), 2);

        let jobs: Vec<JobPayload> = (0..6).map(|i| job(&format!("{}.css", i), "a")).collect();
        let results = futures::future::join_all(jobs.iter().map(|j| pool.transform(j))).await;

        assert!(results.iter().all(|r| r.as_ref().map(|o| o.code.as_str()) == Ok("A")));
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_panic_rejects_only_that_job() {
        let pool = WorkerPool::start(1, registry()).unwrap();

        let crashed = pool.transform(&job("a.css", "panic")).await.unwrap_err();
        match &crashed {
            JobError::Worker(message) => assert!(message.contains("cannot shout a.css")),
            other => panic!("expected worker failure, got {:?}", other),
        }

        // Same single thread keeps serving
        let output = pool.transform(&job("b.css", "ok")).await.unwrap();
        assert_eq!(output.code, "OK");
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_transform_error_crosses_the_boundary() {
        let pool = WorkerPool::start(1, registry()).unwrap();
        let error = pool.transform(&job("a.css", "fail")).await.unwrap_err();
        assert_eq!(error, JobError::Transform(MinifyError::new("refused").at(3, 5)));
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_minifier_in_payload() {
        let pool = WorkerPool::start(1, registry()).unwrap();
        let mut bad = job("a.css", "x");
        bad.stages[0].minifier = "missing".to_string();

        let error = pool.transform(&bad).await.unwrap_err().into_minify_error();
        assert!(error.message.contains("missing"));
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_handle_lifecycle() {
        let handle = PoolHandle::new(2, registry());
        assert_eq!(handle.workers().await, 0);

        let first = handle.get().await.unwrap();
        let second = handle.get().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(handle.workers().await, 2);
        drop((first, second));

        assert_eq!(handle.transform(&job("a.css", "x")).await.unwrap().code, "X");

        handle.end().await;
        assert!(handle.is_drained().await);
        assert!(handle.get().await.is_err());
        assert!(matches!(
            handle.transform(&job("a.css", "x")).await,
            Err(JobError::Worker(_))
        ));
    }

    #[test]
    fn test_zero_sized_pool_is_rejected() {
        assert!(WorkerPool::start(0, registry()).is_err());
    }

    #[test]
    fn test_response_wire_shape() {
        let response = WorkerResponse::Error {
            error: MinifyError::new("boom"),
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"status":"error","error":{"message":"boom"}}"#
        );
    }
}
