//! Startup Orchestrator - deploys and stops worker instances
//!
//! All workers are launched concurrently. Startup succeeds only when every
//! worker reports ready before the startup deadline; otherwise the workers
//! that did start are stopped again and the failure is returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no worker instances requested")]
    NoWorkers,
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker {index} failed to bind its listener: {source}")]
    WorkerBind {
        index: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("worker {index}: endpoint [{name}] failed to start")]
    EndpointStart { index: usize, name: String },
    #[error("worker {index} failed to start: {reason}")]
    WorkerFailed { index: usize, reason: String },
    #[error("worker {index} aborted during startup")]
    WorkerAborted { index: usize },
    #[error("worker launch task aborted: {0}")]
    LaunchAborted(String),
    #[error("startup timed out after {timeout:?} with {ready} of {expected} workers ready")]
    Timeout {
        timeout: Duration,
        ready: usize,
        expected: usize,
    },
}

/// A started worker instance
#[async_trait]
pub trait RunningWorker: Send {
    fn index(&self) -> usize;

    /// Stop accepting, close the worker's connections and release its resources
    ///
    /// Returns `false` when the worker did not finish within `timeout`.
    async fn stop(self: Box<Self>, timeout: Duration) -> bool;
}

/// Starts one worker instance
#[async_trait]
pub trait WorkerLauncher: Send + Sync + 'static {
    /// Resolves once worker `index` is ready to accept connections
    async fn launch(&self, index: usize) -> Result<Box<dyn RunningWorker>, StartupError>;
}

/// The set of running workers
pub struct WorkerPool {
    workers: Vec<Box<dyn RunningWorker>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl WorkerPool {
    /// Launch `count` workers and wait until all of them are ready
    ///
    /// On failure or timeout every worker that did start is stopped again.
    pub async fn start(
        launcher: Arc<dyn WorkerLauncher>,
        count: usize,
        startup_timeout: Duration,
        shutdown_timeout: Duration,
    ) -> Result<Self, StartupError> {
        if count == 0 {
            return Err(StartupError::NoWorkers);
        }
        info!("[Startup] Deploying {} worker instance(s)", count);

        let deadline = Instant::now() + startup_timeout;
        let mut launches = JoinSet::new();
        for index in 0..count {
            let launcher = launcher.clone();
            launches.spawn(async move { (index, launcher.launch(index).await) });
        }

        let mut started: Vec<Box<dyn RunningWorker>> = Vec::with_capacity(count);
        let mut failure: Option<StartupError> = None;

        // Wait for every launch so nothing is left running unnoticed
        loop {
            match tokio::time::timeout_at(deadline, launches.join_next()).await {
                Ok(Some(Ok((index, Ok(worker))))) => {
                    debug!("[Startup] Worker {} ready", index);
                    started.push(worker);
                }
                Ok(Some(Ok((index, Err(e))))) => {
                    error!("[Startup] Worker {} failed to start: {}", index, e);
                    failure = failure.or(Some(e));
                }
                Ok(Some(Err(e))) => {
                    error!("[Startup] Worker launch task failed: {}", e);
                    failure = failure.or(Some(StartupError::LaunchAborted(e.to_string())));
                }
                Ok(None) => break,
                Err(_) => {
                    error!(
                        "[Startup] Timed out after {:?} waiting for workers ({} of {} ready)",
                        startup_timeout,
                        started.len(),
                        count
                    );
                    launches.abort_all();
                    failure = failure.or(Some(StartupError::Timeout {
                        timeout: startup_timeout,
                        ready: started.len(),
                        expected: count,
                    }));
                    break;
                }
            }
        }

        started.sort_by_key(|worker| worker.index());

        if let Some(e) = failure {
            if !started.is_empty() {
                warn!("[Startup] Stopping {} worker(s) that did start", started.len());
                Self { workers: started }.shutdown(shutdown_timeout).await;
            }
            return Err(e);
        }

        info!("[Startup] All {} worker instance(s) ready", count);
        Ok(Self { workers: started })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Stop every worker, `true` only if all finished within `timeout`
    pub async fn shutdown(self, timeout: Duration) -> bool {
        info!("[Shutdown] Stopping {} worker instance(s)", self.workers.len());

        let mut stops = JoinSet::new();
        for worker in self.workers {
            stops.spawn(async move {
                let index = worker.index();
                (index, worker.stop(timeout).await)
            });
        }

        let all = async {
            let mut ok = true;
            while let Some(result) = stops.join_next().await {
                match result {
                    Ok((index, true)) => debug!("[Shutdown] Worker {} stopped", index),
                    Ok((index, false)) => {
                        warn!("[Shutdown] Worker {} did not stop cleanly", index);
                        ok = false;
                    }
                    Err(e) => {
                        warn!("[Shutdown] Worker stop task failed: {}", e);
                        ok = false;
                    }
                }
            }
            ok
        };

        let succeeded = tokio::time::timeout(timeout, all).await.unwrap_or(false);
        if succeeded {
            info!("[Shutdown] Gateway shut down");
        } else {
            warn!("[Shutdown] Gateway shutdown incomplete after {:?}", timeout);
        }
        succeeded
    }

    /// Stop every worker and report the outcome to `handler`
    pub async fn shutdown_then<F>(self, timeout: Duration, handler: F)
    where
        F: FnOnce(bool) + Send,
    {
        let succeeded = self.shutdown(timeout).await;
        handler(succeeded);
    }
}
