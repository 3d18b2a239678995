//! Run dispatch: single-run exclusion and the background worker.
//!
//! `EngagementService::trigger` is the trigger boundary. It never blocks on
//! the run itself: it either hands the run to a dedicated worker thread and
//! returns `Started`, or returns `Busy` / `Failed` immediately.

use anyhow::anyhow;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::config::EngineConfig;
use crate::detect::SharedBackend;
use crate::ingest::FileConfig;
use crate::pipeline::{Pipeline, PipelineError, RunArtifacts, RunGuard, RunLock, RunReport};

const WORKER_THREAD_NAME: &str = "engagement-run";

/// Result of a trigger request.
#[derive(Debug)]
pub enum TriggerOutcome {
    Started(RunHandle),
    /// Another run holds the lock. Nothing was started or queued.
    Busy,
    /// The run could not be dispatched.
    Failed(String),
}

/// Handle to a dispatched run. Dropping it detaches the worker.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: u64,
    join: JoinHandle<Result<RunReport, PipelineError>>,
}

impl RunHandle {
    /// Block until the run finishes.
    pub fn join(self) -> anyhow::Result<Result<RunReport, PipelineError>> {
        self.join
            .join()
            .map_err(|_| anyhow!("run worker {} panicked", self.run_id))
    }
}

/// Outcome of the most recent finished run.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RunSummary {
    pub run_id: u64,
    pub succeeded: bool,
    pub frames: u64,
    pub elapsed_ms: u64,
    pub finished_at_epoch_s: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_engagement: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ServiceStatus {
    pub running: bool,
    pub last_run: Option<RunSummary>,
}

#[derive(Clone)]
pub struct EngagementService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    input: FileConfig,
    artifacts: RunArtifacts,
    pipeline: Pipeline,
    backend: SharedBackend,
    lock: Arc<RunLock>,
    next_run_id: AtomicU64,
    last_run: Mutex<Option<RunSummary>>,
}

impl EngagementService {
    pub fn new(
        input: FileConfig,
        artifacts: RunArtifacts,
        pipeline: Pipeline,
        backend: SharedBackend,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                input,
                artifacts,
                pipeline,
                backend,
                lock: RunLock::new(),
                next_run_id: AtomicU64::new(1),
                last_run: Mutex::new(None),
            }),
        }
    }

    /// Build a service from configuration, loading the tracker backend once.
    pub fn from_config(cfg: &EngineConfig) -> anyhow::Result<Self> {
        let backend = cfg.backend.load()?;
        Ok(Self::new(
            cfg.input(),
            cfg.artifacts(),
            Pipeline::new(cfg.pipeline_settings()),
            backend,
        ))
    }

    pub fn artifacts(&self) -> &RunArtifacts {
        &self.inner.artifacts
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock.is_active()
    }

    pub fn status(&self) -> ServiceStatus {
        let last_run = self
            .inner
            .last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        ServiceStatus {
            running: self.is_running(),
            last_run,
        }
    }

    /// Start a run unless one is already active.
    pub fn trigger(&self) -> TriggerOutcome {
        let Some(guard) = self.inner.lock.try_acquire() else {
            log::info!("run requested while another run is active; rejected");
            return TriggerOutcome::Busy;
        };
        let run_id = self.inner.next_run_id.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let spawned = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || inner.execute(run_id, guard));
        match spawned {
            Ok(join) => {
                log::info!("run {} started", run_id);
                TriggerOutcome::Started(RunHandle { run_id, join })
            }
            // the closure, and the guard with it, is dropped on spawn failure
            Err(err) => {
                log::error!("failed to spawn run worker: {}", err);
                TriggerOutcome::Failed(format!("failed to spawn run worker: {}", err))
            }
        }
    }
}

impl ServiceInner {
    fn execute(&self, run_id: u64, guard: RunGuard) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            // a panicked run poisons the mutex; the backend is reset at run start
            let mut backend = self.backend.lock().unwrap_or_else(|poisoned| {
                log::warn!("tracker backend lock poisoned by an earlier run; recovering");
                poisoned.into_inner()
            });
            self.pipeline.run(&guard, &self.input, &mut *backend, &self.artifacts)
        }));
        let result = outcome.unwrap_or_else(|payload| {
            Err(PipelineError::Panicked {
                message: panic_message(payload.as_ref()),
            })
        });

        let summary = match &result {
            Ok(report) => {
                log::info!(
                    "run {} finished: {} frames in {:.2}s",
                    run_id,
                    report.frames,
                    report.elapsed.as_secs_f64()
                );
                RunSummary {
                    run_id,
                    succeeded: true,
                    frames: report.frames,
                    elapsed_ms: report.elapsed.as_millis() as u64,
                    finished_at_epoch_s: epoch_secs(),
                    mean_engagement: report.mean_engagement,
                    error_kind: None,
                    error: None,
                }
            }
            Err(err) => {
                log::error!("run {} failed ({}): {}", run_id, err.kind(), err);
                RunSummary {
                    run_id,
                    succeeded: false,
                    frames: 0,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    finished_at_epoch_s: epoch_secs(),
                    mean_engagement: None,
                    error_kind: Some(err.kind()),
                    error: Some(err.to_string()),
                }
            }
        };
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = Some(summary);
        drop(guard);
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
