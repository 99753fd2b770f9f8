//! Worker pool
//!
//! Every dispatched job gets its own task, but only `max_concurrent` of them
//! may hold a processing slot at once. Slots are semaphore permits held for
//! the whole pipeline run and released when the task ends, however it ends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashSet;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn, Instrument};

use crate::error::{WorkerError, WorkerResult};
use crate::jobs::{JobRecord, JobStatus};
use crate::pipeline::JobProcessor;
use crate::store::JobRepository;

/// What to do with a job once it holds a slot, given the stored record
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    Run(JobRecord),
    Skip(&'static str),
}

/// Decide whether a job should run, based on the latest stored record
///
/// A missing or undecodable record is rewritten from the dispatched copy.
/// Terminal jobs and fresh `processing` jobs are left alone; a stale
/// `processing` record is reclaimed.
pub fn claim(
    dispatched: JobRecord,
    stored: Option<WorkerResult<JobRecord>>,
    now: chrono::DateTime<Utc>,
    processing_timeout: chrono::Duration,
) -> WorkerResult<Claim> {
    let mut record = match stored {
        None | Some(Err(_)) => dispatched,
        Some(Ok(stored)) => stored,
    };

    match record.status {
        JobStatus::Pending => Ok(Claim::Run(record)),
        JobStatus::Processing if record.is_stale(now, processing_timeout) => {
            record.reset_to_pending(now)?;
            Ok(Claim::Run(record))
        }
        JobStatus::Processing => Ok(Claim::Skip("already processing")),
        JobStatus::Completed => Ok(Claim::Skip("already completed")),
        JobStatus::Error => Ok(Claim::Skip("already failed")),
    }
}

struct PoolInner {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    repository: JobRepository,
    processor: Arc<dyn JobProcessor>,
    in_flight: DashSet<String>,
    tracker: TaskTracker,
    processing_timeout: chrono::Duration,
}

/// Removes a job from the in-flight set when its task ends
struct InFlightGuard {
    inner: Arc<PoolInner>,
    job_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.job_id);
    }
}

/// Bounded pool of job executions
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("active", &self.active_jobs())
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(
        max_concurrent: usize,
        repository: JobRepository,
        processor: Arc<dyn JobProcessor>,
        processing_timeout: chrono::Duration,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(max_concurrent)),
                max_concurrent,
                repository,
                processor,
                in_flight: DashSet::new(),
                tracker: TaskTracker::new(),
                processing_timeout,
            }),
        }
    }

    /// Queue a job for execution without waiting for it
    ///
    /// Returns `false` when the job is already queued or running in this
    /// process, or the pool is closed.
    pub fn dispatch(&self, record: JobRecord) -> bool {
        if self.inner.tracker.is_closed() {
            warn!(job_id = %record.job_id, "Pool closed, not dispatching");
            return false;
        }

        if !self.inner.in_flight.insert(record.job_id.clone()) {
            debug!(job_id = %record.job_id, "Job already in flight");
            return false;
        }

        let guard = InFlightGuard {
            inner: self.inner.clone(),
            job_id: record.job_id.clone(),
        };
        let inner = self.inner.clone();
        let span = tracing::info_span!("job", job_id = %record.job_id);
        self.inner.tracker.spawn(
            async move {
                let _guard = guard;
                run_job(inner, record).await;
            }
            .instrument(span),
        );
        true
    }

    /// Jobs currently holding a slot
    pub fn active_jobs(&self) -> usize {
        self.inner.max_concurrent - self.inner.semaphore.available_permits()
    }

    /// Jobs queued or running in this process
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    pub fn is_in_flight(&self, job_id: &str) -> bool {
        self.inner.in_flight.contains(job_id)
    }

    /// Stop accepting new dispatches
    pub fn close(&self) {
        self.inner.tracker.close();
    }

    /// Wait for tracked jobs to finish, up to `grace`
    ///
    /// Returns whether the pool drained in time. Jobs still running are
    /// abandoned and picked up later by recovery.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        self.inner.tracker.close();
        tokio::time::timeout(grace, self.inner.tracker.wait())
            .await
            .is_ok()
    }
}

async fn run_job(inner: Arc<PoolInner>, dispatched: JobRecord) {
    let job_id = dispatched.job_id.clone();

    let _permit = match inner.semaphore.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            warn!("Slot semaphore closed, dropping job");
            return;
        }
    };

    let stored = match inner.repository.load(&job_id).await {
        Ok(stored) => stored,
        Err(e) => {
            warn!(error = %e, "Could not read job before starting, leaving it for recovery");
            return;
        }
    };

    let mut record = match claim(dispatched, stored, Utc::now(), inner.processing_timeout) {
        Ok(Claim::Run(record)) => record,
        Ok(Claim::Skip(reason)) => {
            debug!(reason, "Skipping job");
            return;
        }
        Err(e) => {
            e.log();
            return;
        }
    };

    if let Err(e) = record.mark_processing(Utc::now()) {
        e.log();
        return;
    }
    if let Err(e) = inner.repository.save(&record).await {
        warn!(error = %e, "Could not mark job processing, leaving it for recovery");
        return;
    }
    info!(track_id = record.track_id, "Job processing");

    // Own task so a panicking pipeline only fails this job
    let processor = inner.processor.clone();
    let job = record.clone();
    let outcome = tokio::spawn(async move { processor.process(&job).await })
        .await
        .map_err(WorkerError::from)
        .and_then(|result| result);

    let finished = match outcome {
        Ok(urls) => {
            let stems = urls.len();
            record.complete(urls, Utc::now()).map(|_| {
                info!(stems, "Job completed");
            })
        }
        Err(e) => {
            e.log();
            record.fail(e.to_string(), Utc::now())
        }
    };
    if let Err(e) = finished {
        e.log();
        return;
    }

    if let Err(e) = inner.repository.save(&record).await {
        error!(error = %e, status = %record.status, "Could not store job outcome");
    }
}
