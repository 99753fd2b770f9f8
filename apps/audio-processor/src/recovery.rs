//! Recovery loop
//!
//! Periodically sweeps the job store: first deletes expired records, then
//! re-dispatches jobs nobody is working on (pending, or stuck in
//! processing). Each tick is independent; a failed sweep is retried on
//! the next one.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WorkerResult;
use crate::jobs::JobStatus;
use crate::store::JobRepository;
use crate::worker::WorkerPool;

/// Counts from one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub resurrected: usize,
    pub skipped: usize,
    pub malformed: usize,
}

impl SweepReport {
    fn merge(self, other: SweepReport) -> SweepReport {
        SweepReport {
            scanned: self.scanned.max(other.scanned),
            expired: self.expired + other.expired,
            resurrected: self.resurrected + other.resurrected,
            skipped: self.skipped + other.skipped,
            malformed: self.malformed + other.malformed,
        }
    }
}

pub struct RecoveryLoop {
    repository: JobRepository,
    pool: WorkerPool,
    interval: Duration,
    processing_timeout: chrono::Duration,
    expiry: chrono::Duration,
}

impl RecoveryLoop {
    pub fn new(
        repository: JobRepository,
        pool: WorkerPool,
        interval: Duration,
        processing_timeout: chrono::Duration,
        expiry: chrono::Duration,
    ) -> Self {
        Self {
            repository,
            pool,
            interval,
            processing_timeout,
            expiry,
        }
    }

    /// Sweep every interval until `shutdown` is cancelled
    ///
    /// The first sweep runs immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Recovery loop started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.tick(Utc::now()).await;
                    if report.expired + report.resurrected + report.malformed > 0 {
                        info!(?report, "Recovery sweep finished");
                    } else {
                        debug!(?report, "Recovery sweep finished");
                    }
                }
            }
        }
        info!("Recovery loop stopped");
    }

    /// Run both sweeps, expiry first
    pub async fn tick(&self, now: DateTime<Utc>) -> SweepReport {
        let expiry = match self.expiry_sweep(now).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Expiry sweep failed");
                SweepReport::default()
            }
        };
        let resurrection = match self.resurrection_sweep(now).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Resurrection sweep failed");
                SweepReport::default()
            }
        };
        expiry.merge(resurrection)
    }

    /// Delete every record created more than `expiry` ago, whatever its status
    pub async fn expiry_sweep(&self, now: DateTime<Utc>) -> WorkerResult<SweepReport> {
        let mut report = SweepReport::default();

        for job_id in self.repository.list_ids().await? {
            report.scanned += 1;
            let Some(fields) = self.repository.load_fields(&job_id).await? else {
                continue;
            };

            let Some(created_at) = crate::jobs::JobRecord::created_at_of(&fields) else {
                warn!(job_id = %job_id, "Job has no readable created_at, not expiring");
                report.malformed += 1;
                continue;
            };

            if now - created_at > self.expiry && self.repository.delete(&job_id).await? {
                info!(job_id = %job_id, "Expired job deleted");
                report.expired += 1;
            }
        }
        Ok(report)
    }

    /// Re-dispatch pending jobs and stale processing jobs
    pub async fn resurrection_sweep(&self, now: DateTime<Utc>) -> WorkerResult<SweepReport> {
        let mut report = SweepReport::default();

        for job_id in self.repository.list_ids().await? {
            report.scanned += 1;
            let mut record = match self.repository.load(&job_id).await? {
                None => continue,
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    warn!(job_id = %job_id, error = %e, "Skipping malformed job record");
                    report.malformed += 1;
                    continue;
                }
            };

            match record.status {
                JobStatus::Pending => {}
                JobStatus::Processing if record.is_stale(now, self.processing_timeout) => {}
                _ => continue,
            }

            if self.pool.is_in_flight(&job_id) {
                report.skipped += 1;
                continue;
            }

            if record.status == JobStatus::Processing {
                warn!(
                    job_id = %job_id,
                    last_updated = %record.last_updated,
                    "Job stuck in processing, resetting"
                );
                record.reset_to_pending(now)?;
                self.repository.save(&record).await?;
            }

            if self.pool.dispatch(record) {
                info!(job_id = %job_id, "Job re-dispatched");
                report.resurrected += 1;
            } else {
                report.skipped += 1;
            }
        }
        Ok(report)
    }
}
