//! Job ingress
//!
//! Listens on the Redis job channel, turns each message into a pending job
//! record and hands it to the worker pool. The listener reconnects forever;
//! only shutdown stops it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::jobs::{JobRecord, JobRequest};
use crate::store::JobRepository;
use crate::worker::WorkerPool;

/// Initial reconnect delay
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Result of handling one ingress message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Handed to the worker pool
    Dispatched,
    /// Already queued or running in this process
    AlreadyInFlight,
    /// Dropped because it did not decode
    Rejected(String),
}

/// Turns decoded requests into records and dispatches them
#[derive(Clone)]
pub struct JobIntake {
    repository: JobRepository,
    pool: WorkerPool,
}

impl JobIntake {
    pub fn new(repository: JobRepository, pool: WorkerPool) -> Self {
        Self { repository, pool }
    }

    /// Handle one raw channel payload
    pub async fn handle_message(&self, payload: &str) -> IntakeOutcome {
        match JobRequest::decode(payload) {
            Ok(request) => self.submit(request, Utc::now()).await,
            Err(e) => {
                warn!(error = %e, payload_len = payload.len(), "Dropping undecodable job message");
                IntakeOutcome::Rejected(e.to_string())
            }
        }
    }

    /// Make sure the job has a record, then dispatch it
    ///
    /// A store failure is logged and the job is dispatched anyway; the
    /// worker writes the record when it starts.
    pub async fn submit(&self, request: JobRequest, now: DateTime<Utc>) -> IntakeOutcome {
        let record = match self.ensure_record(&request, now).await {
            Ok(record) => record,
            Err(e) => {
                warn!(job_id = %request.job_id, error = %e, "Could not persist incoming job");
                JobRecord::pending(&request, now)
            }
        };

        let job_id = record.job_id.clone();
        if self.pool.dispatch(record) {
            info!(job_id = %job_id, track_id = request.track_id, "Job dispatched");
            IntakeOutcome::Dispatched
        } else {
            IntakeOutcome::AlreadyInFlight
        }
    }

    async fn ensure_record(&self, request: &JobRequest, now: DateTime<Utc>) -> WorkerResult<JobRecord> {
        match self.repository.load(&request.job_id).await? {
            Some(Ok(existing)) => {
                debug!(job_id = %existing.job_id, status = %existing.status, "Job record exists");
                Ok(existing)
            }
            Some(Err(e)) => {
                let fields = self
                    .repository
                    .load_fields(&request.job_id)
                    .await?
                    .unwrap_or_default();
                let mut record = JobRecord::pending(request, now);
                if let Some(created_at) = JobRecord::created_at_of(&fields) {
                    record.created_at = created_at;
                } else {
                    debug!(job_id = %request.job_id, reason = %e, "Backfilling job record");
                }
                self.repository.save(&record).await?;
                Ok(record)
            }
            None => {
                let record = JobRecord::pending(request, now);
                self.repository.save(&record).await?;
                Ok(record)
            }
        }
    }
}

/// Pub/sub listener feeding a [`JobIntake`]
pub struct Dispatcher {
    client: redis::Client,
    channel: String,
    intake: JobIntake,
    max_backoff: Duration,
}

impl Dispatcher {
    pub fn new(
        client: redis::Client,
        channel: impl Into<String>,
        intake: JobIntake,
        max_backoff: Duration,
    ) -> Self {
        Self {
            client,
            channel: channel.into(),
            intake,
            max_backoff: max_backoff.max(INITIAL_BACKOFF),
        }
    }

    /// Listen until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        let mut attempts = 0u32;
        let mut delay = INITIAL_BACKOFF;

        loop {
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.listen() => result,
            };

            match result {
                Ok(()) => {
                    warn!(channel = %self.channel, "Job channel subscription ended, resubscribing");
                    attempts = 0;
                    delay = INITIAL_BACKOFF;
                }
                Err(e) => {
                    attempts += 1;
                    error!(
                        error = %e,
                        attempt = attempts,
                        delay_secs = delay.as_secs(),
                        "Job channel listener error, reconnecting"
                    );
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = next_backoff(delay, self.max_backoff);
        }

        info!(channel = %self.channel, "Dispatcher stopped");
    }

    async fn listen(&self) -> WorkerResult<()> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(&self.channel).await?;
        info!(channel = %self.channel, "Subscribed to job channel");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    WorkerError::Decode(format!("non-text payload: {}", e)).log();
                    continue;
                }
            };
            self.intake.handle_message(&payload).await;
        }

        Ok(())
    }
}

/// Double the delay, capped at `max`
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}
