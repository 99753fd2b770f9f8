//! Job record and status state machine

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::error::{WorkerError, WorkerResult};
use crate::jobs::JobRequest;

/// Stem name → public URL
pub type StemUrls = BTreeMap<String, String>;

// Hash field names, shared with the core API
const FIELD_STATUS: &str = "status";
const FIELD_TRACK_ID: &str = "trackId";
const FIELD_PREVIEW: &str = "preview";
const FIELD_PREVIEW_ALIAS: &str = "previewUrl";
const FIELD_CREATED_AT: &str = "created_at";
const FIELD_LAST_UPDATED: &str = "last_updated";
const FIELD_INSTRUMENTS: &str = "instruments";
const FIELD_ERROR: &str = "error";

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether the job has reached its final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether `self -> next` is a legal transition
    ///
    /// `Processing -> Pending` is the recovery reset of a timed-out job.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
                | (Self::Processing, Self::Pending)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// A job as persisted in the job store
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_id: String,
    pub track_id: i64,
    pub source_url: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Present only once completed
    pub result: Option<StemUrls>,
    /// Present only once failed
    pub error_message: Option<String>,
}

impl JobRecord {
    /// A fresh pending record for an ingress request
    pub fn pending(request: &JobRequest, now: DateTime<Utc>) -> Self {
        Self {
            job_id: request.job_id.clone(),
            track_id: request.track_id,
            source_url: request.source_url.clone(),
            status: JobStatus::Pending,
            created_at: now,
            last_updated: now,
            result: None,
            error_message: None,
        }
    }

    fn transition(&mut self, next: JobStatus, now: DateTime<Utc>) -> WorkerResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(WorkerError::InvalidTransition {
                job_id: self.job_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch(now);
        Ok(())
    }

    /// Refresh `last_updated`, never moving it backwards
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    /// pending → processing
    pub fn mark_processing(&mut self, now: DateTime<Utc>) -> WorkerResult<()> {
        self.transition(JobStatus::Processing, now)
    }

    /// processing → completed, recording the stem URLs
    pub fn complete(&mut self, result: StemUrls, now: DateTime<Utc>) -> WorkerResult<()> {
        self.transition(JobStatus::Completed, now)?;
        self.result = Some(result);
        Ok(())
    }

    /// processing → error, recording the failure text
    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> WorkerResult<()> {
        self.transition(JobStatus::Error, now)?;
        let message = message.into();
        self.error_message = Some(if message.trim().is_empty() {
            "unknown error".to_string()
        } else {
            message
        });
        Ok(())
    }

    /// processing → pending, used when recovery reclaims a timed-out job
    pub fn reset_to_pending(&mut self, now: DateTime<Utc>) -> WorkerResult<()> {
        self.transition(JobStatus::Pending, now)
    }

    /// A processing job whose last update is older than `timeout`
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.status == JobStatus::Processing && now - self.last_updated > timeout
    }

    /// A job of any status created longer than `expiry` ago
    pub fn is_expired(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        now - self.created_at > expiry
    }

    /// Encode as store fields
    pub fn to_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::from([
            (FIELD_STATUS.to_string(), self.status.as_str().to_string()),
            (FIELD_TRACK_ID.to_string(), self.track_id.to_string()),
            (FIELD_PREVIEW.to_string(), self.source_url.clone()),
            (FIELD_CREATED_AT.to_string(), self.created_at.to_rfc3339()),
            (FIELD_LAST_UPDATED.to_string(), self.last_updated.to_rfc3339()),
        ]);

        if let Some(ref result) = self.result {
            // BTreeMap<String, String> always serializes
            let encoded = serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string());
            fields.insert(FIELD_INSTRUMENTS.to_string(), encoded);
        }
        if let Some(ref message) = self.error_message {
            fields.insert(FIELD_ERROR.to_string(), message.clone());
        }
        fields
    }

    /// Decode from store fields
    ///
    /// Requires `status`, `trackId`, `preview` (or the core API's
    /// `previewUrl`) and `created_at`. A missing `last_updated` falls back
    /// to `created_at`.
    pub fn from_fields(job_id: &str, fields: &HashMap<String, String>) -> WorkerResult<Self> {
        let require = |name: &str| {
            fields
                .get(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| WorkerError::malformed(job_id, format!("missing field '{}'", name)))
        };

        let status: JobStatus = require(FIELD_STATUS)?
            .parse()
            .map_err(|e: String| WorkerError::malformed(job_id, e))?;

        let track_id: i64 = require(FIELD_TRACK_ID)?
            .trim()
            .parse()
            .map_err(|_| WorkerError::malformed(job_id, "trackId is not an integer"))?;

        let source_url = require(FIELD_PREVIEW)
            .or_else(|_| require(FIELD_PREVIEW_ALIAS))?
            .clone();

        let created_at = parse_timestamp(require(FIELD_CREATED_AT)?)
            .ok_or_else(|| WorkerError::malformed(job_id, "created_at is not a timestamp"))?;

        let last_updated = match fields.get(FIELD_LAST_UPDATED) {
            Some(raw) => parse_timestamp(raw)
                .ok_or_else(|| WorkerError::malformed(job_id, "last_updated is not a timestamp"))?,
            None => created_at,
        };

        let result = match (status, fields.get(FIELD_INSTRUMENTS)) {
            (JobStatus::Completed, Some(raw)) => Some(
                serde_json::from_str::<StemUrls>(raw)
                    .map_err(|e| WorkerError::malformed(job_id, format!("instruments: {}", e)))?,
            ),
            _ => None,
        };

        let error_message = match status {
            JobStatus::Error => fields.get(FIELD_ERROR).cloned(),
            _ => None,
        };

        Ok(Self {
            job_id: job_id.to_string(),
            track_id,
            source_url,
            status,
            created_at,
            last_updated,
            result,
            error_message,
        })
    }

    /// Read only `created_at` from raw fields (used by the expiry sweep)
    pub fn created_at_of(fields: &HashMap<String, String>) -> Option<DateTime<Utc>> {
        fields.get(FIELD_CREATED_AT).and_then(|raw| parse_timestamp(raw))
    }
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
