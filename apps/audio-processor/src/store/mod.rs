//! Job store
//!
//! Jobs live in a shared key-value store as flat string maps under
//! `job:{job_id}`. The [`JobStore`] trait is the raw-field boundary; the
//! [`JobRepository`] layers [`JobRecord`] encoding on top of it.

mod memory;
mod redis;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WorkerResult;
use crate::jobs::JobRecord;

pub use self::memory::InMemoryJobStore;
pub use self::redis::RedisJobStore;

/// Raw persisted fields of one job
pub type JobFields = HashMap<String, String>;

/// Key prefix under which job hashes are stored
pub const JOB_KEY_PREFIX: &str = "job:";

/// Store key for a job id
pub fn job_key(job_id: &str) -> String {
    format!("{}{}", JOB_KEY_PREFIX, job_id)
}

/// Job id for a store key, if it has the job prefix
pub fn job_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(JOB_KEY_PREFIX).filter(|id| !id.is_empty())
}

/// Shared key-value store holding job records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Merge `fields` into the job's hash, creating it if absent
    async fn put(&self, job_id: &str, fields: &JobFields) -> WorkerResult<()>;

    /// All fields of a job, or `None` if the job does not exist
    async fn get(&self, job_id: &str) -> WorkerResult<Option<JobFields>>;

    /// Ids of every job whose id starts with `prefix`
    async fn scan(&self, prefix: &str) -> WorkerResult<Vec<String>>;

    /// Remove a job; returns whether it existed
    async fn delete(&self, job_id: &str) -> WorkerResult<bool>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Typed access to job records over a [`JobStore`]
#[derive(Clone)]
pub struct JobRepository {
    store: Arc<dyn JobStore>,
}

impl JobRepository {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Load a record
    ///
    /// The outer error is a store failure; the inner result is `Err` when the
    /// stored fields do not decode.
    pub async fn load(&self, job_id: &str) -> WorkerResult<Option<WorkerResult<JobRecord>>> {
        Ok(self
            .store
            .get(job_id)
            .await?
            .map(|fields| JobRecord::from_fields(job_id, &fields)))
    }

    /// Raw fields of a record
    pub async fn load_fields(&self, job_id: &str) -> WorkerResult<Option<JobFields>> {
        self.store.get(job_id).await
    }

    /// Write every field of the record
    ///
    /// Writing all fields means a record deleted in the meantime is
    /// re-created whole rather than as a fragment.
    pub async fn save(&self, record: &JobRecord) -> WorkerResult<()> {
        self.store.put(&record.job_id, &record.to_fields()).await
    }

    pub async fn delete(&self, job_id: &str) -> WorkerResult<bool> {
        self.store.delete(job_id).await
    }

    /// Every job id currently in the store
    pub async fn list_ids(&self) -> WorkerResult<Vec<String>> {
        self.store.scan("").await
    }
}
