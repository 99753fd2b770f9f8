//! In-process job store for local development and tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{JobFields, JobStore};
use crate::error::{WorkerError, WorkerResult};

/// Job store backed by a process-local map
///
/// Same merge semantics as the Redis store. Can be switched into an
/// unavailable state to simulate an outage.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, JobFields>>,
    unavailable: AtomicBool,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `StoreUnavailable` until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored jobs
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> WorkerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(WorkerError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, JobFields>> {
        self.jobs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, JobFields>> {
        self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn put(&self, job_id: &str, fields: &JobFields) -> WorkerResult<()> {
        self.check_available()?;
        let mut jobs = self.write();
        let entry = jobs.entry(job_id.to_string()).or_default();
        for (name, value) in fields {
            entry.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn get(&self, job_id: &str) -> WorkerResult<Option<JobFields>> {
        self.check_available()?;
        Ok(self.read().get(job_id).cloned())
    }

    async fn scan(&self, prefix: &str) -> WorkerResult<Vec<String>> {
        self.check_available()?;
        let mut ids: Vec<String> = self
            .read()
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, job_id: &str) -> WorkerResult<bool> {
        self.check_available()?;
        Ok(self.write().remove(job_id).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
