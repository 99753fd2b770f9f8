//! Redis-backed job store
//!
//! Each job is a Redis hash at `job:{job_id}`. Connections are taken
//! per operation from the multiplexed client.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use ::redis::aio::MultiplexedConnection;
use ::redis::Client;
use multitune_shared_config::RedisConfig;

use super::{job_id_from_key, JobFields, JobStore, JOB_KEY_PREFIX};
use crate::error::{WorkerError, WorkerResult};

/// Keys requested per SCAN round trip
const SCAN_BATCH_SIZE: usize = 100;

/// Job store on a shared Redis instance
#[derive(Clone)]
pub struct RedisJobStore {
    client: Client,
    connect_timeout: Duration,
}

impl RedisJobStore {
    /// Create a store from configuration
    ///
    /// Does not connect; the first operation does.
    pub fn new(config: &RedisConfig) -> WorkerResult<Self> {
        let client = Client::open(config.connection_url())?;
        Ok(Self {
            client,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        })
    }

    /// Underlying client, shared with the pub/sub dispatcher
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn connection(&self) -> WorkerResult<MultiplexedConnection> {
        tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            WorkerError::StoreUnavailable(format!(
                "connection timed out after {}s",
                self.connect_timeout.as_secs()
            ))
        })?
        .map_err(WorkerError::from)
    }

    /// Check connectivity
    pub async fn ping(&self) -> WorkerResult<()> {
        let mut conn = self.connection().await?;
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Escape glob metacharacters so a prefix matches literally in SCAN MATCH
fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn put(&self, job_id: &str, fields: &JobFields) -> WorkerResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        let mut cmd = ::redis::cmd("HSET");
        cmd.arg(super::job_key(job_id));
        for (name, value) in fields {
            cmd.arg(name).arg(value);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> WorkerResult<Option<JobFields>> {
        let mut conn = self.connection().await?;
        let fields: JobFields = ::redis::cmd("HGETALL")
            .arg(super::job_key(job_id))
            .query_async(&mut conn)
            .await?;

        // HGETALL on a missing key is an empty hash
        Ok(if fields.is_empty() { None } else { Some(fields) })
    }

    async fn scan(&self, prefix: &str) -> WorkerResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}{}*", JOB_KEY_PREFIX, escape_glob(prefix));

        // SCAN may return a key more than once
        let mut ids = BTreeSet::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await?;

            ids.extend(keys.iter().filter_map(|k| job_id_from_key(k)).map(String::from));

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(ids.into_iter().collect())
    }

    async fn delete(&self, job_id: &str) -> WorkerResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = ::redis::cmd("DEL")
            .arg(super::job_key(job_id))
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
