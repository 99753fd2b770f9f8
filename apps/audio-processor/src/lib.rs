//! Multitune audio processor
//!
//! Consumes stem separation jobs from a Redis channel, runs them through a
//! bounded worker pool and records their progress in a shared job store.
//! A recovery loop re-dispatches jobs that were dropped or got stuck and
//! deletes old records.
//!
//! ```text
//! job channel ──► Dispatcher ──► WorkerPool ──► StemPipeline
//!                     │              │             (download, separate, upload)
//!                     ▼              ▼
//!                  JobStore ◄── RecoveryLoop
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod jobs;
pub mod pipeline;
pub mod recovery;
pub mod store;
pub mod worker;

pub use config::{Config, StoreBackend};
pub use dispatcher::{Dispatcher, IntakeOutcome, JobIntake};
pub use error::{ErrorSeverity, WorkerError, WorkerResult};
pub use jobs::{JobRecord, JobRequest, JobStatus, StemUrls};
pub use recovery::{RecoveryLoop, SweepReport};
pub use store::{InMemoryJobStore, JobRepository, JobStore, RedisJobStore};
pub use worker::WorkerPool;
