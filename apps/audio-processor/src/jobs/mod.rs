//! Job definitions
//!
//! A job turns one track preview into a set of separated stems. This module
//! holds the ingress message type ([`JobRequest`]), the persisted entity
//! ([`JobRecord`]) and its state machine ([`JobStatus`]).

mod record;
mod request;

pub use record::{parse_timestamp, JobRecord, JobStatus, StemUrls};
pub use request::JobRequest;
