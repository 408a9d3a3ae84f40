#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Monitoring pipeline.
//!
//! [`Monitor`] runs each subject through zone evaluation, anomaly
//! detection, risk scoring, the escalation state machine and, when needed,
//! emergency search estimation. It reads and writes through a
//! [`MonitorStore`], reports through an [`EventPublisher`], and takes time
//! from a [`Clock`], so the whole pipeline can run against in-memory
//! collaborators.
//!
//! Evaluations of the same subject are serialized, whether they come from
//! the periodic loop or from [`Monitor::ingest_location`].

pub mod clock;
pub mod monitor;
pub mod publisher;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use monitor::Monitor;
pub use publisher::{BroadcastPublisher, EventPublisher, NullPublisher};
pub use store::{MemoryStore, MonitorStore, StoreError};

use safe_wander_emergency::EmergencyError;

/// Errors from evaluating a subject.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An emergency record rejected a change.
    #[error("Emergency error: {0}")]
    Emergency(#[from] EmergencyError),

    /// The subject does not exist.
    #[error("Unknown subject: {0}")]
    UnknownSubject(String),
}
