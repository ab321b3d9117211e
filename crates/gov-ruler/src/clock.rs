//! Wall clock and drift source.
//!
//! The scheduler never calls `Utc::now()` directly; it asks its [`Clock`],
//! so tests and dry runs decide what time it is. Drift against an external
//! reference comes from a [`DriftSource`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::DriftError;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// A clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Reports signed clock drift in milliseconds against a reference.
#[async_trait]
pub trait DriftSource: Send + Sync {
    /// Current drift.
    async fn drift_ms(&self) -> Result<i64, DriftError>;
}

/// Always reports the same drift.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDrift(pub i64);

#[async_trait]
impl DriftSource for FixedDrift {
    async fn drift_ms(&self) -> Result<i64, DriftError> {
        Ok(self.0)
    }
}
