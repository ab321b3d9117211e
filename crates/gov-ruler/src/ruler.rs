//! # The Midnight Ruler
//!
//! One scheduler per tenant. After [`MidnightRuler::start`], a background
//! task sleeps until the next local midnight of the tenant's zone, runs,
//! and re-arms from the clock's *current* instant, so a long run or a
//! DST transition never shifts the schedule. Runs never overlap:
//! scheduled runs and [`MidnightRuler::run_now`] share one run lock.
//!
//! ```text
//!   Idle ──start──▶ Scheduled ──midnight──▶ Running ──done──▶ Scheduled
//!                       │                                        │
//!                       └────────────────stop────────────────────┴──▶ Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gov_core::{next_midnight, parse_timezone, IncidentKind};
use gov_law::LawBook;
use gov_metrics::MetricsCollector;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, DriftSource, FixedDrift, SystemClock};
use crate::config::RulerConfig;
use crate::error::RulerError;
use crate::notify::{LoggingNotifier, Notifier};
use crate::repository::GovernanceRepository;
use crate::run::{RunExecutor, RunReport};

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RulerState {
    /// Built, not started.
    Idle,
    /// Waiting for the next run.
    Scheduled {
        /// Instant of the next run.
        next: DateTime<Utc>,
    },
    /// A run is in progress.
    Running,
    /// Stopped; cannot be restarted.
    Stopped,
}

/// Builder for [`MidnightRuler`].
pub struct MidnightRulerBuilder {
    config: RulerConfig,
    laws: Arc<LawBook>,
    repository: Arc<dyn GovernanceRepository>,
    notifier: Option<Arc<dyn Notifier>>,
    drift: Option<Arc<dyn DriftSource>>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl MidnightRulerBuilder {
    /// Notifier for `notify` actions. Defaults to [`LoggingNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Drift source. Defaults to zero drift.
    pub fn drift_source(mut self, drift: Arc<dyn DriftSource>) -> Self {
        self.drift = Some(drift);
        self
    }

    /// Clock. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Metrics collector. Defaults to the process-wide collector.
    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the ruler, resolving the tenant timezone.
    pub fn build(self) -> Result<MidnightRuler, RulerError> {
        let timezone = parse_timezone(&self.config.tenant.timezone)?;
        let executor = RunExecutor {
            config: self.config,
            timezone,
            laws: self.laws,
            repository: self.repository,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LoggingNotifier)),
            drift: self.drift.unwrap_or_else(|| Arc::new(FixedDrift(0))),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            metrics: self.metrics.unwrap_or_else(gov_metrics::global),
        };
        Ok(MidnightRuler {
            executor: Arc::new(executor),
            state: Arc::new(Mutex::new(RulerState::Idle)),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        })
    }
}

/// Daily governance scheduler for one tenant.
pub struct MidnightRuler {
    executor: Arc<RunExecutor>,
    state: Arc<Mutex<RulerState>>,
    run_lock: Arc<tokio::sync::Mutex<()>>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for MidnightRuler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidnightRuler")
            .field("executor", &self.executor)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl MidnightRuler {
    /// Start building a ruler.
    pub fn builder(
        config: RulerConfig,
        laws: Arc<LawBook>,
        repository: Arc<dyn GovernanceRepository>,
    ) -> MidnightRulerBuilder {
        MidnightRulerBuilder {
            config,
            laws,
            repository,
            notifier: None,
            drift: None,
            clock: None,
            metrics: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RulerState {
        *self.state.lock()
    }

    /// Tenant governed by this ruler.
    pub fn tenant_id(&self) -> &str {
        &self.executor.config.tenant.id
    }

    /// Arm the daily schedule.
    ///
    /// Calling `start` on a running ruler is a no-op. A stopped ruler
    /// cannot be restarted. The schedule runs as a task on the current
    /// Tokio runtime; outside one this returns [`RulerError::NoRuntime`].
    pub fn start(&self) -> Result<(), RulerError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| RulerError::NoRuntime(self.tenant_id().to_string()))?;
        let mut handle = self.handle.lock();
        if self.cancel.is_cancelled() || self.state() == RulerState::Stopped {
            return Err(RulerError::Stopped(self.tenant_id().to_string()));
        }
        if handle.is_some() {
            tracing::debug!(tenant = %self.tenant_id(), "ruler already started");
            return Ok(());
        }

        let first = next_midnight(self.executor.timezone, self.executor.clock.now())?;
        *self.state.lock() = RulerState::Scheduled { next: first };
        tracing::info!(tenant = %self.tenant_id(), next_run = %first, "midnight ruler started");

        let executor = Arc::clone(&self.executor);
        let state = Arc::clone(&self.state);
        let run_lock = Arc::clone(&self.run_lock);
        let cancel = self.cancel.clone();
        *handle = Some(runtime.spawn(schedule_loop(executor, state, run_lock, cancel, first)));
        Ok(())
    }

    /// Cancel the schedule and wait for the loop to exit. An in-flight
    /// run is allowed to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(tenant = %self.tenant_id(), error = %e, "scheduler task ended abnormally");
            }
        }
        *self.state.lock() = RulerState::Stopped;
        tracing::info!(tenant = %self.tenant_id(), "midnight ruler stopped");
    }

    /// Run immediately, outside the schedule. Waits for any in-flight run.
    pub async fn run_now(&self) -> RunReport {
        let _guard = self.run_lock.lock().await;
        let previous = std::mem::replace(&mut *self.state.lock(), RulerState::Running);
        let report = Arc::clone(&self.executor).run_contained().await;
        let mut state = self.state.lock();
        if *state == RulerState::Running {
            *state = previous;
        }
        report
    }
}

impl Drop for MidnightRuler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn schedule_loop(
    executor: Arc<RunExecutor>,
    state: Arc<Mutex<RulerState>>,
    run_lock: Arc<tokio::sync::Mutex<()>>,
    cancel: CancellationToken,
    first: DateTime<Utc>,
) {
    let tenant = executor.config.tenant.id.clone();
    let mut next = first;
    loop {
        *state.lock() = RulerState::Scheduled { next };
        let wait = (next - executor.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        tracing::debug!(tenant = %tenant, next_run = %next, wait_ms = wait.as_millis() as u64, "waiting for midnight");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        {
            let _guard = run_lock.lock().await;
            *state.lock() = RulerState::Running;
            Arc::clone(&executor).run_contained().await;
        }

        if cancel.is_cancelled() {
            break;
        }
        next = rearm(&executor, next).await;
    }
    *state.lock() = RulerState::Stopped;
}

/// Next run instant after a run that was scheduled for `scheduled`.
///
/// Computed from the clock's current instant. If that lands on or before
/// `scheduled` (the run finished before the clock reached it), compute
/// from `scheduled` itself so the same midnight never fires twice. A zone
/// that cannot produce a midnight is recorded as `tzdata_corruption` and
/// retried in 24 hours.
async fn rearm(executor: &RunExecutor, scheduled: DateTime<Utc>) -> DateTime<Utc> {
    let now = executor.clock.now();
    let from = now.max(scheduled);
    match next_midnight(executor.timezone, from) {
        Ok(next) => next,
        Err(e) => {
            let mut report = RunReport::placeholder(executor, now);
            executor
                .record_incident(
                    &mut report,
                    IncidentKind::TzdataCorruption,
                    format!("cannot compute next midnight: {e}; retrying in 24h"),
                    None,
                    "",
                )
                .await;
            from + chrono::Duration::hours(24)
        }
    }
}
