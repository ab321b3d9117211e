//! # gov-ruler: The Midnight Ruler
//!
//! Per-tenant daily governance. At local midnight in the tenant's zone the
//! ruler fetches active resources, triages each against the laws in force,
//! composes the result with the tenant's policy overlays and executes the
//! decision exactly once per day.
//!
//! - [`ruler`]: the scheduler lifecycle (`start`, `stop`, `run_now`).
//! - [`run`]: a single run and its [`RunReport`].
//! - [`repository`], [`notify`], [`clock`]: the collaborators a run talks
//!   to, each behind a trait with an in-process implementation.
//! - [`config`]: [`RulerConfig`], explicit or from the environment.
//!
//! Failures inside a run become incidents (ledger event plus
//! `governance_incidents_total`) and never escape the run.

pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod repository;
pub mod ruler;
pub mod run;

pub use clock::{Clock, DriftSource, FixedDrift, ManualClock, SystemClock};
pub use config::{ConfigError, RulerConfig, DEFAULT_DRIFT_THRESHOLD, DEFAULT_NOTIFY_TIMEOUT, SYSTEM_ACTOR};
pub use error::{DriftError, NotifyError, RulerError, StorageError};
pub use notify::{LoggingNotifier, NotificationContext, Notifier, RecordingNotifier};
pub use repository::{GovernanceRepository, InMemoryRepository};
pub use ruler::{MidnightRuler, MidnightRulerBuilder, RulerState};
pub use run::{decision_key, DecisionSummary, RunExecutor, RunOutcome, RunReport};
