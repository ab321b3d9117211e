//! Scheduler configuration.
//!
//! Built explicitly with [`RulerConfig::new`] or read from the environment
//! with [`RulerConfig::from_env`]. The tenant timezone is validated either
//! way, so a bad zone fails at setup rather than at midnight.

use std::time::Duration;

use gov_core::{TenantConfig, TimezoneError};

/// Actor recorded on ledger events written by the scheduler.
pub const SYSTEM_ACTOR: &str = "system:midnight_ruler";

/// Default maximum tolerated clock drift.
pub const DEFAULT_DRIFT_THRESHOLD: Duration = Duration::from_millis(500);

/// Default bound on a single notification dispatch.
///
/// Also the worst-case delay one `notify` action adds to a run.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of one tenant's scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct RulerConfig {
    /// Tenant being governed.
    pub tenant: TenantConfig,
    /// Runs abort when the absolute drift exceeds this.
    pub drift_threshold: Duration,
    /// Upper bound on each `notify` dispatch. Dispatches are awaited in
    /// action order, so a notifier that always stalls adds this much to
    /// the run for every `notify` action executed.
    pub notify_timeout: Duration,
    /// Actor written to ledger events.
    pub actor: String,
}

impl RulerConfig {
    /// Configuration with default thresholds.
    pub fn new(tenant: TenantConfig) -> Result<Self, ConfigError> {
        tenant.validate()?;
        Ok(Self {
            tenant,
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            actor: SYSTEM_ACTOR.to_string(),
        })
    }

    /// Builder: set the drift threshold.
    pub fn with_drift_threshold(mut self, threshold: Duration) -> Self {
        self.drift_threshold = threshold;
        self
    }

    /// Builder: set the notification timeout.
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `GOV_TENANT_ID` (required)
    /// - `GOV_TENANT_TIMEZONE` (default: `UTC`)
    /// - `GOV_TENANT_QUORUM` (default: 1)
    /// - `GOV_DRIFT_THRESHOLD_MS` (default: 500)
    /// - `GOV_NOTIFY_TIMEOUT_SECS` (default: 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// [`from_env`](Self::from_env) against an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let id = lookup("GOV_TENANT_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingVar("GOV_TENANT_ID"))?;
        let timezone = lookup("GOV_TENANT_TIMEZONE").unwrap_or_else(|| "UTC".to_string());
        let quorum = parse_var(&lookup, "GOV_TENANT_QUORUM", 1u32)?;
        let drift_ms = parse_var(&lookup, "GOV_DRIFT_THRESHOLD_MS", 500u64)?;
        let notify_secs = parse_var(&lookup, "GOV_NOTIFY_TIMEOUT_SECS", 5u64)?;

        Ok(Self::new(TenantConfig::new(id, timezone, quorum))?
            .with_drift_threshold(Duration::from_millis(drift_ms))
            .with_notify_timeout(Duration::from_secs(notify_secs)))
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    /// A variable does not parse.
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// The tenant timezone does not resolve.
    #[error(transparent)]
    Timezone(#[from] TimezoneError),
}
