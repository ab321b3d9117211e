//! Error types for the scheduler and its collaborators.

use gov_core::TimezoneError;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure reported by a storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the operation.
    #[error("storage rejected operation: {0}")]
    Rejected(String),
}

/// Failure reported by a notification collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification to {role} failed: {reason}")]
pub struct NotifyError {
    /// Role that was being notified.
    pub role: String,
    /// Why delivery failed.
    pub reason: String,
}

/// The drift source could not produce a reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("drift source unavailable: {0}")]
pub struct DriftError(pub String);

/// Setup and lifecycle errors surfaced to the caller.
#[derive(Error, Debug)]
pub enum RulerError {
    /// The tenant timezone does not resolve.
    #[error(transparent)]
    Timezone(#[from] TimezoneError),

    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `start` was called outside a Tokio runtime.
    #[error("ruler for tenant {0} must be started inside a Tokio runtime")]
    NoRuntime(String),

    /// `start` was called after `stop`.
    #[error("ruler for tenant {0} has been stopped")]
    Stopped(String),
}
