//! # Error Hierarchy
//!
//! Structured error types for the governance engine, built with `thiserror`.
//!
//! Two propagation regimes share these types:
//!
//! - **Configuration time** (law text, timezones, tenant config): errors are
//!   surfaced to the caller immediately.
//! - **Run time** (per-resource validation, expression faults, storage
//!   hiccups): errors are downgraded in place to a `doubt` decision or a
//!   [`GovernanceError`] incident that is itself written to the ledger.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the governance engine.
#[derive(Error, Debug)]
pub enum GovError {
    /// One or more span invariants were violated.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A timezone identifier could not be resolved.
    #[error("timezone error: {0}")]
    Timezone(#[from] TimezoneError),

    /// A runtime governance incident.
    #[error("governance error: {0}")]
    Governance(#[from] GovernanceError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single violated span invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted path of the offending field (e.g. `who.role`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl Violation {
    /// Create a violation for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Aggregate validation failure.
///
/// Lists every violated invariant of a span, never only the first one, so
/// that an upstream producer can fix a bad record in a single round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} invariant(s) violated: {}", .violations.len(), join_violations(.violations))]
pub struct ValidationError {
    /// All violations, in field declaration order.
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Whether a violation was recorded for `field`.
    pub fn names(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// Field paths of all violations.
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A timezone identifier that does not resolve to an IANA zone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimezoneError {
    /// The identifier is not in the IANA database.
    #[error("unknown IANA timezone: \"{0}\"")]
    Unknown(String),

    /// No local instant on or after midnight exists for the date.
    #[error("no resolvable local midnight in {zone} on {date}")]
    Unresolvable {
        /// The zone identifier.
        zone: String,
        /// The local calendar date that could not be resolved.
        date: String,
    },
}

/// Classification of a runtime governance incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    /// A run failed at the top level (fetch failure, panic).
    SchedulerFailure,
    /// Some of a decision's actions were emitted before storage failed.
    PartialExecution,
    /// Clock drift exceeded the configured threshold.
    ClockDrift,
    /// The timezone database could not produce the next midnight.
    TzdataCorruption,
    /// A resource failed validation and was quarantined.
    PoisonInput,
    /// A law condition failed to parse or evaluate.
    ExpressionError,
}

impl IncidentKind {
    /// Return the string value used in ledger events and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchedulerFailure => "scheduler_failure",
            Self::PartialExecution => "partial_execution",
            Self::ClockDrift => "clock_drift",
            Self::TzdataCorruption => "tzdata_corruption",
            Self::PoisonInput => "poison_input",
            Self::ExpressionError => "expression_error",
        }
    }
}

impl std::fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A runtime incident raised while governing resources.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct GovernanceError {
    /// Incident classification.
    pub kind: IncidentKind,
    /// Human-readable detail for operators.
    pub detail: String,
}

impl GovernanceError {
    /// Create an incident of `kind`.
    pub fn new(kind: IncidentKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_violation() {
        let err = ValidationError {
            violations: vec![
                Violation::new("who.role", "must be present"),
                Violation::new("clock.tz", "must be a valid IANA timezone"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 invariant(s) violated"));
        assert!(msg.contains("who.role"));
        assert!(msg.contains("clock.tz"));
        assert!(err.names("who.role"));
        assert!(!err.names("app"));
    }

    #[test]
    fn incident_kind_round_trips_through_serde() {
        let json = serde_json::to_string(&IncidentKind::PoisonInput).unwrap();
        assert_eq!(json, "\"poison_input\"");
        let back: IncidentKind = serde_json::from_str("\"clock_drift\"").unwrap();
        assert_eq!(back, IncidentKind::ClockDrift);
    }

    #[test]
    fn governance_error_display() {
        let err = GovernanceError::new(IncidentKind::ClockDrift, "drift 900ms > 500ms");
        assert_eq!(err.to_string(), "clock_drift: drift 900ms > 500ms");
    }

    #[test]
    fn gov_error_wraps_timezone() {
        let err: GovError = TimezoneError::Unknown("Mars/Olympus".into()).into();
        assert!(err.to_string().contains("Mars/Olympus"));
    }
}
