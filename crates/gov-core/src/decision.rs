//! # Law Decisions
//!
//! A [`LawDecisionSpan`] is the output of governing one resource under one
//! law in one run. It references the span that caused it and carries the
//! ordered obligations that were (or will be) executed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{obligations, Action};
use crate::span::SpanClock;
use crate::token;

/// Three-way classification of a resource against a law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Triage {
    /// The resource satisfies the law.
    Ok,
    /// The law cannot confidently decide.
    Doubt,
    /// The resource fails the law.
    Not,
}

impl Triage {
    /// Evaluation order: `ok`, then `doubt`, then `not`.
    pub const ORDER: [Triage; 3] = [Self::Ok, Self::Doubt, Self::Not];

    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Doubt => "doubt",
            Self::Not => "not",
        }
    }
}

impl std::fmt::Display for Triage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision emitted for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawDecisionSpan {
    /// Decision identifier.
    pub decision_id: String,
    /// Identifier of the span that caused this decision.
    pub caused_by: String,
    /// Law that produced the decision.
    pub law_id: String,
    /// Triage outcome.
    pub triage: Triage,
    /// Canonical obligation strings, in execution order.
    pub obligations: Vec<String>,
    /// Resource identifiers the decision applies to.
    pub targets: Vec<String>,
    /// Hash of the law text the decision was made under.
    pub law_text_hash: String,
    /// Trace identifier inherited from the causing span.
    pub trace_id: String,
    /// Deduplication key for executing this decision.
    pub idempotency_key: String,
    /// When the decision was made.
    pub clock: SpanClock,
}

impl LawDecisionSpan {
    /// Build a decision with a fresh identifier, stamped at `at` in `tz`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        caused_by: impl Into<String>,
        law_id: impl Into<String>,
        triage: Triage,
        actions: &[Action],
        targets: Vec<String>,
        law_text_hash: impl Into<String>,
        trace_id: impl Into<String>,
        idempotency_key: impl Into<String>,
        at: DateTime<Utc>,
        tz: impl Into<String>,
    ) -> Self {
        Self {
            decision_id: token::decision_id(),
            caused_by: caused_by.into(),
            law_id: law_id.into(),
            triage,
            obligations: obligations(actions),
            targets,
            law_text_hash: law_text_hash.into(),
            trace_id: trace_id.into(),
            idempotency_key: idempotency_key.into(),
            clock: SpanClock {
                ts: at.to_rfc3339(),
                tz: tz.into(),
            },
        }
    }
}
