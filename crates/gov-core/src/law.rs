//! # Law Definitions
//!
//! The compiled form of a law written in the rule language. A
//! [`LawDefinition`] is produced by the parser in `gov-law`, owned by
//! configuration, and never modified after parsing.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::decision::Triage;

/// Scope selector that matches every resource type.
pub const WILDCARD_SCOPE: &str = "*";

/// A compiled law.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawDefinition {
    /// `name:version`.
    pub id: String,
    /// Resource type selector, or `*`.
    pub scope: String,
    /// When the law is re-evaluated.
    pub clock: ClockSpec,
    /// Branch for "satisfied".
    pub ok: TriageBlock,
    /// Branch for "ambiguous".
    pub doubt: TriageBlock,
    /// Branch for "fails".
    pub not: TriageBlock,
    /// Content hash of the source text (`sha256:<hex>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl LawDefinition {
    /// The law name (the part of `id` before the version).
    pub fn name(&self) -> &str {
        self.id.split(':').next().unwrap_or(&self.id)
    }

    /// The law version (the part of `id` after the name).
    pub fn version(&self) -> &str {
        self.id.split_once(':').map(|(_, v)| v).unwrap_or("")
    }

    /// The block for `triage`.
    pub fn block(&self, triage: Triage) -> &TriageBlock {
        match triage {
            Triage::Ok => &self.ok,
            Triage::Doubt => &self.doubt,
            Triage::Not => &self.not,
        }
    }

    /// Whether this law governs resources of `resource_type`.
    pub fn applies_to(&self, resource_type: &str) -> bool {
        self.scope == WILDCARD_SCOPE || self.scope == resource_type
    }
}

/// The re-evaluation clock of a law: local midnight in an IANA zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSpec {
    /// IANA zone whose midnight triggers evaluation.
    pub timezone: String,
}

/// One triage branch: a condition and the actions it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageBlock {
    /// Boolean expression source.
    pub condition: String,
    /// Actions, in declaration order.
    pub actions: Vec<Action>,
}
