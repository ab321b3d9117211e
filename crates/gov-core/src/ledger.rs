//! # Ledger Events
//!
//! The append-only audit record. One event is written per executed action
//! and one per incident; events are never modified or deleted.
//!
//! Each event is individually digestable over its canonical JSON form, so a
//! ledger backend can chain or anchor them for tamper evidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::IncidentKind;
use crate::span::Resource;
use crate::token;

/// Reference to a governed resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource identifier.
    pub id: String,
}

impl From<&Resource> for ResourceRef {
    fn from(resource: &Resource) -> Self {
        Self {
            kind: resource.kind.clone(),
            id: resource.id.clone(),
        }
    }
}

/// Links from a ledger event to the decision and trace it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLinks {
    /// Decision that produced the event; `None` for incidents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_span: Option<String>,
    /// Trace identifier.
    pub trace_id: String,
}

/// A single audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Event identifier.
    pub event_id: String,
    /// Actor that performed the event.
    pub who: String,
    /// What happened: an obligation string or `incident:<kind>`.
    pub what: String,
    /// Why it happened.
    pub why: String,
    /// Resource affected, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
    /// Decision and trace links.
    pub links: LedgerLinks,
    /// When the event was recorded.
    pub ts: DateTime<Utc>,
    /// Structured metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl LedgerEvent {
    /// Create an event stamped at `ts`.
    pub fn new(
        who: impl Into<String>,
        what: impl Into<String>,
        why: impl Into<String>,
        resource: Option<ResourceRef>,
        links: LedgerLinks,
        ts: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: token::event_id(),
            who: who.into(),
            what: what.into(),
            why: why.into(),
            resource,
            links,
            ts,
            metadata: serde_json::Value::Null,
        }
    }

    /// Create the event recording an incident.
    pub fn incident(
        who: impl Into<String>,
        kind: IncidentKind,
        detail: impl Into<String>,
        resource: Option<ResourceRef>,
        trace_id: impl Into<String>,
        ts: DateTime<Utc>,
    ) -> Self {
        Self::new(
            who,
            format!("incident:{kind}"),
            detail,
            resource,
            LedgerLinks {
                decision_span: None,
                trace_id: trace_id.into(),
            },
            ts,
        )
    }

    /// Builder: attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether this event records an incident.
    pub fn is_incident(&self) -> bool {
        self.what.starts_with("incident:")
    }

    /// Content digest over canonical JSON.
    ///
    /// Returns `None` if the metadata cannot be serialized, which does not
    /// happen for values built from `serde_json::json!`.
    pub fn digest(&self) -> Option<ContentDigest> {
        match ContentDigest::of_canonical(self) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(event_id = %self.event_id, error = %e, "ledger event canonicalization failed, digest unavailable");
                None
            }
        }
    }
}
