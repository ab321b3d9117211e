//! # Governable Spans
//!
//! A [`GovernableSpan`] is the unit of input: one governed resource, who
//! touched it, and when. Spans are created by upstream producers and read
//! by the engine; nothing here mutates them after construction.
//!
//! Every string field deserializes with an empty default. A producer that
//! omits `who.role` still yields a span, and [`crate::validate_span`] then
//! reports the omission alongside every other problem with the record.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::token;
use crate::validation::validate_span;

/// Resource type that requires a `deadline_at`.
pub const DELIVERABLE: &str = "deliverable";

/// A governed input span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernableSpan {
    /// Span identifier.
    #[serde(default = "token::span_id")]
    pub id: String,
    /// Owning tenant.
    #[serde(default)]
    pub tenant_id: String,
    /// Producing application.
    #[serde(default)]
    pub app: String,
    /// The governed resource.
    #[serde(default)]
    pub resource: Resource,
    /// Actor responsible for the span.
    #[serde(default)]
    pub who: Who,
    /// When and where the span was produced.
    #[serde(default)]
    pub clock: SpanClock,
    /// Trace identifier.
    #[serde(default)]
    pub trace_id: String,
    /// Idempotency key of the producing operation.
    #[serde(default)]
    pub idempotency_key: String,
    /// Optional explicit law binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub law: Option<LawBinding>,
}

impl GovernableSpan {
    /// Start building a span for `tenant_id` produced by `app`.
    pub fn builder(tenant_id: impl Into<String>, app: impl Into<String>) -> SpanBuilder {
        SpanBuilder::new(tenant_id, app)
    }
}

/// The governed resource carried by a span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type (e.g. `deliverable`).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Resource identifier.
    #[serde(default)]
    pub id: String,
    /// RFC 3339 deadline. Required for deliverables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_at: Option<String>,
    /// Whether the resource has been accepted. `None` means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    /// Identifiers of approvers.
    #[serde(default)]
    pub approvals: Vec<String>,
    /// Evidence status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

impl Resource {
    /// Create a resource of `kind` with identifier `id`.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    /// Builder: set the deadline.
    pub fn with_deadline(mut self, deadline_at: impl Into<String>) -> Self {
        self.deadline_at = Some(deadline_at.into());
        self
    }

    /// Builder: set the accepted flag.
    pub fn with_accepted(mut self, accepted: bool) -> Self {
        self.accepted = Some(accepted);
        self
    }

    /// Builder: add an approval.
    pub fn with_approval(mut self, approver: impl Into<String>) -> Self {
        self.approvals.push(approver.into());
        self
    }

    /// Builder: set whether evidence is missing.
    pub fn with_evidence_missing(mut self, missing: bool) -> Self {
        let evidence = self.evidence.get_or_insert_with(Evidence::default);
        evidence.missing = Some(missing);
        self
    }
}

/// Evidence attached to a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Whether required evidence is missing. `None` means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<bool>,
    /// References to evidence artifacts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<String>,
}

/// The actor behind a span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Who {
    /// Actor identifier.
    #[serde(default)]
    pub id: String,
    /// Actor role.
    #[serde(default)]
    pub role: String,
}

impl Who {
    /// Create an actor.
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }
}

/// Production time of a span: an RFC 3339 instant and an IANA zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanClock {
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub ts: String,
    /// IANA timezone identifier.
    #[serde(default)]
    pub tz: String,
}

impl SpanClock {
    /// The current instant in UTC.
    pub fn now_utc() -> Self {
        Self {
            ts: Utc::now().to_rfc3339(),
            tz: "UTC".to_string(),
        }
    }
}

/// Explicit binding of a span to laws.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawBinding {
    /// Scope selector the producer had in mind.
    #[serde(default)]
    pub scope: String,
    /// Law identifiers (`name:version`) to evaluate, in order.
    #[serde(default)]
    pub targets: Vec<String>,
}

/// Builder for [`GovernableSpan`] that auto-fills identifiers and clock.
#[derive(Debug, Clone)]
pub struct SpanBuilder {
    span: GovernableSpan,
}

impl SpanBuilder {
    /// Start a span for `tenant_id` produced by `app`.
    pub fn new(tenant_id: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            span: GovernableSpan {
                id: token::span_id(),
                tenant_id: tenant_id.into(),
                app: app.into(),
                resource: Resource::default(),
                who: Who::default(),
                clock: SpanClock::now_utc(),
                trace_id: token::trace_id(),
                idempotency_key: token::idempotency_key(),
                law: None,
            },
        }
    }

    /// Set the governed resource.
    pub fn resource(mut self, resource: Resource) -> Self {
        self.span.resource = resource;
        self
    }

    /// Set the actor.
    pub fn who(mut self, who: Who) -> Self {
        self.span.who = who;
        self
    }

    /// Override the clock.
    pub fn clock(mut self, ts: impl Into<String>, tz: impl Into<String>) -> Self {
        self.span.clock = SpanClock {
            ts: ts.into(),
            tz: tz.into(),
        };
        self
    }

    /// Override the trace identifier.
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.span.trace_id = trace_id.into();
        self
    }

    /// Override the idempotency key.
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.span.idempotency_key = key.into();
        self
    }

    /// Bind the span to explicit law targets.
    pub fn law(mut self, scope: impl Into<String>, targets: Vec<String>) -> Self {
        self.span.law = Some(LawBinding {
            scope: scope.into(),
            targets,
        });
        self
    }

    /// Finish without validation.
    pub fn build(self) -> GovernableSpan {
        self.span
    }

    /// Finish, returning every violated invariant if the span is invalid.
    pub fn build_validated(self) -> Result<GovernableSpan, ValidationError> {
        validate_span(&self.span)?;
        Ok(self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_auto_fills_tokens_and_clock() {
        let span = GovernableSpan::builder("tenant-a", "delivery")
            .resource(Resource::new("task", "t-1"))
            .who(Who::new("u-1", "editor"))
            .build();
        assert!(span.id.starts_with("span_"));
        assert!(span.trace_id.starts_with("trc_"));
        assert!(span.idempotency_key.starts_with("idem_"));
        assert_eq!(span.clock.tz, "UTC");
        assert!(crate::parse_timestamp(&span.clock.ts).is_some());
    }

    #[test]
    fn build_validated_rejects_deliverable_without_deadline() {
        let err = GovernableSpan::builder("tenant-a", "delivery")
            .resource(Resource::new(DELIVERABLE, "d-1"))
            .who(Who::new("u-1", "editor"))
            .build_validated()
            .unwrap_err();
        assert!(err.names("resource.deadline_at"));
    }

    #[test]
    fn missing_fields_deserialize_to_empty() {
        let span: GovernableSpan =
            serde_json::from_str(r#"{"tenant_id":"t","resource":{"type":"task","id":"1"}}"#)
                .unwrap();
        assert_eq!(span.who.role, "");
        assert_eq!(span.clock.tz, "");
        assert!(!span.id.is_empty());
    }

    #[test]
    fn resource_uses_type_on_the_wire() {
        let resource = Resource::new(DELIVERABLE, "d-9").with_evidence_missing(true);
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["type"], "deliverable");
        assert_eq!(json["evidence"]["missing"], true);
    }
}
