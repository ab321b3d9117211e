//! # Evaluation Context
//!
//! An [`EvaluationContext`] is a snapshot of everything a law condition may
//! read. It is built fresh for each evaluation from the span and the tenant
//! configuration, never persisted, and never shared between evaluations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{Action, PolicyLayer};
use crate::error::TimezoneError;
use crate::span::{GovernableSpan, Resource};
use crate::temporal::validate_timezone;

/// Per-tenant configuration consumed by the engine and scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Tenant identifier.
    pub id: String,
    /// Number of approvals that constitutes a quorum.
    #[serde(default = "default_quorum")]
    pub quorum: u32,
    /// IANA zone whose midnight drives the daily run.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Settings per user id, exposed to laws as `user.settings.*`.
    #[serde(default)]
    pub user_settings: BTreeMap<String, serde_json::Map<String, serde_json::Value>>,
    /// Fixed action proposals per policy layer, composed with every decision.
    #[serde(default)]
    pub overlays: BTreeMap<PolicyLayer, Vec<Action>>,
}

fn default_quorum() -> u32 {
    1
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl TenantConfig {
    /// Create a tenant configuration with no user settings or overlays.
    pub fn new(id: impl Into<String>, timezone: impl Into<String>, quorum: u32) -> Self {
        Self {
            id: id.into(),
            quorum,
            timezone: timezone.into(),
            user_settings: BTreeMap::new(),
            overlays: BTreeMap::new(),
        }
    }

    /// Builder: add settings for a user.
    pub fn with_user_settings(
        mut self,
        user_id: impl Into<String>,
        settings: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.user_settings.insert(user_id.into(), settings);
        self
    }

    /// Builder: add a fixed proposal for `layer`.
    pub fn with_overlay(mut self, layer: PolicyLayer, actions: Vec<Action>) -> Self {
        self.overlays.insert(layer, actions);
        self
    }

    /// Check the configured timezone resolves.
    pub fn validate(&self) -> Result<(), TimezoneError> {
        validate_timezone(&self.timezone)
    }
}

/// Tenant fields visible to laws.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSnapshot {
    /// Tenant identifier.
    pub id: String,
    /// Approval quorum.
    pub quorum: u32,
    /// IANA zone.
    pub timezone: String,
}

/// User fields visible to laws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    /// User identifier.
    pub id: String,
    /// Settings map.
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// Identity of the span under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRef {
    /// Span identifier.
    pub id: String,
    /// Trace identifier.
    pub trace_id: String,
}

/// Snapshot of everything a law condition may read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// Evaluation instant.
    pub now: DateTime<Utc>,
    /// Tenant snapshot.
    pub tenant: TenantSnapshot,
    /// User snapshot, when the tenant has settings for the span's actor.
    pub user: Option<UserSnapshot>,
    /// Resource under evaluation.
    pub resource: Resource,
    /// Span under evaluation.
    pub span: SpanRef,
}

/// Build a context for evaluating `span` at `now` under `tenant`.
///
/// Pure: neither input is modified and the result owns copies of what it
/// needs.
pub fn build_evaluation_context(
    span: &GovernableSpan,
    tenant: &TenantConfig,
    now: DateTime<Utc>,
) -> EvaluationContext {
    let user = tenant
        .user_settings
        .get(&span.who.id)
        .map(|settings| UserSnapshot {
            id: span.who.id.clone(),
            settings: settings.clone(),
        });

    EvaluationContext {
        now,
        tenant: TenantSnapshot {
            id: tenant.id.clone(),
            quorum: tenant.quorum,
            timezone: tenant.timezone.clone(),
        },
        user,
        resource: span.resource.clone(),
        span: SpanRef {
            id: span.id.clone(),
            trace_id: span.trace_id.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Who;

    #[test]
    fn context_snapshots_without_mutating_inputs() {
        let span = GovernableSpan::builder("tenant-a", "delivery")
            .resource(Resource::new("task", "t-1").with_approval("u-2"))
            .who(Who::new("u-1", "editor"))
            .build();
        let mut settings = serde_json::Map::new();
        settings.insert("strict".into(), serde_json::json!(true));
        let tenant = TenantConfig::new("tenant-a", "Europe/Lisbon", 2).with_user_settings("u-1", settings);

        let before = (span.clone(), tenant.clone());
        let ctx = build_evaluation_context(&span, &tenant, Utc::now());
        assert_eq!(before, (span.clone(), tenant));

        assert_eq!(ctx.tenant.quorum, 2);
        assert_eq!(ctx.resource.approvals, vec!["u-2"]);
        assert_eq!(ctx.span.id, span.id);
        assert_eq!(ctx.user.unwrap().settings["strict"], true);
    }

    #[test]
    fn user_snapshot_absent_without_settings() {
        let span = GovernableSpan::builder("tenant-a", "delivery")
            .who(Who::new("u-9", "viewer"))
            .build();
        let tenant = TenantConfig::new("tenant-a", "UTC", 1);
        assert!(build_evaluation_context(&span, &tenant, Utc::now()).user.is_none());
    }

    #[test]
    fn tenant_config_defaults_from_json() {
        let tenant: TenantConfig = serde_json::from_str(r#"{"id":"t"}"#).unwrap();
        assert_eq!(tenant.quorum, 1);
        assert_eq!(tenant.timezone, "UTC");
        assert!(tenant.validate().is_ok());

        let overlays: TenantConfig = serde_json::from_str(
            r#"{"id":"t","overlays":{"constitution":[{"type":"hold","hours":48}]}}"#,
        )
        .unwrap();
        assert_eq!(
            overlays.overlays[&PolicyLayer::Constitution],
            vec![Action::Hold { hours: 48 }]
        );
    }
}
