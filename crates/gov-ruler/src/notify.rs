//! Notification collaborator for `notify` actions.
//!
//! Dispatch is best-effort: the scheduler bounds each call with a timeout
//! and a failure never blocks the decision.

use async_trait::async_trait;
use gov_core::{ResourceRef, Triage};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::NotifyError;

/// What a notification is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContext {
    /// Tenant.
    pub tenant_id: String,
    /// Resource the decision concerns.
    pub resource: ResourceRef,
    /// Law that decided.
    pub law_id: String,
    /// Triage outcome.
    pub triage: Triage,
    /// Decision identifier.
    pub decision_id: String,
    /// Trace identifier.
    pub trace_id: String,
}

/// Delivers notifications to holders of a role.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notify `role` about `context`.
    async fn notify(&self, role: &str, context: &NotificationContext) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, role: &str, context: &NotificationContext) -> Result<(), NotifyError> {
        tracing::info!(
            role,
            tenant = %context.tenant_id,
            resource = %context.resource.id,
            law = %context.law_id,
            triage = %context.triage,
            "notification"
        );
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, NotificationContext)>>,
}

impl RecordingNotifier {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far, as `(role, context)`.
    pub fn sent(&self) -> Vec<(String, NotificationContext)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, role: &str, context: &NotificationContext) -> Result<(), NotifyError> {
        self.sent.lock().push((role.to_string(), context.clone()));
        Ok(())
    }
}
