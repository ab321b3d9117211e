//! # One Governance Run
//!
//! A run walks the tenant's active resources once:
//!
//! 1. **Drift check.** Drift beyond the threshold, or a drift source that
//!    cannot answer, records `clock_drift` and aborts before any resource
//!    is touched.
//! 2. **Fetch.** A fetch failure records `scheduler_failure` and ends the run.
//! 3. **Per resource**, independently:
//!    - validate; failures (and spans of another tenant) are quarantined
//!      as `poison_input`
//!    - select candidate laws and evaluate the first; its outcome stands,
//!      fail-closed `doubt` included, and later candidates are not evaluated
//!    - compose the outcome with the tenant's layer overlays
//!    - claim the decision key; an already-claimed key is a duplicate and
//!      nothing is emitted
//!    - execute actions in order, one ledger event each, then store the
//!      decision
//!
//! No per-resource failure escapes the resource. Every incident lands in
//! the ledger and in `governance_incidents_total`.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use gov_core::temporal::local_date;
use gov_core::{
    build_evaluation_context, sha256_hex, token, validate_span, Action, EvaluationContext,
    GovernableSpan, GovernanceError, IncidentKind, LawDecisionSpan, LedgerEvent, LedgerLinks,
    ResourceRef, Triage,
};
use gov_law::{compose_actions, evaluate_law, layer_proposals, LawBook, RegisteredLaw, TriageOutcome};
use gov_metrics::{names, MetricsCollector};
use serde::Serialize;

use crate::clock::{Clock, DriftSource};
use crate::config::RulerConfig;
use crate::notify::{NotificationContext, Notifier};
use crate::repository::GovernanceRepository;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every fetched resource was processed.
    Completed,
    /// Clock drift aborted the run before any resource was touched.
    AbortedClockDrift,
    /// The run failed at the top level.
    Failed,
}

impl RunOutcome {
    /// Metric label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AbortedClockDrift => "aborted_clock_drift",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision executed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionSummary {
    /// Decision identifier.
    pub decision_id: String,
    /// Resource governed.
    pub resource_id: String,
    /// Law that decided.
    pub law_id: String,
    /// Outcome.
    pub triage: Triage,
    /// Whether a branch matched, as opposed to the fail-closed default.
    pub matched: bool,
    /// Executed obligations, in order.
    pub obligations: Vec<String>,
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: String,
    /// Tenant.
    pub tenant_id: String,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
    /// Resources fetched.
    pub fetched: usize,
    /// Resources evaluated against at least one law.
    pub evaluated: usize,
    /// Decisions executed.
    pub decided: usize,
    /// Decisions skipped because their key was already claimed.
    pub duplicates: usize,
    /// Resources quarantined as poison input.
    pub quarantined: usize,
    /// Resources no law applies to.
    pub unmatched: usize,
    /// Ledger events written for actions.
    pub actions_executed: usize,
    /// Incidents recorded.
    pub incidents: Vec<GovernanceError>,
    /// Executed decisions.
    pub decisions: Vec<DecisionSummary>,
}

impl RunReport {
    fn new(run_id: String, tenant_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            tenant_id,
            outcome: RunOutcome::Completed,
            started_at,
            finished_at: started_at,
            fetched: 0,
            evaluated: 0,
            decided: 0,
            duplicates: 0,
            quarantined: 0,
            unmatched: 0,
            actions_executed: 0,
            incidents: Vec::new(),
            decisions: Vec::new(),
        }
    }

    /// Report for an incident raised outside any run.
    pub(crate) fn placeholder(executor: &RunExecutor, at: DateTime<Utc>) -> Self {
        Self::new(token::run_id(), executor.tenant_id().to_string(), at)
    }

    /// Whether an incident of `kind` was recorded.
    pub fn has_incident(&self, kind: IncidentKind) -> bool {
        self.incidents.iter().any(|i| i.kind == kind)
    }
}

/// Deterministic key for executing a decision.
///
/// Stable for the same span, law text and local run date, so a second run
/// on the same day is deduplicated while the next day re-decides.
pub fn decision_key(
    span_idempotency_key: &str,
    law_id: &str,
    law_text_hash: &str,
    run_date: NaiveDate,
) -> String {
    let material = format!("{span_idempotency_key}|{law_id}|{law_text_hash}|{run_date}");
    format!("dk_{}", sha256_hex(material.as_bytes()))
}

/// Executes runs for one tenant.
pub struct RunExecutor {
    pub(crate) config: RulerConfig,
    pub(crate) timezone: Tz,
    pub(crate) laws: Arc<LawBook>,
    pub(crate) repository: Arc<dyn GovernanceRepository>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) drift: Arc<dyn DriftSource>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metrics: Arc<MetricsCollector>,
}

impl std::fmt::Debug for RunExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunExecutor")
            .field("tenant", &self.config.tenant.id)
            .field("timezone", &self.timezone)
            .field("laws", &self.laws.len())
            .finish_non_exhaustive()
    }
}

struct Selected<'a> {
    law: &'a RegisteredLaw,
    outcome: TriageOutcome,
}

impl RunExecutor {
    fn tenant_id(&self) -> &str {
        &self.config.tenant.id
    }

    /// Execute one run inside its own task so that a panic is contained
    /// and recorded as `scheduler_failure`.
    pub async fn run_contained(self: Arc<Self>) -> RunReport {
        let started_at = self.clock.now();
        let run_id = token::run_id();
        let task = {
            let executor = Arc::clone(&self);
            let run_id = run_id.clone();
            tokio::spawn(async move { executor.run_once(run_id).await })
        };
        match task.await {
            Ok(report) => report,
            Err(join_error) => {
                tracing::error!(tenant = %self.tenant_id(), run_id = %run_id, error = %join_error, "governance run aborted");
                let mut report = RunReport::new(run_id.clone(), self.tenant_id().to_string(), started_at);
                self.record_incident(
                    &mut report,
                    IncidentKind::SchedulerFailure,
                    format!("run aborted: {join_error}"),
                    None,
                    &run_id,
                )
                .await;
                self.finish(report, RunOutcome::Failed, None)
            }
        }
    }

    /// Execute one run on the current task.
    pub async fn run_once(&self, run_id: String) -> RunReport {
        let timer = tokio::time::Instant::now();
        let mut report = RunReport::new(run_id.clone(), self.tenant_id().to_string(), self.clock.now());
        tracing::info!(tenant = %self.tenant_id(), run_id = %run_id, "governance run started");

        if let Err(detail) = self.check_drift().await {
            self.record_incident(&mut report, IncidentKind::ClockDrift, detail, None, &run_id)
                .await;
            return self.finish(report, RunOutcome::AbortedClockDrift, Some(timer));
        }

        let spans = match self.repository.fetch_active(self.tenant_id()).await {
            Ok(spans) => spans,
            Err(e) => {
                tracing::error!(tenant = %self.tenant_id(), error = %e, "fetching active resources failed");
                self.record_incident(
                    &mut report,
                    IncidentKind::SchedulerFailure,
                    format!("fetch failed: {e}"),
                    None,
                    &run_id,
                )
                .await;
                return self.finish(report, RunOutcome::Failed, Some(timer));
            }
        };
        report.fetched = spans.len();
        self.metrics.set_gauge(
            names::LAST_RUN_RESOURCES,
            &[("tenant", self.tenant_id())],
            spans.len() as f64,
        );

        let now = self.clock.now();
        let run_date = local_date(self.timezone, now);
        for span in &spans {
            self.govern(span, now, run_date, &run_id, &mut report).await;
        }

        self.finish(report, RunOutcome::Completed, Some(timer))
    }

    async fn check_drift(&self) -> Result<(), String> {
        let threshold_ms = self.config.drift_threshold.as_millis();
        match self.drift.drift_ms().await {
            Ok(drift_ms) => {
                self.metrics.set_gauge(
                    names::CLOCK_DRIFT_MS,
                    &[("tenant", self.tenant_id())],
                    drift_ms as f64,
                );
                if u128::from(drift_ms.unsigned_abs()) > threshold_ms {
                    Err(format!("clock drift {drift_ms}ms exceeds {threshold_ms}ms"))
                } else {
                    Ok(())
                }
            }
            Err(e) => Err(format!("{e}; treating as drift")),
        }
    }

    async fn govern(
        &self,
        span: &GovernableSpan,
        now: DateTime<Utc>,
        run_date: NaiveDate,
        run_id: &str,
        report: &mut RunReport,
    ) {
        let resource = ResourceRef::from(&span.resource);

        if let Err(violations) = validate_span(span) {
            report.quarantined += 1;
            self.record_incident(
                report,
                IncidentKind::PoisonInput,
                violations.to_string(),
                Some(resource),
                &span.trace_id,
            )
            .await;
            return;
        }
        if span.tenant_id != self.tenant_id() {
            report.quarantined += 1;
            self.record_incident(
                report,
                IncidentKind::PoisonInput,
                format!("span belongs to tenant {}", span.tenant_id),
                Some(resource),
                &span.trace_id,
            )
            .await;
            return;
        }

        let candidates = self.laws.candidates(span);
        if candidates.is_empty() {
            report.unmatched += 1;
            tracing::debug!(resource = %resource.id, kind = %resource.kind, "no law applies");
            return;
        }

        let ctx = build_evaluation_context(span, &self.config.tenant, now);
        let Some(Selected { law, outcome }) = self.select(&candidates, &ctx, report).await else {
            return;
        };
        report.evaluated += 1;

        let actions = compose_actions(&layer_proposals(
            law.layer,
            &outcome.actions,
            &self.config.tenant.overlays,
        ));
        let law_id = &law.definition.id;
        let law_hash = law.definition.hash.clone().unwrap_or_default();
        let key = decision_key(&span.idempotency_key, law_id, &law_hash, run_date);

        match self.repository.check_and_set_idempotent(self.tenant_id(), &key).await {
            Ok(true) => {}
            Ok(false) => {
                report.duplicates += 1;
                self.metrics
                    .increment_counter(names::DUPLICATES_TOTAL, &[("tenant", self.tenant_id())]);
                tracing::debug!(resource = %resource.id, law = %law_id, "decision already executed, skipping");
                return;
            }
            Err(e) => {
                self.record_incident(
                    report,
                    IncidentKind::SchedulerFailure,
                    format!("idempotency check failed: {e}"),
                    Some(resource),
                    &span.trace_id,
                )
                .await;
                return;
            }
        }

        let decision = LawDecisionSpan::new(
            span.id.clone(),
            law_id.clone(),
            outcome.triage,
            &actions,
            vec![span.resource.id.clone()],
            law_hash,
            span.trace_id.clone(),
            key,
            now,
            self.config.tenant.timezone.clone(),
        );
        tracing::debug!(
            resource = %resource.id,
            law = %law_id,
            triage = %outcome.triage,
            matched = outcome.matched,
            obligations = ?decision.obligations,
            "decision"
        );

        if let Err(detail) = self.execute(&decision, &actions, &resource, now, run_id, report).await {
            self.record_incident(
                report,
                IncidentKind::PartialExecution,
                detail,
                Some(resource),
                &span.trace_id,
            )
            .await;
            return;
        }

        report.decided += 1;
        self.metrics.increment_counter(
            names::DECISIONS_TOTAL,
            &[("tenant", self.tenant_id()), ("triage", outcome.triage.as_str())],
        );
        report.decisions.push(DecisionSummary {
            decision_id: decision.decision_id,
            resource_id: resource.id,
            law_id: law_id.clone(),
            triage: outcome.triage,
            matched: outcome.matched,
            obligations: decision.obligations,
        });
    }

    /// Evaluate the first candidate. `evaluate_law` always reaches a
    /// disposition, fail-closed included, so later candidates are never
    /// evaluated.
    async fn select<'a>(
        &self,
        candidates: &[&'a RegisteredLaw],
        ctx: &EvaluationContext,
        report: &mut RunReport,
    ) -> Option<Selected<'a>> {
        let law = *candidates.first()?;
        let outcome = evaluate_law(&law.definition, ctx);
        for fault in &outcome.faults {
            self.record_incident(
                report,
                IncidentKind::ExpressionError,
                format!(
                    "{} `{}` branch: {} (condition: {})",
                    law.definition.id, fault.branch, fault.message, fault.condition
                ),
                Some(ResourceRef::from(&ctx.resource)),
                &ctx.span.trace_id,
            )
            .await;
        }
        if candidates.len() > 1 {
            tracing::debug!(
                law = %law.definition.id,
                skipped = candidates.len() - 1,
                "first candidate decided, remaining laws not evaluated"
            );
        }
        Some(Selected { law, outcome })
    }

    async fn execute(
        &self,
        decision: &LawDecisionSpan,
        actions: &[Action],
        resource: &ResourceRef,
        now: DateTime<Utc>,
        run_id: &str,
        report: &mut RunReport,
    ) -> Result<(), String> {
        let why = format!("{} triage {}", decision.law_id, decision.triage);
        let links = LedgerLinks {
            decision_span: Some(decision.decision_id.clone()),
            trace_id: decision.trace_id.clone(),
        };

        for (index, action) in actions.iter().enumerate() {
            let mut metadata = serde_json::json!({
                "run_id": run_id,
                "law_id": decision.law_id,
                "triage": decision.triage,
                "decision_key": decision.idempotency_key,
                "action": action,
            });
            if let Action::Notify { role } = action {
                let delivered = self.dispatch_notification(role, decision, resource).await;
                metadata["delivered"] = serde_json::Value::Bool(delivered);
            }

            let event = LedgerEvent::new(
                self.config.actor.clone(),
                action.to_obligation(),
                why.clone(),
                Some(resource.clone()),
                links.clone(),
                now,
            )
            .with_metadata(metadata);
            if let Err(e) = self.repository.append_event(self.tenant_id(), &event).await {
                return Err(format!(
                    "decision {} recorded {index} of {} actions before storage failed: {e}",
                    decision.decision_id,
                    actions.len()
                ));
            }
            report.actions_executed += 1;
            self.metrics.increment_counter(
                names::ACTIONS_TOTAL,
                &[("tenant", self.tenant_id()), ("action", action.kind())],
            );
        }

        self.repository
            .store_decision(self.tenant_id(), decision)
            .await
            .map_err(|e| {
                format!(
                    "decision {} executed but could not be stored: {e}",
                    decision.decision_id
                )
            })
    }

    async fn dispatch_notification(
        &self,
        role: &str,
        decision: &LawDecisionSpan,
        resource: &ResourceRef,
    ) -> bool {
        let context = NotificationContext {
            tenant_id: self.tenant_id().to_string(),
            resource: resource.clone(),
            law_id: decision.law_id.clone(),
            triage: decision.triage,
            decision_id: decision.decision_id.clone(),
            trace_id: decision.trace_id.clone(),
        };
        match tokio::time::timeout(self.config.notify_timeout, self.notifier.notify(role, &context)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(role, resource = %resource.id, error = %e, "notification failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    role,
                    resource = %resource.id,
                    timeout_ms = self.config.notify_timeout.as_millis() as u64,
                    "notification timed out"
                );
                false
            }
        }
    }

    /// Record an incident in the ledger, the metrics and `report`.
    pub(crate) async fn record_incident(
        &self,
        report: &mut RunReport,
        kind: IncidentKind,
        detail: String,
        resource: Option<ResourceRef>,
        trace_id: &str,
    ) {
        tracing::warn!(
            tenant = %self.tenant_id(),
            incident = %kind,
            resource = resource.as_ref().map(|r| r.id.as_str()).unwrap_or(""),
            detail = %detail,
            "governance incident"
        );
        let event = LedgerEvent::incident(
            self.config.actor.clone(),
            kind,
            detail.clone(),
            resource,
            trace_id,
            self.clock.now(),
        )
        .with_metadata(serde_json::json!({ "run_id": report.run_id }));
        if let Err(e) = self.repository.append_event(self.tenant_id(), &event).await {
            tracing::error!(incident = %kind, error = %e, "incident could not be written to the ledger");
        }
        self.metrics.increment_counter(
            names::INCIDENTS_TOTAL,
            &[("tenant", self.tenant_id()), ("type", kind.as_str())],
        );
        report.incidents.push(GovernanceError::new(kind, detail));
    }

    fn finish(
        &self,
        mut report: RunReport,
        outcome: RunOutcome,
        timer: Option<tokio::time::Instant>,
    ) -> RunReport {
        report.outcome = outcome;
        report.finished_at = self.clock.now();
        self.metrics.increment_counter(
            names::RUNS_TOTAL,
            &[("tenant", self.tenant_id()), ("outcome", outcome.as_str())],
        );
        if let Some(timer) = timer {
            self.metrics.record_histogram(
                names::RUN_DURATION_MS,
                &[("tenant", self.tenant_id())],
                timer.elapsed().as_secs_f64() * 1000.0,
            );
        }
        tracing::info!(
            tenant = %report.tenant_id,
            run_id = %report.run_id,
            outcome = %outcome,
            fetched = report.fetched,
            decided = report.decided,
            duplicates = report.duplicates,
            quarantined = report.quarantined,
            incidents = report.incidents.len(),
            "governance run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_key_changes_with_each_component() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let base = decision_key("idem_1", "law:1.0.0", "sha256:aa", day);
        assert_eq!(base, decision_key("idem_1", "law:1.0.0", "sha256:aa", day));
        assert!(base.starts_with("dk_"));
        assert_ne!(base, decision_key("idem_2", "law:1.0.0", "sha256:aa", day));
        assert_ne!(base, decision_key("idem_1", "law:1.0.1", "sha256:aa", day));
        assert_ne!(base, decision_key("idem_1", "law:1.0.0", "sha256:bb", day));
        assert_ne!(base, decision_key("idem_1", "law:1.0.0", "sha256:aa", day.succ_opt().unwrap()));
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(RunOutcome::AbortedClockDrift.as_str(), "aborted_clock_drift");
        assert_eq!(
            serde_json::to_value(RunOutcome::Completed).unwrap(),
            serde_json::json!("completed")
        );
    }
}
