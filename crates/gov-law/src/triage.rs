//! # Triage Evaluation
//!
//! Walks a law's branches in the fixed order `ok`, `doubt`, `not` and
//! returns the first whose condition holds. When none holds the engine
//! fails closed to `doubt` with [`fail_closed_actions`], so every
//! evaluation reaches a disposition.
//!
//! Faulting conditions count as not matched. They are returned alongside
//! the outcome so the caller can record them.

use gov_core::{Action, EvaluationContext, LawDefinition, Triage};
use serde::Serialize;

use crate::error::ExprError;
use crate::expr::try_evaluate_expression;

/// A branch condition that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionFault {
    /// Branch whose condition faulted.
    pub branch: Triage,
    /// Condition source.
    pub condition: String,
    /// Rendered fault.
    pub message: String,
}

impl ExpressionFault {
    fn new(branch: Triage, condition: &str, error: &ExprError) -> Self {
        Self {
            branch,
            condition: condition.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result of evaluating one law.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageOutcome {
    /// Selected triage.
    pub triage: Triage,
    /// Actions of the selected branch, or the fail-closed default.
    pub actions: Vec<Action>,
    /// Whether a branch condition actually held.
    pub matched: bool,
    /// Conditions that faulted during evaluation.
    pub faults: Vec<ExpressionFault>,
}

/// Built-in actions used when no branch holds: hold 24h, notify ops, ledger.
pub fn fail_closed_actions() -> Vec<Action> {
    vec![Action::default_hold(), Action::default_notify(), Action::AppendLedger]
}

/// Evaluate `law` against `ctx`. Never fails.
pub fn evaluate_law(law: &LawDefinition, ctx: &EvaluationContext) -> TriageOutcome {
    let mut faults = Vec::new();

    for triage in Triage::ORDER {
        let block = law.block(triage);
        match try_evaluate_expression(&block.condition, ctx) {
            Ok(true) => {
                return TriageOutcome {
                    triage,
                    actions: block.actions.clone(),
                    matched: true,
                    faults,
                };
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    law = %law.id,
                    branch = %triage,
                    error = %e,
                    "condition fault, branch treated as not matched"
                );
                faults.push(ExpressionFault::new(triage, &block.condition, &e));
            }
        }
    }

    tracing::debug!(law = %law.id, resource = %ctx.resource.id, "no branch matched, failing closed");
    TriageOutcome {
        triage: Triage::Doubt,
        actions: fail_closed_actions(),
        matched: false,
        faults,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_core::{
        build_evaluation_context, parse_timestamp, ClockSpec, GovernableSpan, Resource,
        TenantConfig, TriageBlock, Who,
    };

    fn law(ok: &str, doubt: &str, not: &str) -> LawDefinition {
        let block = |condition: &str, action: Action| TriageBlock {
            condition: condition.to_string(),
            actions: vec![action, Action::AppendLedger],
        };
        LawDefinition {
            id: "sample:1.0.0".into(),
            scope: "*".into(),
            clock: ClockSpec {
                timezone: "UTC".into(),
            },
            ok: block(ok, Action::Accept),
            doubt: block(doubt, Action::default_hold()),
            not: block(not, Action::Terminate { reason: "x".into() }),
            hash: None,
        }
    }

    fn ctx() -> EvaluationContext {
        let span = GovernableSpan::builder("t", "app")
            .resource(Resource::new("task", "t-1").with_accepted(true))
            .who(Who::new("u", "r"))
            .build();
        build_evaluation_context(
            &span,
            &TenantConfig::new("t", "UTC", 1),
            parse_timestamp("2026-01-01T00:00:00Z").unwrap(),
        )
    }

    #[test]
    fn first_true_branch_wins_in_fixed_order() {
        let outcome = evaluate_law(&law("accepted", "accepted", "accepted"), &ctx());
        assert_eq!(outcome.triage, Triage::Ok);
        assert!(outcome.matched);

        let outcome = evaluate_law(&law("false", "true", "true"), &ctx());
        assert_eq!(outcome.triage, Triage::Doubt);
        assert_eq!(outcome.actions[0], Action::default_hold());

        let outcome = evaluate_law(&law("false", "false", "true"), &ctx());
        assert_eq!(outcome.triage, Triage::Not);
    }

    #[test]
    fn nothing_true_fails_closed() {
        let outcome = evaluate_law(&law("false", "false", "false"), &ctx());
        assert_eq!(outcome.triage, Triage::Doubt);
        assert!(!outcome.matched);
        assert_eq!(
            gov_core::action::obligations(&outcome.actions),
            vec!["hold(24h)", "notify(ops)", "append_ledger"]
        );
        assert!(outcome.faults.is_empty());
    }

    #[test]
    fn faulting_conditions_are_skipped_and_reported() {
        let outcome = evaluate_law(&law("balance > 1", "((", "accepted"), &ctx());
        assert_eq!(outcome.triage, Triage::Not);
        assert!(outcome.matched);
        let branches: Vec<Triage> = outcome.faults.iter().map(|f| f.branch).collect();
        assert_eq!(branches, vec![Triage::Ok, Triage::Doubt]);
        assert!(outcome.faults[0].message.contains("balance"));
    }

    #[test]
    fn all_faulting_fails_closed() {
        let outcome = evaluate_law(&law("@", "#", "$"), &ctx());
        assert_eq!(outcome.triage, Triage::Doubt);
        assert!(!outcome.matched);
        assert_eq!(outcome.actions, fail_closed_actions());
        assert_eq!(outcome.faults.len(), 3);
    }
}
