//! # Span Validation
//!
//! Checks the constitutional invariants of a [`GovernableSpan`] and reports
//! all of them in one [`ValidationError`].

use crate::error::{ValidationError, Violation};
use crate::span::{GovernableSpan, DELIVERABLE};
use crate::temporal::{parse_timestamp, validate_timezone};

/// Validate every invariant of `span`.
///
/// Violations are collected in field declaration order. The span is never
/// modified.
pub fn validate_span(span: &GovernableSpan) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    require(&mut violations, "tenant_id", &span.tenant_id);
    require(&mut violations, "app", &span.app);
    require(&mut violations, "resource.type", &span.resource.kind);
    require(&mut violations, "resource.id", &span.resource.id);

    match span.resource.deadline_at.as_deref() {
        Some(deadline) if parse_timestamp(deadline).is_none() => violations.push(Violation::new(
            "resource.deadline_at",
            format!("\"{deadline}\" is not a valid RFC 3339 timestamp"),
        )),
        None if span.resource.kind == DELIVERABLE => violations.push(Violation::new(
            "resource.deadline_at",
            "is required for deliverable resources",
        )),
        _ => {}
    }

    require(&mut violations, "who.id", &span.who.id);
    require(&mut violations, "who.role", &span.who.role);

    if span.clock.ts.trim().is_empty() {
        violations.push(Violation::new("clock.ts", "must be present"));
    } else if parse_timestamp(&span.clock.ts).is_none() {
        violations.push(Violation::new(
            "clock.ts",
            format!("\"{}\" is not a valid RFC 3339 timestamp", span.clock.ts),
        ));
    }

    if span.clock.tz.trim().is_empty() {
        violations.push(Violation::new("clock.tz", "must be present"));
    } else if validate_timezone(&span.clock.tz).is_err() {
        violations.push(Violation::new(
            "clock.tz",
            format!("\"{}\" is not a valid IANA timezone", span.clock.tz),
        ));
    }

    require(&mut violations, "trace_id", &span.trace_id);
    require(&mut violations, "idempotency_key", &span.idempotency_key);

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn require(violations: &mut Vec<Violation>, field: &str, value: &str) {
    if value.trim().is_empty() {
        violations.push(Violation::new(field, "must be present and non-empty"));
    }
}
