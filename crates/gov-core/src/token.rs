//! Opaque, collision-resistant identifiers.
//!
//! Tokens carry a short prefix so that a stray identifier in a log line can
//! be told apart at a glance. No determinism is required or provided.

use uuid::Uuid;

fn token(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// A new trace identifier.
pub fn trace_id() -> String {
    token("trc")
}

/// A new idempotency key.
pub fn idempotency_key() -> String {
    token("idem")
}

/// A new span identifier.
pub fn span_id() -> String {
    token("span")
}

/// A new decision identifier.
pub fn decision_id() -> String {
    token("dec")
}

/// A new ledger event identifier.
pub fn event_id() -> String {
    token("evt")
}

/// A new run identifier.
pub fn run_id() -> String {
    token("run")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_prefixed_and_unique() {
        let ids: HashSet<String> = (0..1_000).map(|_| trace_id()).collect();
        assert_eq!(ids.len(), 1_000);
        assert!(ids.iter().all(|id| id.starts_with("trc_") && id.len() == 36));
        assert!(idempotency_key().starts_with("idem_"));
        assert_ne!(decision_id(), decision_id());
    }
}
