//! # Action Composition
//!
//! Merges action proposals from the five policy layers into the single
//! ordered action list executed for a decision.
//!
//! ## Rules
//!
//! - **Transitions** (`accept`, `hold`, `terminate`) are mutually exclusive.
//!   The highest layer proposing any transition wins outright; within that
//!   layer `terminate > accept > hold`, first proposal on ties. Lower layers
//!   cannot override it, however severe their proposal.
//! - **Side effects** union across layers in first-seen order, scanning
//!   layers high to low. `tag` conflicts go to the highest layer that set
//!   the key; `notify` roles and `emit` events are sets.
//! - **`append_ledger`** appears exactly once, last, whether or not any
//!   layer asked for it.
//!
//! The winning transition, if any, is placed first.

use std::collections::{BTreeMap, BTreeSet};

use gov_core::{Action, PolicyLayer};

/// Proposals keyed by layer. `BTreeMap` iteration visits layers high to low.
pub type LayerProposals = BTreeMap<PolicyLayer, Vec<Action>>;

/// Compose per-layer proposals into the executed action list.
pub fn compose_actions(by_layer: &LayerProposals) -> Vec<Action> {
    let mut composed = Vec::new();

    if let Some(transition) = winning_transition(by_layer) {
        composed.push(transition.clone());
    }

    let mut tag_keys = BTreeSet::new();
    let mut roles = BTreeSet::new();
    let mut events = BTreeSet::new();
    for action in by_layer.values().flatten() {
        let first_seen = match action {
            Action::Tag { key, .. } => tag_keys.insert(key.as_str()),
            Action::Notify { role } => roles.insert(role.as_str()),
            Action::Emit { event } => events.insert(event.as_str()),
            _ => false,
        };
        if first_seen {
            composed.push(action.clone());
        }
    }

    composed.push(Action::AppendLedger);
    composed
}

fn winning_transition(by_layer: &LayerProposals) -> Option<&Action> {
    let layer = by_layer
        .values()
        .find(|actions| actions.iter().any(Action::is_transition))?;
    layer
        .iter()
        .filter(|a| a.is_transition())
        .fold(None, |best: Option<&Action>, a| match best {
            Some(b) if b.transition_rank() >= a.transition_rank() => Some(b),
            _ => Some(a),
        })
}

/// Assemble the proposals for one decision: the law's actions speak for
/// `law_layer`, the tenant's overlays for their own layers. When both
/// target the same layer the law's actions come first.
pub fn layer_proposals(
    law_layer: PolicyLayer,
    law_actions: &[Action],
    overlays: &BTreeMap<PolicyLayer, Vec<Action>>,
) -> LayerProposals {
    let mut proposals = overlays.clone();
    let slot = proposals.entry(law_layer).or_default();
    let overlay = std::mem::take(slot);
    slot.extend(law_actions.iter().cloned());
    slot.extend(overlay);
    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_core::action::obligations;

    fn terminate() -> Action {
        Action::Terminate {
            reason: "deadline_passed".into(),
        }
    }

    fn tag(key: &str, val: &str) -> Action {
        Action::Tag {
            key: key.into(),
            val: val.into(),
        }
    }

    fn proposals(entries: Vec<(PolicyLayer, Vec<Action>)>) -> LayerProposals {
        entries.into_iter().collect()
    }

    #[test]
    fn higher_layer_hold_beats_lower_layer_terminate() {
        let composed = compose_actions(&proposals(vec![
            (PolicyLayer::Constitution, vec![Action::default_hold()]),
            (PolicyLayer::User, vec![terminate()]),
        ]));
        assert_eq!(obligations(&composed), vec!["hold(24h)", "append_ledger"]);
    }

    #[test]
    fn lowest_layer_terminate_stands_when_nobody_above_transitions() {
        let composed = compose_actions(&proposals(vec![
            (PolicyLayer::Constitution, vec![]),
            (PolicyLayer::Tenant, vec![tag("a", "1")]),
            (PolicyLayer::User, vec![terminate()]),
        ]));
        assert_eq!(
            obligations(&composed),
            vec!["terminate(deadline_passed)", "tag(a,1)", "append_ledger"]
        );
    }

    #[test]
    fn within_a_layer_terminate_beats_accept_beats_hold() {
        let composed = compose_actions(&proposals(vec![(
            PolicyLayer::AppRegulatory,
            vec![Action::default_hold(), Action::Accept, terminate(), Action::Accept],
        )]));
        assert_eq!(composed[0], terminate());

        let composed = compose_actions(&proposals(vec![(
            PolicyLayer::AppRegulatory,
            vec![Action::Hold { hours: 12 }, Action::Accept, Action::Hold { hours: 48 }],
        )]));
        assert_eq!(composed[0], Action::Accept);

        let composed = compose_actions(&proposals(vec![(
            PolicyLayer::AppRegulatory,
            vec![Action::Hold { hours: 12 }, Action::Hold { hours: 48 }],
        )]));
        assert_eq!(composed[0], Action::Hold { hours: 12 });
    }

    #[test]
    fn tags_resolve_to_highest_layer_and_sets_dedupe() {
        let composed = compose_actions(&proposals(vec![
            (
                PolicyLayer::Superior,
                vec![tag("status", "frozen"), Action::default_notify()],
            ),
            (
                PolicyLayer::User,
                vec![
                    tag("status", "open"),
                    tag("owner", "u-1"),
                    Action::default_notify(),
                    Action::Emit { event: "e".into() },
                    Action::Emit { event: "e".into() },
                ],
            ),
        ]));
        assert_eq!(
            obligations(&composed),
            vec!["tag(status,frozen)", "notify(ops)", "tag(owner,u-1)", "emit(e)", "append_ledger"]
        );
    }

    #[test]
    fn append_ledger_once_and_last() {
        let composed = compose_actions(&proposals(vec![
            (PolicyLayer::Constitution, vec![Action::AppendLedger]),
            (PolicyLayer::User, vec![Action::AppendLedger, Action::Accept, Action::AppendLedger]),
        ]));
        assert_eq!(obligations(&composed), vec!["accept", "append_ledger"]);
        assert_eq!(compose_actions(&LayerProposals::new()), vec![Action::AppendLedger]);
    }

    #[test]
    fn law_actions_precede_same_layer_overlay() {
        let overlays = proposals(vec![
            (PolicyLayer::AppRegulatory, vec![tag("status", "overlay")]),
            (PolicyLayer::Constitution, vec![Action::Hold { hours: 72 }]),
        ]);
        let merged = layer_proposals(
            PolicyLayer::AppRegulatory,
            &[terminate(), tag("status", "law")],
            &overlays,
        );
        assert_eq!(
            merged[&PolicyLayer::AppRegulatory],
            vec![terminate(), tag("status", "law"), tag("status", "overlay")]
        );
        assert_eq!(
            obligations(&compose_actions(&merged)),
            vec!["hold(72h)", "tag(status,law)", "append_ledger"]
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn any_action() -> impl Strategy<Value = Action> {
            prop_oneof![
                Just(Action::Accept),
                Just(Action::AppendLedger),
                (1u32..100).prop_map(|hours| Action::Hold { hours }),
                "[a-c]".prop_map(|reason| Action::Terminate { reason }),
                "[a-c]".prop_map(|role| Action::Notify { role }),
                ("[a-c]", "[x-z]").prop_map(|(key, val)| Action::Tag { key, val }),
                "[a-c]".prop_map(|event| Action::Emit { event }),
            ]
        }

        fn any_layer() -> impl Strategy<Value = PolicyLayer> {
            prop::sample::select(PolicyLayer::DESCENDING.to_vec())
        }

        proptest! {
            #[test]
            fn composition_invariants(
                by_layer in prop::collection::btree_map(
                    any_layer(),
                    prop::collection::vec(any_action(), 0..6),
                    0..5,
                )
            ) {
                let composed = compose_actions(&by_layer);

                let ledger_count = composed.iter().filter(|a| **a == Action::AppendLedger).count();
                prop_assert_eq!(ledger_count, 1);
                prop_assert_eq!(composed.last(), Some(&Action::AppendLedger));

                let transitions: Vec<usize> = composed
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| a.is_transition())
                    .map(|(i, _)| i)
                    .collect();
                prop_assert!(transitions.len() <= 1);
                if let Some(i) = transitions.first() {
                    prop_assert_eq!(*i, 0);
                }

                let any_transition = by_layer.values().flatten().any(Action::is_transition);
                prop_assert_eq!(any_transition, !transitions.is_empty());

                let obligations = obligations(&composed);
                let unique: BTreeSet<&String> = obligations.iter().collect();
                prop_assert_eq!(unique.len(), obligations.len());
            }
        }
    }
}
