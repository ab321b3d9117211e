//! # gov-core: Foundational Types for the Governance Engine
//!
//! Every other crate in the workspace depends on `gov-core`; it depends on
//! nothing internal.
//!
//! ## Contents
//!
//! - **Data model**: [`GovernableSpan`] (input), [`LawDefinition`],
//!   [`EvaluationContext`], [`LawDecisionSpan`] (output), and
//!   [`LedgerEvent`] (audit). The chain is
//!   `GovernableSpan → LawDefinition evaluation → LawDecisionSpan → N LedgerEvents`.
//!
//! - **Span utilities**: builders that auto-fill clock, trace and
//!   idempotency tokens; [`validate_span`] which reports every violated
//!   invariant at once; [`next_midnight`] computed with calendar arithmetic
//!   in the target zone.
//!
//! - **Error hierarchy**: [`GovError`] with `thiserror`, plus the aggregate
//!   [`ValidationError`] and the runtime [`GovernanceError`] incident type.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `gov-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod action;
pub mod context;
pub mod decision;
pub mod digest;
pub mod error;
pub mod law;
pub mod ledger;
pub mod span;
pub mod temporal;
pub mod token;
pub mod validation;

// Re-export primary types for ergonomic imports.
pub use action::{Action, PolicyLayer};
pub use context::{
    build_evaluation_context, EvaluationContext, SpanRef, TenantConfig, TenantSnapshot,
    UserSnapshot,
};
pub use decision::{LawDecisionSpan, Triage};
pub use digest::{canonical_json_bytes, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{GovError, GovernanceError, IncidentKind, TimezoneError, ValidationError, Violation};
pub use law::{ClockSpec, LawDefinition, TriageBlock};
pub use ledger::{LedgerEvent, LedgerLinks, ResourceRef};
pub use span::{Evidence, GovernableSpan, LawBinding, Resource, SpanBuilder, SpanClock, Who};
pub use temporal::{next_midnight, parse_timestamp, parse_timezone, validate_timezone};
pub use validation::validate_span;
