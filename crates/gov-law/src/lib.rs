//! # gov-law: The Rule Language
//!
//! Everything between law text and an executable action list:
//!
//! - [`parser`]: rule-language text to [`gov_core::LawDefinition`], with a
//!   content hash and line-accurate [`ParseError`]s.
//! - [`source`]: where law text comes from ([`LawSource`]) and the
//!   [`LawBook`] of laws in force.
//! - [`expr`]: the restricted condition language, parsed into a tree and
//!   interpreted. No dynamic code evaluation anywhere.
//! - [`triage`]: `ok` / `doubt` / `not` selection with fail-closed default.
//! - [`compose`]: precedence-layer merging of action proposals.
//!
//! Nothing in this crate performs I/O at evaluation time. The only I/O is
//! [`DirectoryLawSource`] reading law files during setup.

pub mod compose;
pub mod error;
pub mod expr;
pub mod parser;
pub mod source;
pub mod triage;

pub use compose::{compose_actions, layer_proposals, LayerProposals};
pub use error::{ExprError, LawBookError, LawSourceError, ParseError};
pub use expr::{evaluate_expression, try_evaluate_expression, Expr, Value};
pub use parser::{hash_law_text, parse_action, parse_law, parse_law_with, ActionStrictness, ParserOptions};
pub use source::{DirectoryLawSource, InMemoryLawSource, LawBook, LawSource, RegisteredLaw};
pub use triage::{evaluate_law, fail_closed_actions, ExpressionFault, TriageOutcome};
