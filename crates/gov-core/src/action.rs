//! # Actions and Policy Layers
//!
//! An [`Action`] is what a law (or a policy layer overlay) asks the engine to
//! do with a resource. Three of them are state transitions and are mutually
//! exclusive per decision; the rest are side effects that accumulate.
//!
//! Every action renders to exactly one canonical obligation string. That
//! string is what lands in the decision span and the ledger, and it is also
//! the comparison key used for deduplication.

use serde::{Deserialize, Serialize};

/// Hours held by the fail-closed default `hold`.
pub const DEFAULT_HOLD_HOURS: u32 = 24;

/// Role notified by the fail-closed default `notify`.
pub const DEFAULT_NOTIFY_ROLE: &str = "ops";

/// An action attached to a triage outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Accept the resource (transition).
    Accept,
    /// Append the decision itself to the ledger.
    AppendLedger,
    /// Put the resource on hold for a number of hours (transition).
    Hold {
        /// Hold duration in hours.
        hours: u32,
    },
    /// Terminate the resource (transition).
    Terminate {
        /// Machine-readable reason.
        reason: String,
    },
    /// Notify holders of a role.
    Notify {
        /// Role to notify.
        role: String,
    },
    /// Set a key/value tag on the resource.
    Tag {
        /// Tag key.
        key: String,
        /// Tag value.
        val: String,
    },
    /// Emit a named domain event.
    Emit {
        /// Event name.
        event: String,
    },
}

impl Action {
    /// `hold` with [`DEFAULT_HOLD_HOURS`].
    pub fn default_hold() -> Self {
        Self::Hold {
            hours: DEFAULT_HOLD_HOURS,
        }
    }

    /// `notify` for [`DEFAULT_NOTIFY_ROLE`].
    pub fn default_notify() -> Self {
        Self::Notify {
            role: DEFAULT_NOTIFY_ROLE.to_string(),
        }
    }

    /// Whether this action changes the resource's state.
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Accept | Self::Hold { .. } | Self::Terminate { .. })
    }

    /// Rank among transitions proposed by the same layer:
    /// `terminate > accept > hold`. Side effects rank 0.
    pub fn transition_rank(&self) -> u8 {
        match self {
            Self::Terminate { .. } => 3,
            Self::Accept => 2,
            Self::Hold { .. } => 1,
            _ => 0,
        }
    }

    /// Short kind name, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::AppendLedger => "append_ledger",
            Self::Hold { .. } => "hold",
            Self::Terminate { .. } => "terminate",
            Self::Notify { .. } => "notify",
            Self::Tag { .. } => "tag",
            Self::Emit { .. } => "emit",
        }
    }

    /// Canonical obligation string.
    pub fn to_obligation(&self) -> String {
        match self {
            Self::Accept => "accept".to_string(),
            Self::AppendLedger => "append_ledger".to_string(),
            Self::Hold { hours } => format!("hold({hours}h)"),
            Self::Terminate { reason } => format!("terminate({reason})"),
            Self::Notify { role } => format!("notify({role})"),
            Self::Tag { key, val } => format!("tag({key},{val})"),
            Self::Emit { event } => format!("emit({event})"),
        }
    }

    /// Rule-language token form, as accepted by the law parser.
    pub fn to_token(&self) -> String {
        match self {
            Self::Accept => "accept".to_string(),
            Self::AppendLedger => "append_ledger".to_string(),
            Self::Hold { hours } => format!("hold(hours={hours})"),
            Self::Terminate { reason } => format!("terminate(reason={reason})"),
            Self::Notify { role } => format!("notify(role={role})"),
            Self::Tag { key, val } => format!("tag(key={key},val={val})"),
            Self::Emit { event } => format!("emit(event={event})"),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_obligation())
    }
}

/// Render a list of actions to obligation strings, preserving order.
pub fn obligations(actions: &[Action]) -> Vec<String> {
    actions.iter().map(Action::to_obligation).collect()
}

/// One of the five precedence tiers from which action proposals originate.
///
/// Declaration order is precedence order: `Constitution` is the highest.
/// The derived `Ord` therefore sorts highest-precedence first, which lets a
/// `BTreeMap<PolicyLayer, _>` iterate layers high→low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyLayer {
    /// Constitutional rules that bind every app and tenant.
    Constitution,
    /// A superior authority's rules.
    Superior,
    /// App-level regulation. Laws speak for this layer by default.
    AppRegulatory,
    /// Tenant configuration.
    Tenant,
    /// Individual user preferences.
    User,
}

impl PolicyLayer {
    /// All layers, highest precedence first.
    pub const DESCENDING: [PolicyLayer; 5] = [
        Self::Constitution,
        Self::Superior,
        Self::AppRegulatory,
        Self::Tenant,
        Self::User,
    ];

    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constitution => "constitution",
            Self::Superior => "superior",
            Self::AppRegulatory => "app_regulatory",
            Self::Tenant => "tenant",
            Self::User => "user",
        }
    }
}

impl Default for PolicyLayer {
    fn default() -> Self {
        Self::AppRegulatory
    }
}

impl std::fmt::Display for PolicyLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
