use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a strategy slot in the vault
///
/// Ids are chosen by the manager (e.g. `"lido-staking"`) and stay bound to
/// the slot across upgrades and re-admissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(String);

impl StrategyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StrategyId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StrategyId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle state of an admitted strategy
///
/// ```text
/// (no record) ──add──► Active ──exit──► Emergency ──remove──► Inactive
///                        ▲                  │
///                        └─────upgrade──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyState {
    /// Receives capital, rebalanced and harvested
    Active,
    /// Quarantined: still in the active set but excluded from all routing
    Emergency,
    /// Removed from the active set (record kept for history)
    Inactive,
}

impl StrategyState {
    pub fn from_flags(active: bool, emergency: bool) -> Self {
        match (active, emergency) {
            (false, _) => StrategyState::Inactive,
            (true, true) => StrategyState::Emergency,
            (true, false) => StrategyState::Active,
        }
    }

    /// Can capital be routed to this strategy?
    pub fn is_routable(&self) -> bool {
        matches!(self, StrategyState::Active)
    }
}
