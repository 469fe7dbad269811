use serde::{Deserialize, Serialize};

use super::{ConfigError, StrategyId};
use crate::values::{BPS_DENOMINATOR, Bps};

/// Desired weight of a strategy in the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub id: StrategyId,
    /// Desired share of vault value
    pub target_bps: Bps,
    /// Lower edge of the tolerated band
    #[serde(default)]
    pub min_bps: Bps,
    /// Upper edge of the tolerated band
    #[serde(default = "full_allocation")]
    pub max_bps: Bps,
    /// Higher priority strategies are funded first when liquidity is short
    #[serde(default)]
    pub priority: u8,
}

fn full_allocation() -> Bps {
    BPS_DENOMINATOR
}

impl AllocationTarget {
    /// Target with a full [0, 10000] band and default priority
    pub fn new(id: impl Into<StrategyId>, target_bps: Bps) -> Self {
        Self {
            id: id.into(),
            target_bps,
            min_bps: 0,
            max_bps: BPS_DENOMINATOR,
            priority: 0,
        }
    }

    pub fn with_band(mut self, min_bps: Bps, max_bps: Bps) -> Self {
        self.min_bps = min_bps;
        self.max_bps = max_bps;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Is `current_bps` inside the tolerated band?
    pub fn in_band(&self, current_bps: Bps) -> bool {
        current_bps >= self.min_bps && current_bps <= self.max_bps
    }

    /// Checks `min <= target <= max <= 10000`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bps > BPS_DENOMINATOR {
            return Err(ConfigError::invalid(
                "max_bps",
                format!("{} exceeds {}", self.max_bps, BPS_DENOMINATOR),
            ));
        }
        if self.min_bps > self.target_bps || self.target_bps > self.max_bps {
            return Err(ConfigError::invalid(
                "target_bps",
                format!(
                    "{} outside band [{}, {}]",
                    self.target_bps, self.min_bps, self.max_bps
                ),
            ));
        }
        Ok(())
    }
}
