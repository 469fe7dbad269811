use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StrategyId;
use crate::values::{Amount, Bps, Timestamp};

/// Depositor / caller identity
pub type AccountId = String;

/// A depositor's position in the vault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPosition {
    /// First deposit time
    pub deposit_time: Timestamp,
    /// Net assets deposited (deposits minus withdrawals, floored at zero)
    pub principal: Amount,
    /// Self-declared risk tolerance (0 - 10000)
    pub risk_tolerance: Bps,
    /// Strategies the depositor would like to favour (advisory only)
    pub preferred_strategies: Vec<StrategyId>,
    /// Vault shares held
    pub shares: Amount,
}

impl UserPosition {
    pub fn new(deposit_time: Timestamp, risk_tolerance: Bps) -> Self {
        Self {
            deposit_time,
            principal: Decimal::ZERO,
            risk_tolerance,
            preferred_strategies: Vec::new(),
            shares: Decimal::ZERO,
        }
    }

    pub fn with_preferred(mut self, strategies: Vec<StrategyId>) -> Self {
        self.preferred_strategies = strategies;
        self
    }
}
