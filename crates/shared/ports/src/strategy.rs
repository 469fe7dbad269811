use keel_core::Amount;
use std::sync::Arc;

use crate::error::StrategyResult;

/// Port for a yield-generating strategy module
///
/// Implementations wrap an external yield source (staking, lending, ...).
/// The vault is the only caller; it moves capital in with `execute` and
/// back out with `harvest` / `emergency_exit`. Every call may fail, and the
/// vault never lets one strategy's failure abort a batch over the others.
pub trait Strategy: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Deploy `amount` transferred from the vault pool
    fn execute(&self, amount: Amount, data: &[u8]) -> StrategyResult<()>;

    /// Realize accrued yield and return it to the vault
    fn harvest(&self, data: &[u8]) -> StrategyResult<Amount>;

    /// Best-effort full withdrawal; returns the amount handed back
    fn emergency_exit(&self, data: &[u8]) -> StrategyResult<Amount>;

    /// Current valuation of the capital held for the vault
    fn balance(&self) -> StrategyResult<Amount>;
}

/// Shared handle to a strategy capability
pub type StrategyHandle = Arc<dyn Strategy>;
