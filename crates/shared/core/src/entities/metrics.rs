use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Amount, Timestamp};

/// Rolling vault totals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Total value locked at the last mutating call
    pub tvl: Amount,
    /// Gross yield harvested over the vault's life
    pub yield_generated: Amount,
    /// Performance fees taken from yield
    pub performance_fees: Amount,
    /// Management fees accrued on TVL
    pub management_fees: Amount,
    /// Unique depositors
    pub users_served: u64,
    pub rebalance_count: u64,
    pub emergency_exit_count: u64,
    pub last_rebalance: Option<Timestamp>,
    pub last_harvest: Option<Timestamp>,
}

impl PerformanceMetrics {
    /// Total fees collected (performance + management)
    pub fn fees_collected(&self) -> Amount {
        self.performance_fees + self.management_fees
    }

    /// Yield left to depositors after fees
    pub fn net_yield(&self) -> Amount {
        (self.yield_generated - self.fees_collected()).max(Decimal::ZERO)
    }
}
