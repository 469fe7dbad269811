use keel_core::{Amount, Bps};
use serde::{Deserialize, Serialize};

/// Which capability calls should fail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultPlan {
    pub fail_execute: bool,
    pub fail_harvest: bool,
    pub fail_emergency_exit: bool,
    pub fail_balance: bool,
    /// Share of funds lost on emergency exit
    pub exit_haircut_bps: Bps,
    /// Amount `balance()` reports in place of the ledger value
    pub report_balance: Option<Amount>,
    /// Amount `harvest()` reports in place of the realized yield
    pub report_harvest: Option<Amount>,
    /// Amount `emergency_exit()` reports in place of the recovered funds
    pub report_exit: Option<Amount>,
}

impl FaultPlan {
    pub fn healthy() -> Self {
        Self::default()
    }
}

/// Number of capability calls received, failed ones included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub execute: u64,
    pub harvest: u64,
    pub emergency_exit: u64,
    pub balance: u64,
}
