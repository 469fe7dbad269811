//! Allocation Planner
//!
//! Compares each routable strategy's current weight with its target. Pure:
//! the report only depends on vault state and strategy valuations.

use chrono::Duration;
use keel_core::{Amount, Bps, StrategyId, Timestamp, ratio_bps};
use serde::Serialize;

use crate::state::VaultState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftEntry {
    pub id: StrategyId,
    pub current_bps: Bps,
    pub target_bps: Bps,
    pub drift_bps: Bps,
    /// Inside the strategy's [min_bps, max_bps] band
    pub in_band: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub vault_total: Amount,
    pub entries: Vec<DriftEntry>,
    pub threshold_bps: Bps,
    pub rebalance_needed: bool,
}

impl DriftReport {
    pub fn entry(&self, id: &StrategyId) -> Option<&DriftEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn max_drift_bps(&self) -> Bps {
        self.entries.iter().map(|e| e.drift_bps).max().unwrap_or(0)
    }
}

impl VaultState {
    pub(crate) fn compute_drift(&self) -> DriftReport {
        let vault_total = self.total_assets();
        let threshold_bps = self.config.rebalance_threshold_bps;

        let entries: Vec<DriftEntry> = self
            .registry
            .routable()
            .map(|record| {
                let current_bps = ratio_bps(record.total_assets, vault_total);
                let target_bps = record.target_allocation_bps;
                DriftEntry {
                    id: record.id.clone(),
                    current_bps,
                    target_bps,
                    drift_bps: current_bps.abs_diff(target_bps),
                    in_band: self
                        .registry
                        .target(&record.id)
                        .is_none_or(|t| t.in_band(current_bps)),
                }
            })
            .collect();

        let rebalance_needed = entries.iter().any(|e| e.drift_bps >= threshold_bps);

        DriftReport {
            vault_total,
            entries,
            threshold_bps,
            rebalance_needed,
        }
    }

    /// Has the cooldown elapsed since the last rebalance?
    pub(crate) fn cooldown_elapsed(&self, now: Timestamp) -> bool {
        let cooldown = Duration::seconds(
            i64::try_from(self.config.rebalance_cooldown_secs).unwrap_or(i64::MAX),
        );
        match self.metrics.last_rebalance {
            None => true,
            Some(last) => now - last >= cooldown,
        }
    }

    pub(crate) fn should_auto_rebalance(&self, now: Timestamp) -> bool {
        self.config.flags.auto_rebalance
            && !self.emergency.active
            && self.cooldown_elapsed(now)
            && self.compute_drift().rebalance_needed
    }
}
