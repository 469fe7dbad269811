//! Accounting
//!
//! Vault value is the liquid pool plus every routable strategy's valuation.
//! A strategy whose `balance()` fails is valued at its last known
//! `total_assets`; `refresh_valuations` bounds how long that cache may be
//! served before the strategy is quarantined. A negative or out-of-range
//! balance is a failed valuation, so the total never drops below the pool.

use keel_core::{Amount, StrategyId, Timestamp, ratio_bps, reported_amount};
use keel_ports::{Strategy, StrategyError, StrategyResult};
use log::{debug, warn};
use rust_decimal::Decimal;

use crate::state::VaultState;

/// Live valuation of a strategy, rejecting balances the vault cannot account for
pub(crate) fn valuation(handle: &dyn Strategy) -> StrategyResult<Amount> {
    let balance = handle.balance()?;
    reported_amount(balance)
        .ok_or_else(|| StrategyError::Valuation(format!("unusable balance {}", balance)))
}

/// `total + value`, leaving `total` unchanged if the sum is out of range
fn accumulate(total: Amount, value: Amount) -> Amount {
    total.checked_add(value).unwrap_or(total)
}

impl VaultState {
    /// Pool balance plus live strategy valuations (cached value on failure)
    pub(crate) fn total_assets(&self) -> Amount {
        self.registry
            .routable()
            .map(|record| match valuation(record.handle.as_ref()) {
                Ok(balance) => balance,
                Err(e) => {
                    debug!(
                        "[ACCOUNTING] {} valuation failed, using cached {}: {}",
                        record.id, record.total_assets, e
                    );
                    record.total_assets
                }
            })
            .fold(self.pool.balance(), accumulate)
    }

    /// Pool balance plus tracked strategy assets, without calling out
    pub(crate) fn tracked_total(&self) -> Amount {
        self.registry
            .routable()
            .map(|r| r.total_assets)
            .fold(self.pool.balance(), accumulate)
    }

    /// Write live valuations into the records and apply the automatic
    /// quarantine triggers. Returns the ids that were exited.
    pub(crate) fn refresh_valuations(&mut self, now: Timestamp) -> Vec<StrategyId> {
        let emergency_enabled = self.config.flags.emergency_mode_enabled;
        let loss_threshold = self.config.emergency_exit_threshold_bps;
        let max_stale = self.config.max_stale_valuations;
        let mut to_exit: Vec<(StrategyId, String)> = Vec::new();

        for id in self.registry.routable_ids() {
            let Some(record) = self.registry.get_mut(&id) else {
                continue;
            };

            match valuation(record.handle.as_ref()) {
                Ok(balance) => {
                    record.consecutive_valuation_failures = 0;
                    let tracked = record.total_assets;
                    record.total_assets = balance;

                    if balance < tracked {
                        let loss_bps = ratio_bps(tracked - balance, tracked);
                        if loss_threshold > 0 && loss_bps >= loss_threshold {
                            warn!(
                                "[ACCOUNTING] {} lost {}bps ({} -> {})",
                                id, loss_bps, tracked, balance
                            );
                            if emergency_enabled {
                                to_exit.push((id.clone(), format!("valuation loss of {}bps", loss_bps)));
                            }
                        }
                    }
                }
                Err(e) => {
                    record.consecutive_valuation_failures += 1;
                    let failures = record.consecutive_valuation_failures;
                    warn!(
                        "[ACCOUNTING] {} valuation failed ({} in a row), serving cached {}: {}",
                        id, failures, record.total_assets, e
                    );
                    if failures > max_stale && emergency_enabled {
                        to_exit.push((id.clone(), format!("{} consecutive valuation failures", failures)));
                    }
                }
            }
        }

        let mut exited = Vec::with_capacity(to_exit.len());
        for (id, reason) in to_exit {
            if self.emergency_exit_strategy(&id, &reason, now).is_ok() {
                exited.push(id);
            }
        }

        self.refresh_allocation_bps();
        exited
    }

    /// Recompute every routable record's current share of the tracked total
    pub(crate) fn refresh_allocation_bps(&mut self) {
        let total = self.tracked_total();
        for id in self.registry.routable_ids() {
            if let Some(record) = self.registry.get_mut(&id) {
                record.current_allocation_bps = ratio_bps(record.total_assets, total);
            }
        }
        self.metrics.tvl = total.max(Decimal::ZERO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keel_core::VaultConfig;
    use keel_ports::{Strategy, StrategyHandle};
    use keel_strategy_sim::SimulatedStrategy;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    use crate::registry::StrategyRecord;

    fn state_with(strategy: Arc<SimulatedStrategy>, tracked: Amount) -> VaultState {
        let mut state = VaultState::new("owner".to_string(), VaultConfig::default(), Utc::now());
        let handle: StrategyHandle = strategy;
        let mut record = StrategyRecord::new(StrategyId::from("s"), handle, 1_000, 10_000, Utc::now());
        record.total_assets = tracked;
        state.registry.insert(record);
        state
    }

    #[test]
    fn test_failed_valuation_uses_cache() {
        let strategy = Arc::new(SimulatedStrategy::new("s"));
        strategy.fail_balance(true);
        let mut state = state_with(strategy, dec!(250));
        state.pool.credit(dec!(100)).unwrap();

        assert_eq!(state.total_assets(), dec!(350));
        assert!(state.total_assets() >= state.pool.balance());
    }

    #[test]
    fn test_unusable_balances_use_cache() {
        for reported in [dec!(-50), Decimal::MAX] {
            let strategy = Arc::new(SimulatedStrategy::new("s"));
            strategy.execute(dec!(250), &[]).unwrap();
            strategy.misreport_balance(Some(reported));
            let mut state = state_with(strategy, dec!(250));
            state.pool.credit(dec!(100)).unwrap();

            assert_eq!(state.total_assets(), dec!(350));
            assert!(state.total_assets() >= state.pool.balance());

            state.config.flags.emergency_mode_enabled = false;
            state.refresh_valuations(Utc::now());
            let record = state.registry.get(&StrategyId::from("s")).unwrap();
            assert_eq!(record.total_assets, dec!(250));
            assert_eq!(record.consecutive_valuation_failures, 1);
        }
    }

    #[test]
    fn test_stale_valuations_quarantine_past_bound() {
        let strategy = Arc::new(SimulatedStrategy::new("s"));
        strategy.fail_balance(true);
        let mut state = state_with(strategy, dec!(250));
        let id = StrategyId::from("s");

        // max_stale_valuations = 3 by default
        for _ in 0..3 {
            assert!(state.refresh_valuations(Utc::now()).is_empty());
        }
        assert_eq!(state.refresh_valuations(Utc::now()), vec![id.clone()]);

        let record = state.registry.get(&id).unwrap();
        assert!(record.emergency);
        assert_eq!(record.total_assets, Decimal::ZERO);
    }

    #[test]
    fn test_stale_cache_kept_when_emergency_mode_disabled() {
        let strategy = Arc::new(SimulatedStrategy::new("s"));
        strategy.fail_balance(true);
        let mut state = state_with(strategy, dec!(250));
        state.config.flags.emergency_mode_enabled = false;

        for _ in 0..10 {
            state.refresh_valuations(Utc::now());
        }
        let record = state.registry.get(&StrategyId::from("s")).unwrap();
        assert!(!record.emergency);
        assert_eq!(record.total_assets, dec!(250));
        assert_eq!(record.consecutive_valuation_failures, 10);
    }

    #[test]
    fn test_large_loss_triggers_exit() {
        let strategy = Arc::new(SimulatedStrategy::new("s"));
        strategy.execute(dec!(1000), &[]).unwrap();
        let mut state = state_with(strategy.clone(), dec!(1000));

        strategy.apply_loss(2_500);
        let exited = state.refresh_valuations(Utc::now());

        assert_eq!(exited, vec![StrategyId::from("s")]);
        assert_eq!(state.pool.balance(), dec!(750));
        assert_eq!(state.metrics.emergency_exit_count, 1);
    }

    #[test]
    fn test_small_loss_only_revalues() {
        let strategy = Arc::new(SimulatedStrategy::new("s"));
        strategy.execute(dec!(1000), &[]).unwrap();
        let mut state = state_with(strategy.clone(), dec!(1000));

        strategy.apply_loss(500);
        assert!(state.refresh_valuations(Utc::now()).is_empty());
        let record = state.registry.get(&StrategyId::from("s")).unwrap();
        assert_eq!(record.total_assets, dec!(950));
        assert_eq!(record.current_allocation_bps, 10_000);
    }
}
