//! Harvest Coordinator
//!
//! Collects realized yield from every routable strategy, then takes the
//! performance and management fees out of the pool. A harvested strategy's
//! record is re-read from `balance()` so yield moved to the pool is not
//! counted twice; no loss or staleness triggers run here.

use keel_core::{Amount, StrategyId, Timestamp, apply_bps, ratio_bps};
use keel_ports::StrategyError;
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::accounting::valuation;
use crate::error::VaultError;
use crate::journal::{FeeKind, VaultEvent};
use crate::state::VaultState;

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HarvestReport {
    pub harvested: usize,
    pub failed: usize,
    pub total_yield: Amount,
    pub performance_fee: Amount,
    pub management_fee: Amount,
    /// Net yield redeployed into strategies
    pub compounded: Amount,
}

impl VaultState {
    pub(crate) fn harvest_all(&mut self, now: Timestamp) -> HarvestReport {
        let mut report = HarvestReport::default();
        let mut yields: Vec<(StrategyId, Amount)> = Vec::new();

        for id in self.registry.routable_ids() {
            let Some(record) = self.registry.get(&id) else {
                continue;
            };
            let handle = record.handle.clone();

            let harvested = handle
                .harvest(&[])
                .and_then(|amount| self.accept_returned(amount, StrategyError::Harvest));

            match harvested {
                Ok(amount) => {
                    let balance = valuation(handle.as_ref()).ok();
                    if let Some(record) = self.registry.get_mut(&id) {
                        record.performance_score = ratio_bps(amount, record.total_assets);
                        record.cumulative_returns += amount;
                        record.last_harvest_time = Some(now);
                        if let Some(balance) = balance {
                            record.total_assets = balance;
                        }
                    }
                    report.harvested += 1;
                    report.total_yield += amount;
                    yields.push((id, amount));
                }
                Err(source) => {
                    let error = VaultError::Harvest {
                        strategy: id,
                        source,
                    };
                    warn!("[HARVEST] {}", error);
                    report.failed += 1;
                }
            }
        }

        self.metrics.yield_generated += report.total_yield;
        self.metrics.last_harvest = Some(now);

        report.performance_fee = self.collect_performance_fee(report.total_yield, now);
        report.management_fee = self.accrue_management_fee(now);

        if self.config.flags.yield_compounding {
            let fee_bps = self.config.performance_fee_bps;
            for (id, amount) in yields {
                let net = (amount - apply_bps(amount, fee_bps)).min(self.pool.balance());
                if net <= Decimal::ZERO {
                    continue;
                }
                match self.deploy(&id, net) {
                    Ok(()) => report.compounded += net,
                    Err(e) => warn!("[HARVEST] Compounding into {} failed, kept in pool: {}", id, e),
                }
            }
        }

        self.metrics.tvl = self.tracked_total();

        info!(
            "[HARVEST] harvested={}, failed={}, yield={}, performance_fee={}, management_fee={}, compounded={}",
            report.harvested,
            report.failed,
            report.total_yield,
            report.performance_fee,
            report.management_fee,
            report.compounded
        );
        self.record(
            now,
            VaultEvent::Harvested {
                harvested: report.harvested,
                failed: report.failed,
                total_yield: report.total_yield,
            },
        );
        report
    }

    /// Take `performance_fee_bps` of `total_yield` out of the pool
    pub(crate) fn collect_performance_fee(&mut self, total_yield: Amount, now: Timestamp) -> Amount {
        let fee = apply_bps(total_yield, self.config.performance_fee_bps);
        if fee <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let paid = self.pay_fee(fee);
        self.metrics.performance_fees += paid;
        self.record(
            now,
            VaultEvent::FeeCollected {
                recipient: self.config.fee_recipient.clone(),
                kind: FeeKind::Performance,
                amount: paid,
            },
        );
        paid
    }

    /// Pro-rata annual management fee on TVL since the previous accrual
    pub(crate) fn accrue_management_fee(&mut self, now: Timestamp) -> Amount {
        let elapsed = (now - self.last_fee_accrual).num_seconds();
        if elapsed <= 0 {
            return Decimal::ZERO;
        }
        self.last_fee_accrual = now;

        let tvl = self.tracked_total();
        let annual = apply_bps(tvl, self.config.management_fee_bps);
        let elapsed = Decimal::from(elapsed);
        let year = Decimal::from(SECONDS_PER_YEAR);
        let fee = annual
            .checked_mul(elapsed)
            .map(|scaled| scaled / year)
            .or_else(|| (annual / year).checked_mul(elapsed))
            .unwrap_or(Decimal::MAX);
        if fee <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let paid = self.pay_fee(fee);
        if paid < fee {
            warn!(
                "[HARVEST] Management fee {} capped to pool balance, paid {}",
                fee, paid
            );
        }
        self.metrics.management_fees += paid;
        self.record(
            now,
            VaultEvent::FeeCollected {
                recipient: self.config.fee_recipient.clone(),
                kind: FeeKind::Management,
                amount: paid,
            },
        );
        paid
    }
}
