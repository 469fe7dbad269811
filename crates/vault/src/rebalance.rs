//! Rebalance Executor
//!
//! Moves capital between the liquid pool and strategies toward their targets.
//! Strategies expose no partial withdrawal, so a downward move is a full
//! `emergency_exit` followed by redeployment of the target amount. Every
//! per-strategy step is isolated: a failure is counted and the batch goes on.

use keel_core::{Amount, StrategyId, Timestamp, apply_bps, ratio_bps};
use keel_ports::StrategyError;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{VaultError, VaultResult};
use crate::journal::VaultEvent;
use crate::state::VaultState;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebalanceReport {
    /// Strategies moved to their target
    pub rebalanced: usize,
    /// Steps skipped (short liquidity, failed exit)
    pub skipped: usize,
    /// Deployments the strategy rejected
    pub failed: usize,
    /// Strategies already within the threshold
    pub unchanged: usize,
    /// Capital sent from the pool to strategies
    pub deployed: Amount,
    /// Capital pulled back into the pool
    pub recovered: Amount,
}

struct Deployment {
    id: StrategyId,
    amount: Amount,
    priority: u8,
}

impl VaultState {
    pub(crate) fn execute_rebalance(&mut self, now: Timestamp) -> RebalanceReport {
        self.refresh_valuations(now);

        let vault_total = self.tracked_total();
        let threshold = self.config.rebalance_threshold_bps;
        let mut report = RebalanceReport::default();
        let mut deployments: Vec<Deployment> = Vec::new();

        info!(
            "[REBALANCE] Starting: vault_total={}, pool={}, strategies={}",
            vault_total,
            self.pool.balance(),
            self.registry.routable().count()
        );

        // Downward adjustments first so their capital is available below
        for id in self.registry.routable_ids() {
            let Some(record) = self.registry.get(&id) else {
                continue;
            };
            let current = record.total_assets;
            let target_bps = record.target_allocation_bps;
            let target_amount = apply_bps(vault_total, target_bps);
            let drift = ratio_bps(current, vault_total).abs_diff(target_bps);
            let priority = self.registry.priority(&id);

            if drift < threshold || target_amount == current {
                report.unchanged += 1;
                continue;
            }

            if target_amount > current {
                deployments.push(Deployment {
                    id,
                    amount: target_amount - current,
                    priority,
                });
                continue;
            }

            let handle = record.handle.clone();
            let exited = handle
                .emergency_exit(&[])
                .and_then(|recovered| self.accept_returned(recovered, StrategyError::EmergencyExit));
            match exited {
                Ok(recovered) => {
                    debug!(
                        "[REBALANCE] {} exited: recovered {} (target {})",
                        id, recovered, target_amount
                    );
                    report.recovered += recovered;
                    if let Some(record) = self.registry.get_mut(&id) {
                        record.total_assets = Decimal::ZERO;
                    }
                    if recovered < current {
                        let unrecovered = current - recovered;
                        warn!("[REBALANCE] {} exit left {} unrecovered", id, unrecovered);
                        self.record(
                            now,
                            VaultEvent::StrategyExited {
                                id: id.clone(),
                                reason: "rebalance exit".to_string(),
                                recovered: Some(recovered),
                                unrecovered,
                            },
                        );
                    }

                    if target_amount > Decimal::ZERO {
                        deployments.push(Deployment {
                            id,
                            amount: target_amount,
                            priority,
                        });
                    } else {
                        report.rebalanced += 1;
                    }
                }
                Err(e) => {
                    warn!("[REBALANCE] {} exit failed, quarantining: {}", id, e);
                    let unrecovered = current;
                    if let Some(record) = self.registry.get_mut(&id) {
                        record.quarantine();
                    }
                    self.metrics.emergency_exit_count += 1;
                    self.record(
                        now,
                        VaultEvent::StrategyExited {
                            id,
                            reason: "rebalance exit failed".to_string(),
                            recovered: None,
                            unrecovered,
                        },
                    );
                    report.skipped += 1;
                }
            }
        }

        // Upward adjustments, highest priority first (stable for ties)
        deployments.sort_by(|a, b| b.priority.cmp(&a.priority));
        for deployment in deployments {
            if !self.pool.has_liquidity(deployment.amount) {
                info!(
                    "[REBALANCE] Skipping {}: needs {}, pool has {}",
                    deployment.id,
                    deployment.amount,
                    self.pool.balance()
                );
                report.skipped += 1;
                continue;
            }

            match self.deploy(&deployment.id, deployment.amount) {
                Ok(()) => {
                    report.rebalanced += 1;
                    report.deployed += deployment.amount;
                }
                Err(e) => {
                    warn!("[REBALANCE] {}", e);
                    report.failed += 1;
                }
            }
        }

        self.refresh_allocation_bps();
        self.metrics.rebalance_count += 1;
        self.metrics.last_rebalance = Some(now);

        info!(
            "[REBALANCE] Done: rebalanced={}, skipped={}, failed={}, unchanged={}, deployed={}, recovered={}",
            report.rebalanced,
            report.skipped,
            report.failed,
            report.unchanged,
            report.deployed,
            report.recovered
        );
        self.record(
            now,
            VaultEvent::Rebalanced {
                rebalanced: report.rebalanced,
                skipped: report.skipped,
                failed: report.failed,
            },
        );
        report
    }

    /// Transfer `amount` from the pool into a strategy. The debit is rolled
    /// back if the strategy rejects the capital.
    pub(crate) fn deploy(&mut self, id: &StrategyId, amount: Amount) -> VaultResult<()> {
        let handle = self.registry.get_active(id)?.handle.clone();
        self.pool.transfer_to(id, amount)?;

        match handle.execute(amount, &[]) {
            Ok(()) => {
                if let Some(record) = self.registry.get_mut(id) {
                    record.total_assets += amount;
                }
                Ok(())
            }
            Err(source) => {
                self.pool.credit(amount)?;
                Err(VaultError::Execution {
                    strategy: id.clone(),
                    source,
                })
            }
        }
    }
}
